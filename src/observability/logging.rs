//! Tracing initialization and the in-memory log ring buffer.
//!
//! The buffer keeps the most recent lines only; it backs the `/_logs`
//! viewer and never persists anything to disk.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Lines retained in memory.
pub const LOG_BUFFER_CAPACITY: usize = 1000;

static LOG_BUFFER: Mutex<VecDeque<String>> = Mutex::new(VecDeque::new());

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level; `capture` additionally
/// mirrors formatted lines into the ring buffer.
pub fn init(log_level: &str, capture: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("portal_proxy={log_level},tower_http={log_level}"))
    });
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());
    if capture {
        registry.with(RingBufferLayer).init();
    } else {
        registry.init();
    }
}

/// The buffered lines, oldest first.
pub fn recent_lines() -> Vec<String> {
    LOG_BUFFER
        .lock()
        .map(|buffer| buffer.iter().cloned().collect())
        .unwrap_or_default()
}

fn push_line(line: String) {
    if let Ok(mut buffer) = LOG_BUFFER.lock() {
        if buffer.len() == LOG_BUFFER_CAPACITY {
            buffer.pop_front();
        }
        buffer.push_back(line);
    }
}

/// Tracing layer mirroring formatted events into the ring buffer.
pub struct RingBufferLayer;

impl<S: Subscriber> Layer<S> for RingBufferLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        let mut line = format!(
            "{} {:>5} {}: {}",
            format_timestamp(now_epoch_secs()),
            metadata.level(),
            metadata.target(),
            visitor.message
        );
        line.push_str(&visitor.fields);
        push_line(line);
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn format_timestamp(epoch_secs: u64) -> String {
    let days = epoch_secs / 86_400;
    let seconds = epoch_secs % 86_400;
    let (year, month, day) = date_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02} {:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

// Civil-from-days conversion (proleptic Gregorian, epoch 1970-01-01).
fn date_from_days(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z % 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

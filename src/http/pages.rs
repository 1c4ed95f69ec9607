//! Inline HTML rendering for the proxy's own pages.
//!
//! The landing page, the friendly unknown-service page, and the log viewer
//! are the only markup the proxy produces itself; everything else comes
//! from backends.

use std::fmt::Write;

use crate::registry::ServiceEntry;

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Landing page: service listing sorted by rank, plus version.
pub fn home_page(services: &[&ServiceEntry], version: &str) -> String {
    let mut items = String::new();
    for entry in services {
        // Internal names (leading underscore) stay off the listing.
        if entry.name.starts_with('_') {
            continue;
        }
        let name = escape_html(&entry.name);
        let description = entry
            .description
            .as_deref()
            .map(escape_html)
            .unwrap_or_default();
        let _ = write!(
            items,
            r#"<li class="service"><a href="/{name}/">{name}</a><span class="desc">{description}</span></li>"#
        );
    }
    if items.is_empty() {
        items.push_str(r#"<li class="service empty">No services configured</li>"#);
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Proxy</title>
  <style>
    body {{ font-family: system-ui, sans-serif; background: #1e1e1e; color: #d4d4d4; margin: 0; padding: 40px; }}
    h1 {{ color: #4ec9b0; font-size: 1.5em; }}
    ul {{ list-style: none; padding: 0; max-width: 640px; }}
    .service {{ background: #252526; margin: 8px 0; padding: 14px 18px; border-radius: 8px; }}
    .service a {{ color: #4ec9b0; text-decoration: none; font-weight: 600; }}
    .service a:hover {{ text-decoration: underline; }}
    .desc {{ color: #858585; margin-left: 12px; }}
    .version {{ color: #858585; font-size: 0.85em; margin-top: 24px; }}
  </style>
</head>
<body>
  <h1>Available services</h1>
  <ul>{items}</ul>
  <div class="version">portal-proxy v{version}</div>
</body>
</html>
"#
    )
}

/// Friendly 404 naming the requested service.
pub fn service_not_found_page(service: &str) -> String {
    let service = escape_html(service);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Service not found</title>
  <style>
    body {{ font-family: system-ui, sans-serif; background: #1e1e1e; color: #d4d4d4; margin: 0; padding: 40px; }}
    h1 {{ color: #f48771; font-size: 1.5em; }}
    .card {{ background: #252526; max-width: 640px; padding: 20px; border-radius: 8px; }}
    code {{ color: #dcdcaa; }}
    a {{ color: #4ec9b0; }}
  </style>
</head>
<body>
  <div class="card">
    <h1>Service not found</h1>
    <p>There is no service named <code>{service}</code> behind this proxy.</p>
    <p><a href="/">&larr; Back to the service list</a></p>
  </div>
</body>
</html>
"#
    )
}

/// Log viewer: the ring buffer's most recent lines, newest last.
pub fn logs_page(lines: &[String]) -> String {
    let mut rendered = String::new();
    if lines.is_empty() {
        rendered.push_str(r#"<div class="log-line">No logs yet...</div>"#);
    } else {
        for line in lines {
            let class = if line.contains("ERROR") {
                "error"
            } else if line.contains("WARN") {
                "warning"
            } else {
                ""
            };
            let _ = write!(
                rendered,
                "<div class=\"log-line {class}\">{}</div>\n",
                escape_html(line)
            );
        }
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Proxy Logs</title>
  <style>
    body {{ font-family: 'Courier New', monospace; background: #1e1e1e; color: #d4d4d4; margin: 0; padding: 20px; }}
    h1 {{ color: #4ec9b0; font-size: 1.5em; }}
    .log-container {{ background: #252526; padding: 20px; border-radius: 8px; overflow-x: auto; }}
    .log-line {{ padding: 4px 0; border-bottom: 1px solid #333; white-space: pre-wrap; word-wrap: break-word; }}
    .log-line:hover {{ background: #2d2d30; }}
    .error {{ color: #f48771; }}
    .warning {{ color: #ce9178; }}
    .refresh {{ display: inline-block; margin: 10px 0; padding: 8px 16px; background: #0e639c; color: white; text-decoration: none; border-radius: 4px; }}
    .refresh:hover {{ background: #1177bb; }}
  </style>
</head>
<body>
  <h1>Proxy logs</h1>
  <a href="/_logs" class="refresh">Refresh</a>
  <a href="/" class="refresh">Home</a>
  <div class="log-container">
{rendered}  </div>
</body>
</html>
"#
    )
}

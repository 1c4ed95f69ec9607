//! Ordered URL-rewriting passes over response bodies.
//!
//! # Responsibilities
//! - Prefix root-relative URLs with the service name so they route back
//!   through the proxy
//! - Intercept JavaScript reads of the page path so backend code sees the
//!   path it would see at root (pathname transparency)
//!
//! # Design Decisions
//! - One ordered pipeline of pure text transforms; each pass is a pattern,
//!   a replacement, and an exclusion rule, auditable in isolation
//! - Absolute URLs (`scheme://`, `//`, `data:`) are never rewritten; this
//!   is a strict syntactic check, never a guess from surrounding text
//! - Values already starting with `/{service}/` are left alone, and the
//!   pathname/getAttribute wrappers skip their own output, so running the
//!   pipeline twice changes nothing

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::rewrite::{ContentCategory, RewriteContext};

static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").unwrap());

// Optional document./window. prefixes are part of the match so the closure
// can tell the three forms apart (the regex engine has no lookbehind).
// The trailing group detects our own emitted wrapper.
static PATHNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:(?P<doc>document)\.)?(?:(?P<win>window)\.)?\blocation\.pathname\b(?P<wrapped>\.replace\(/\^\\/)?",
    )
    .unwrap()
});

static BASE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<base\s+href\s*=\s*"/""#).unwrap());

// Value matching terminates at the closing quote and refuses to cross `>`
// into a following tag.
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\b(?P<attr>href|src|action)=(?:"(?P<d>/[^">]*)"|'(?P<s>/[^'>]*)'|`(?P<b>/[^`>]*)`)"#,
    )
    .unwrap()
});

static FETCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<call>\bfetch\s*\(\s*)(?:"(?P<d>/[^"]*)"|'(?P<s>/[^']*)'|`(?P<b>/[^`]*)`)"#)
        .unwrap()
});

// Assignment only: `==`/`===` comparisons fail the quote position and are
// left alone.
static NAV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<lhs>(?:window\.location(?:\.href)?|\blocation\.href)\s*=\s*)(?:"(?P<d>/[^"]*)"|'(?P<s>/[^']*)'|`(?P<b>/[^`]*)`)"#,
    )
    .unwrap()
});

static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<call>\burl\s*\(\s*)(?:"(?P<d>/[^")]*)"|'(?P<s>/[^')]*)'|(?P<u>/[^"')\s>]+))\s*\)"#)
        .unwrap()
});

static GET_ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\bgetAttribute\s*\(\s*(?P<q>"href"|'href'|`href`)\s*\)(?P<wrapped>\?\.replace\(/\^\\/)?"#,
    )
    .unwrap()
});

/// True when a URL is absolute and must never be rewritten.
pub fn is_absolute(url: &str) -> bool {
    url.starts_with("//") || url.starts_with("data:") || SCHEME_RE.is_match(url)
}

/// Root-relative and not yet carrying the service prefix.
fn should_prefix(url: &str, service: &str) -> bool {
    url.starts_with('/') && !is_absolute(url) && !url.starts_with(&format!("/{service}/"))
}

/// Pull the matched quote style and URL out of the d/s/b alternation.
fn quoted_url<'t>(caps: &Captures<'t>) -> (&'static str, &'t str) {
    if let Some(m) = caps.name("d") {
        ("\"", m.as_str())
    } else if let Some(m) = caps.name("s") {
        ("'", m.as_str())
    } else {
        ("`", caps.name("b").map(|m| m.as_str()).unwrap_or(""))
    }
}

/// Run the pipeline for one response body.
///
/// Pass selection: HTML gets everything, CSS only `url()`, JS and JSON
/// everything except the `<base>` tag.
pub fn rewrite(body: &str, category: ContentCategory, ctx: &RewriteContext) -> String {
    match category {
        ContentCategory::Html => {
            let body = rewrite_pathname_reads(body, ctx);
            let body = rewrite_base_tag(&body, ctx);
            let body = rewrite_attribute_urls(&body, ctx);
            let body = rewrite_fetch_calls(&body, ctx);
            let body = rewrite_navigation(&body, ctx);
            let body = rewrite_css_urls(&body, ctx);
            rewrite_get_attribute_reads(&body, ctx)
        }
        ContentCategory::Css => rewrite_css_urls(body, ctx),
        ContentCategory::Js | ContentCategory::Json => {
            let body = rewrite_pathname_reads(body, ctx);
            let body = rewrite_attribute_urls(&body, ctx);
            let body = rewrite_fetch_calls(&body, ctx);
            let body = rewrite_navigation(&body, ctx);
            let body = rewrite_css_urls(&body, ctx);
            rewrite_get_attribute_reads(&body, ctx)
        }
        ContentCategory::Opaque => body.to_string(),
    }
}

/// Pass 1: pathname transparency.
///
/// `window.location.pathname` and bare `location.pathname` become an
/// expression that strips a leading `/{service}/` segment;
/// `document.location.pathname` is never altered.
fn rewrite_pathname_reads(body: &str, ctx: &RewriteContext) -> String {
    let service = &ctx.service;
    PATHNAME_RE
        .replace_all(body, |caps: &Captures| {
            let whole = caps.get(0).unwrap().as_str().to_string();
            if caps.name("doc").is_some() || caps.name("wrapped").is_some() {
                return whole;
            }
            if caps.name("win").is_some() {
                format!(r#"(window.location.pathname.replace(/^\/{service}\//, "/"))"#)
            } else {
                format!(r#"(location.pathname.replace(/^\/{service}\//, "/"))"#)
            }
        })
        .into_owned()
}

/// Pass 2: `<base href="/">` picks up the service prefix.
fn rewrite_base_tag(body: &str, ctx: &RewriteContext) -> String {
    let service = &ctx.service;
    BASE_TAG_RE
        .replace_all(body, format!(r#"<base href="/{service}/""#))
        .into_owned()
}

/// Pass 3: root-relative `href=` / `src=` / `action=` attribute values.
fn rewrite_attribute_urls(body: &str, ctx: &RewriteContext) -> String {
    let service = &ctx.service;
    ATTR_RE
        .replace_all(body, |caps: &Captures| {
            let (quote, url) = quoted_url(caps);
            if !should_prefix(url, service) {
                return caps.get(0).unwrap().as_str().to_string();
            }
            let attr = &caps["attr"];
            format!("{attr}={quote}/{service}{url}{quote}")
        })
        .into_owned()
}

/// Pass 4: first string-literal argument of `fetch(...)`.
fn rewrite_fetch_calls(body: &str, ctx: &RewriteContext) -> String {
    let service = &ctx.service;
    FETCH_RE
        .replace_all(body, |caps: &Captures| {
            let (quote, url) = quoted_url(caps);
            if !should_prefix(url, service) {
                return caps.get(0).unwrap().as_str().to_string();
            }
            let call = &caps["call"];
            format!("{call}{quote}/{service}{url}{quote}")
        })
        .into_owned()
}

/// Pass 5: navigation assignments (`window.location = "/x"`,
/// `window.location.href = "/x"`, `location.href = "/x"`).
fn rewrite_navigation(body: &str, ctx: &RewriteContext) -> String {
    let service = &ctx.service;
    NAV_RE
        .replace_all(body, |caps: &Captures| {
            let (quote, url) = quoted_url(caps);
            if !should_prefix(url, service) {
                return caps.get(0).unwrap().as_str().to_string();
            }
            let lhs = &caps["lhs"];
            format!("{lhs}{quote}/{service}{url}{quote}")
        })
        .into_owned()
}

/// Pass 6: CSS `url(...)`, optionally quoted.
fn rewrite_css_urls(body: &str, ctx: &RewriteContext) -> String {
    let service = &ctx.service;
    CSS_URL_RE
        .replace_all(body, |caps: &Captures| {
            let (quote, url) = if let Some(m) = caps.name("d") {
                ("\"", m.as_str())
            } else if let Some(m) = caps.name("s") {
                ("'", m.as_str())
            } else {
                ("", caps.name("u").map(|m| m.as_str()).unwrap_or(""))
            };
            if !should_prefix(url, service) {
                return caps.get(0).unwrap().as_str().to_string();
            }
            let call = &caps["call"];
            format!("{call}{quote}/{service}{url}{quote})")
        })
        .into_owned()
}

/// Pass 7: `getAttribute('href')` reads strip the prefix from the value,
/// mirroring pass 1, so read-back comparisons against clean paths match.
fn rewrite_get_attribute_reads(body: &str, ctx: &RewriteContext) -> String {
    let service = &ctx.service;
    GET_ATTRIBUTE_RE
        .replace_all(body, |caps: &Captures| {
            if caps.name("wrapped").is_some() {
                return caps.get(0).unwrap().as_str().to_string();
            }
            let quote = &caps["q"];
            format!(r#"getAttribute({quote})?.replace(/^\/{service}\//, "/")"#)
        })
        .into_owned()
}

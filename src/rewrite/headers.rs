//! Response header rewriting.
//!
//! # Responsibilities
//! - Bring `Location` redirects back into the proxy's address space
//! - Fix `Set-Cookie` domains so browsers accept backend cookies
//! - Decide which headers never cross the proxy boundary
//!
//! # Design Decisions
//! - Every Set-Cookie header is rewritten and forwarded independently;
//!   merging them would lose cookies
//! - Content-Length is always dropped; the serialization layer recomputes
//!   it from the final, possibly rewritten, body

use axum::http::header::HeaderName;

use crate::rewrite::RewriteContext;

/// Headers never copied from the backend response.
const STRIPPED: &[&str] = &["connection", "transfer-encoding", "content-length"];

/// Whether a response header is dropped instead of copied.
///
/// `Content-Encoding` is additionally dropped by the caller once a body
/// has been decompressed.
pub fn is_stripped_response_header(name: &HeaderName) -> bool {
    STRIPPED.contains(&name.as_str())
}

/// Rewrite a `Location` header value into the proxied address space.
///
/// Root-relative values gain the service prefix; absolute values rooted at
/// the service's target host collapse to the prefix. Anything else (other
/// hosts, protocol-relative) passes through untouched.
pub fn rewrite_location(value: &str, ctx: &RewriteContext) -> String {
    let service = &ctx.service;
    let target = &ctx.target_host;

    if value.starts_with('/') && !value.starts_with("//") {
        if value.starts_with(&format!("/{service}/")) {
            return value.to_string();
        }
        return format!("/{service}{value}");
    }

    for scheme in ["https", "http"] {
        let root = format!("{scheme}://{target}");
        if let Some(rest) = value.strip_prefix(&root) {
            if rest.is_empty() {
                return format!("/{service}/");
            }
            if rest.starts_with('/') || rest.starts_with('?') {
                return format!("/{service}{rest}");
            }
        }
    }

    value.to_string()
}

/// Rewrite one `Set-Cookie` header value.
///
/// A `Domain` attribute naming the target host (with or without a leading
/// dot) is replaced by the proxy's public host; every other attribute is
/// forwarded unchanged.
pub fn rewrite_set_cookie(value: &str, ctx: &RewriteContext, public_host: &str) -> String {
    let target = &ctx.target_host;
    value
        .split(';')
        .map(|part| {
            let trimmed = part.trim();
            if let Some(domain) = strip_prefix_ignore_case(trimmed, "domain=") {
                let domain = domain.trim();
                if domain == target || domain.strip_prefix('.') == Some(target.as_str()) {
                    return format!("Domain={public_host}");
                }
            }
            trimmed.to_string()
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if value.len() >= prefix.len() && value[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RewriteContext {
        RewriteContext {
            service: "blog".to_string(),
            target_host: "blog.example.internal".to_string(),
        }
    }

    #[test]
    fn location_root_relative_gains_prefix() {
        assert_eq!(rewrite_location("/login", &ctx()), "/blog/login");
        assert_eq!(
            rewrite_location("/login?next=/", &ctx()),
            "/blog/login?next=/"
        );
    }

    #[test]
    fn location_already_prefixed_is_untouched() {
        assert_eq!(rewrite_location("/blog/login", &ctx()), "/blog/login");
    }

    #[test]
    fn location_absolute_at_target_collapses_to_prefix() {
        assert_eq!(
            rewrite_location("https://blog.example.internal/posts/1", &ctx()),
            "/blog/posts/1"
        );
        assert_eq!(
            rewrite_location("http://blog.example.internal/posts/1", &ctx()),
            "/blog/posts/1"
        );
        assert_eq!(
            rewrite_location("https://blog.example.internal", &ctx()),
            "/blog/"
        );
    }

    #[test]
    fn location_other_hosts_pass_through() {
        let value = "https://accounts.example.com/oauth";
        assert_eq!(rewrite_location(value, &ctx()), value);
        // Host merely starting with the target host is a different host.
        let lookalike = "https://blog.example.internal.evil.example/x";
        assert_eq!(rewrite_location(lookalike, &ctx()), lookalike);
        assert_eq!(rewrite_location("//cdn.example/x", &ctx()), "//cdn.example/x");
    }

    #[test]
    fn cookie_domain_rewritten_to_public_host() {
        let value = "session=abc; Domain=blog.example.internal; Path=/";
        assert_eq!(
            rewrite_set_cookie(value, &ctx(), "apps.example.com"),
            "session=abc; Domain=apps.example.com; Path=/"
        );
    }

    #[test]
    fn cookie_dotted_and_lowercase_domains_match() {
        assert_eq!(
            rewrite_set_cookie(
                "id=1; domain=.blog.example.internal; Secure",
                &ctx(),
                "apps.example.com"
            ),
            "id=1; Domain=apps.example.com; Secure"
        );
    }

    #[test]
    fn cookie_foreign_domain_kept() {
        let value = "t=1; Domain=other.example; Path=/";
        assert_eq!(
            rewrite_set_cookie(value, &ctx(), "apps.example.com"),
            value
        );
    }

    #[test]
    fn cookie_attributes_pass_through() {
        let value = "s=x; Path=/; Expires=Wed, 21 Oct 2026 07:28:00 GMT; Secure; HttpOnly; SameSite=Lax";
        assert_eq!(
            rewrite_set_cookie(value, &ctx(), "apps.example.com"),
            value
        );
    }

    #[test]
    fn hop_by_hop_headers_are_stripped() {
        for name in ["connection", "transfer-encoding", "content-length"] {
            assert!(is_stripped_response_header(&name.parse().unwrap()));
        }
        assert!(!is_stripped_response_header(&HeaderName::from_static(
            "content-type"
        )));
    }
}

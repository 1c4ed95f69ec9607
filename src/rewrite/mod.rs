//! Bidirectional address-space rewriting.
//!
//! Backends believe they live at `/`; clients reach them at `/{service}/`.
//! This subsystem reconciles the two views:
//! - `content`: ordered text-transform passes over textual response bodies
//! - `headers`: `Location` and `Set-Cookie` response header rewriting
//!
//! # Design Decisions
//! - Content types collapse into a closed category set chosen once per
//!   response; the category selects which passes run
//! - Compressed textual bodies are inflated before rewriting and the
//!   encoding header is dropped (the body leaves uncompressed)
//! - Rewriting is pattern-based on serialized text, not a structural parse;
//!   this is a documented limitation

pub mod content;
pub mod headers;

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};

/// The one piece of state threaded through every rewrite rule.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    pub service: String,
    pub target_host: String,
}

/// Closed set of content categories the proxy distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCategory {
    Html,
    Css,
    Js,
    Json,
    Opaque,
}

impl ContentCategory {
    /// Categorize a Content-Type header value. Anything unrecognized is
    /// opaque and passes through untouched.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(ct) = content_type else {
            return Self::Opaque;
        };
        let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if mime == "text/html" || mime == "application/xhtml+xml" {
            Self::Html
        } else if mime == "text/css" {
            Self::Css
        } else if mime.contains("javascript") || mime.contains("ecmascript") {
            Self::Js
        } else if mime.ends_with("/json") || mime.ends_with("+json") {
            Self::Json
        } else {
            Self::Opaque
        }
    }

    /// Whether bodies of this category go through the rewrite pipeline.
    pub fn is_textual(self) -> bool {
        !matches!(self, Self::Opaque)
    }
}

/// Whether the rewriter knows how to undo this Content-Encoding.
pub fn is_supported_encoding(encoding: &str) -> bool {
    matches!(
        encoding.trim().to_ascii_lowercase().as_str(),
        "gzip" | "x-gzip" | "deflate"
    )
}

/// Inflate a compressed body.
///
/// "deflate" is zlib-wrapped per RFC 9110, but some servers send raw
/// deflate streams; both are accepted.
pub fn decode_body(body: &[u8], encoding: &str) -> std::io::Result<Vec<u8>> {
    match encoding.trim().to_ascii_lowercase().as_str() {
        "gzip" | "x-gzip" => {
            let mut out = Vec::new();
            GzDecoder::new(body).read_to_end(&mut out)?;
            Ok(out)
        }
        "deflate" => {
            let mut out = Vec::new();
            match ZlibDecoder::new(body).read_to_end(&mut out) {
                Ok(_) => Ok(out),
                Err(_) => {
                    let mut out = Vec::new();
                    DeflateDecoder::new(body).read_to_end(&mut out)?;
                    Ok(out)
                }
            }
        }
        other => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("unsupported content encoding: {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn categorizes_content_types() {
        use ContentCategory::*;
        assert_eq!(
            ContentCategory::from_content_type(Some("text/html; charset=utf-8")),
            Html
        );
        assert_eq!(ContentCategory::from_content_type(Some("text/css")), Css);
        assert_eq!(
            ContentCategory::from_content_type(Some("application/javascript")),
            Js
        );
        assert_eq!(
            ContentCategory::from_content_type(Some("text/javascript")),
            Js
        );
        assert_eq!(
            ContentCategory::from_content_type(Some("application/json")),
            Json
        );
        assert_eq!(
            ContentCategory::from_content_type(Some("application/problem+json")),
            Json
        );
        assert_eq!(
            ContentCategory::from_content_type(Some("image/png")),
            Opaque
        );
        assert_eq!(ContentCategory::from_content_type(None), Opaque);
    }

    #[test]
    fn gzip_round_trip() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"<p>hello</p>").unwrap();
        let compressed = enc.finish().unwrap();
        assert_eq!(decode_body(&compressed, "gzip").unwrap(), b"<p>hello</p>");
    }

    #[test]
    fn deflate_zlib_round_trip() {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"body { color: red }").unwrap();
        let compressed = enc.finish().unwrap();
        assert_eq!(
            decode_body(&compressed, "deflate").unwrap(),
            b"body { color: red }"
        );
    }

    #[test]
    fn unknown_encoding_is_an_error() {
        assert!(decode_body(b"xxxx", "br").is_err());
        assert!(!is_supported_encoding("br"));
        assert!(is_supported_encoding("gzip"));
    }
}

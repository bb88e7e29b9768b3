//! Response-body normalization.
//!
//! Upstream servers omit or mis-declare `Content-Encoding` often enough that
//! the declared value is only a hint: a gzip magic header is honoured even
//! when undeclared, and a failed decompression falls back to plain text.

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};

/// First two bytes of every gzip member.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decode a response body to text. Never fails.
pub fn decode_body(body: &[u8], declared_encoding: Option<&str>) -> String {
    let declared = declared_encoding
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if declared.contains("gzip") {
        if let Some(text) = gunzip(body) {
            return text;
        }
        tracing::debug!(declared = %declared, "declared gzip body did not decompress");
    } else if declared.contains("deflate") {
        if let Some(text) = inflate(body) {
            return text;
        }
        tracing::debug!(declared = %declared, "declared deflate body did not decompress");
    }

    if has_gzip_magic(body) {
        if let Some(text) = gunzip(body) {
            if declared.is_empty() {
                tracing::debug!("gzip body decoded without a declared content-encoding");
            }
            return text;
        }
    }

    String::from_utf8_lossy(body).into_owned()
}

pub fn has_gzip_magic(body: &[u8]) -> bool {
    body.starts_with(&GZIP_MAGIC)
}

fn gunzip(body: &[u8]) -> Option<String> {
    let mut decoded = Vec::new();
    GzDecoder::new(body).read_to_end(&mut decoded).ok()?;
    Some(String::from_utf8_lossy(&decoded).into_owned())
}

// Servers disagree on whether "deflate" means zlib-wrapped or raw.
fn inflate(body: &[u8]) -> Option<String> {
    let mut decoded = Vec::new();
    if ZlibDecoder::new(body).read_to_end(&mut decoded).is_err() {
        decoded.clear();
        DeflateDecoder::new(body).read_to_end(&mut decoded).ok()?;
    }
    Some(String::from_utf8_lossy(&decoded).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).expect("write gzip");
        encoder.finish().expect("finish gzip")
    }

    fn zlib(text: &str) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).expect("write zlib");
        encoder.finish().expect("finish zlib")
    }

    #[test]
    fn declared_gzip_is_decompressed() {
        let body = gzip("{\"quoteResponse\":{}}");
        assert_eq!(decode_body(&body, Some("gzip")), "{\"quoteResponse\":{}}");
    }

    #[test]
    fn undeclared_gzip_is_detected_by_magic_header() {
        let body = gzip("<html>SMR</html>");
        assert!(has_gzip_magic(&body));
        assert_eq!(decode_body(&body, None), "<html>SMR</html>");
    }

    #[test]
    fn misdeclared_gzip_on_plain_text_falls_back_to_text() {
        assert_eq!(decode_body(b"plain body", Some("GZIP")), "plain body");
    }

    #[test]
    fn declared_deflate_accepts_zlib_wrapper() {
        let body = zlib("deflated");
        assert_eq!(decode_body(&body, Some("deflate")), "deflated");
    }

    #[test]
    fn truncated_gzip_with_magic_does_not_panic() {
        let mut body = gzip("truncated payload that will not survive");
        body.truncate(6);
        let decoded = decode_body(&body, None);
        assert!(!decoded.contains("payload"));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let decoded = decode_body(&[b'o', b'k', 0xff, b'!'], None);
        assert_eq!(decoded, "ok\u{fffd}!");
    }
}

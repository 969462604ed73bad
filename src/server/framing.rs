//! Minimal HTTP framing
//!
//! Only enough of HTTP/1.x is understood to pull the body out of a POST:
//! a `POST <target> HTTP/1.x` request line, header lines, a blank line and
//! the body. Anything else is a malformed request.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{IngestError, IngestResult};

const HEADER_END: &[u8] = b"\r\n\r\n";

const SUCCESS_BODY: &str = "<html><head><title>OK</title></head><body><h1>OK</h1></body></html>";

fn post_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\APOST \S+ HTTP/1\.[01]\r\n(?:[^\r\n]+\r\n)*\r\n(.*)\z")
            .expect("request pattern is valid")
    })
}

/// Extract the body of a POST request
pub fn extract_post_body(request: &[u8]) -> IngestResult<&str> {
    let text = std::str::from_utf8(request)
        .map_err(|e| IngestError::MalformedRequest(format!("request is not UTF-8: {}", e)))?;

    post_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|body| body.as_str())
        .ok_or_else(|| IngestError::MalformedRequest("not a POST request".to_string()))
}

/// Whether `buf` already holds a full request
///
/// True once the header block has ended and, when a `Content-Length`
/// header is present, that many body bytes have arrived. Without the
/// header the reader keeps going until EOF or timeout.
pub fn is_complete(buf: &[u8]) -> bool {
    let Some(header_end) = find(buf, HEADER_END) else {
        return false;
    };
    let body_len = buf.len() - (header_end + HEADER_END.len());

    let headers = String::from_utf8_lossy(&buf[..header_end]);
    headers
        .split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .is_some_and(|expected| body_len >= expected)
}

/// Fixed response sent for every connection
pub fn success_response() -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        SUCCESS_BODY.len(),
        SUCCESS_BODY
    )
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_extracts_body() {
        let request = b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 19\r\n\r\n7,level:2,score:100";
        assert_eq!(extract_post_body(request).unwrap(), "7,level:2,score:100");
    }

    #[test]
    fn test_extracts_body_without_headers() {
        let request = b"POST /events HTTP/1.0\r\n\r\n1\n2";
        assert_eq!(extract_post_body(request).unwrap(), "1\n2");
    }

    #[test]
    fn test_empty_body_matches() {
        let request = b"POST / HTTP/1.1\r\nHost: x\r\n\r\n";
        assert_eq!(extract_post_body(request).unwrap(), "");
    }

    #[test]
    fn test_rejects_get() {
        let err = extract_post_body(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedRequest);
    }

    #[test]
    fn test_rejects_missing_blank_line() {
        assert!(extract_post_body(b"POST / HTTP/1.1\r\nHost: x\r\n1,a:b").is_err());
    }

    #[test]
    fn test_rejects_garbage_and_invalid_utf8() {
        assert!(extract_post_body(b"hello world").is_err());
        assert!(extract_post_body(&[0xff, 0xfe, 0x00]).is_err());
    }

    #[test]
    fn test_is_complete_with_content_length() {
        let partial = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\n12";
        let full = b"POST / HTTP/1.1\r\ncontent-length: 5\r\n\r\n12345";
        assert!(!is_complete(partial));
        assert!(is_complete(full));
    }

    #[test]
    fn test_is_complete_needs_header_end() {
        assert!(!is_complete(b"POST / HTTP/1.1\r\nContent-Length: 0\r\n"));
        assert!(!is_complete(b"POST / HTTP/1.1\r\n\r\nbody"));
    }

    #[test]
    fn test_success_response_is_well_formed() {
        let response = success_response();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        let (_, body) = response.split_once("\r\n\r\n").unwrap();
        assert!(response.contains(&format!("Content-Length: {}\r\n", body.len())));
    }
}

//! HTTP request encoding
//!
//! Produces the request bytes: request line, header fields, synthesized
//! `Host`, `Content-Length` and optional `Authorization`, terminating blank
//! line, body.

use base64ct::{Base64, Encoding};

use crate::chars;
use crate::uri::Uri;
use crate::{RequestError, CRLF};

/// Encode a request line: `method SP target SP "HTTP/1.1" CRLF`
pub fn encode_request_line(method: &str, target: &str) -> String {
    format!("{method} {target} HTTP/1.1{CRLF}")
}

/// Serialize header fields as `name ": " value CRLF`
///
/// Names must be non-empty and consist only of token characters; values may
/// contain HTAB, SP, VCHAR and obs-text. Anything else is a request error.
pub fn encode_header_fields(header_fields: &[(String, String)]) -> Result<String, RequestError> {
    let mut result = String::new();

    for (name, value) in header_fields {
        if name.is_empty() || !name.bytes().all(chars::is_token_char) {
            return Err(RequestError::InvalidHeaderName);
        }
        if !value.bytes().all(chars::is_field_value_char) {
            return Err(RequestError::InvalidHeaderValue);
        }

        result.push_str(name);
        result.push_str(": ");
        result.push_str(value);
        result.push_str(CRLF);
    }

    Ok(result)
}

/// RFC 4648 §4 Base64 with padding, as used by Basic authentication
pub fn encode_base64(input: &[u8]) -> String {
    Base64::encode_string(input)
}

/// Encode the full request for `uri`
///
/// The target is `path`, or `path "?" query` when the URI carries a query.
/// Caller header fields come first in caller order, followed by the
/// synthesized `Host`, `Content-Length` and, when the URI carries userinfo,
/// `Authorization: Basic` (RFC 7617).
pub fn encode_request(
    uri: &Uri,
    method: &str,
    body: &[u8],
    header_fields: &[(String, String)],
) -> Result<Vec<u8>, RequestError> {
    let target = if uri.query.is_empty() {
        uri.path.clone()
    } else {
        format!("{}?{}", uri.path, uri.query)
    };

    let mut head = encode_request_line(method, &target);
    head.push_str(&encode_header_fields(header_fields)?);
    head.push_str(&format!("Host: {}{CRLF}", uri.host));
    head.push_str(&format!("Content-Length: {}{CRLF}", body.len()));

    if !uri.user.is_empty() || !uri.password.is_empty() {
        let credentials = format!("{}:{}", uri.user, uri.password);
        head.push_str(&format!(
            "Authorization: Basic {}{CRLF}",
            encode_base64(credentials.as_bytes())
        ));
    }

    head.push_str(CRLF);

    let mut data = head.into_bytes();
    data.extend_from_slice(body);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_encode_request_line() {
        assert_eq!(encode_request_line("GET", "/"), "GET / HTTP/1.1\r\n");
    }

    #[test]
    fn test_encode_header() {
        let result = encode_header_fields(&fields(&[("a", "b")])).unwrap();
        assert_eq!(result, "a: b\r\n");
    }

    #[test]
    fn test_encode_header_without_value() {
        let result = encode_header_fields(&fields(&[("a", "")])).unwrap();
        assert_eq!(result, "a: \r\n");
    }

    #[test]
    fn test_encode_headers() {
        let result = encode_header_fields(&fields(&[("a", "b"), ("c", "d")])).unwrap();
        assert_eq!(result, "a: b\r\nc: d\r\n");
    }

    #[test]
    fn test_encode_header_with_empty_name() {
        assert_eq!(
            encode_header_fields(&fields(&[("", "b")])),
            Err(RequestError::InvalidHeaderName)
        );
    }

    #[test]
    fn test_encode_header_with_new_line_in_name() {
        assert_eq!(
            encode_header_fields(&fields(&[("a\n", "")])),
            Err(RequestError::InvalidHeaderName)
        );
    }

    #[test]
    fn test_encode_header_with_new_line_in_value() {
        assert_eq!(
            encode_header_fields(&fields(&[("a", "\n")])),
            Err(RequestError::InvalidHeaderValue)
        );
    }

    #[test]
    fn test_encode_base64() {
        assert_eq!(encode_base64(b"test:test"), "dGVzdDp0ZXN0");
    }

    #[test]
    fn test_encode_request_with_empty_body() {
        let uri = Uri {
            scheme: "http".to_string(),
            host: "test.com".to_string(),
            path: "/".to_string(),
            ..Uri::default()
        };

        let result = encode_request(&uri, "GET", &[], &[]).unwrap();
        assert_eq!(
            result,
            b"GET / HTTP/1.1\r\nHost: test.com\r\nContent-Length: 0\r\n\r\n"
        );
    }

    #[test]
    fn test_encode_request_with_body() {
        let uri = Uri {
            scheme: "http".to_string(),
            host: "test.com".to_string(),
            path: "/".to_string(),
            ..Uri::default()
        };

        let result = encode_request(&uri, "GET", &[b'1'], &[]).unwrap();
        assert_eq!(
            result,
            b"GET / HTTP/1.1\r\nHost: test.com\r\nContent-Length: 1\r\n\r\n1"
        );
    }

    #[test]
    fn test_encode_request_with_query() {
        let uri = Uri {
            scheme: "http".to_string(),
            host: "test.com".to_string(),
            path: "/search".to_string(),
            query: "q=1".to_string(),
            ..Uri::default()
        };

        let result = encode_request(&uri, "GET", &[], &[]).unwrap();
        assert!(result.starts_with(b"GET /search?q=1 HTTP/1.1\r\n"));
    }

    #[test]
    fn test_encode_request_with_basic_auth() {
        let uri = Uri {
            scheme: "http".to_string(),
            user: "test".to_string(),
            password: "test".to_string(),
            host: "test.com".to_string(),
            path: "/".to_string(),
            ..Uri::default()
        };

        let result = encode_request(&uri, "GET", &[], &[]).unwrap();
        let text = String::from_utf8(result).unwrap();
        assert!(text.contains("Authorization: Basic dGVzdDp0ZXN0\r\n"));
    }

    #[test]
    fn test_encode_request_caller_fields_first() {
        let uri = Uri {
            scheme: "http".to_string(),
            host: "test.com".to_string(),
            path: "/".to_string(),
            ..Uri::default()
        };

        let result =
            encode_request(&uri, "POST", b"x", &fields(&[("Content-Type", "text/plain")])).unwrap();
        let text = String::from_utf8(result).unwrap();
        assert_eq!(
            text,
            "POST / HTTP/1.1\r\nContent-Type: text/plain\r\nHost: test.com\r\nContent-Length: 1\r\n\r\nx"
        );
    }
}

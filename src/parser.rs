//! HTTP message parsing
//!
//! Parsers for the response side of the wire: status line, header fields,
//! field values with obsolete folding. Every parser takes a byte slice and
//! returns the unconsumed rest together with the parsed value; none of them
//! backtrack past the returned rest.

use crate::chars;
use crate::ResponseError;

/// HTTP version as it appears on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpVersion {
    pub major: u16,
    pub minor: u16,
}

/// Parsed status line
///
/// `reason` is the server's phrase verbatim; it may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub version: HttpVersion,
    pub code: u16,
    pub reason: String,
}

/// Advance past any run of SP / HTAB
pub fn skip_white_spaces(input: &[u8]) -> &[u8] {
    let count = input
        .iter()
        .take_while(|&&c| chars::is_white_space_char(c))
        .count();
    &input[count..]
}

/// Parse the literal `HTTP/` followed by single-digit major and minor
pub fn parse_http_version(input: &[u8]) -> Result<(&[u8], HttpVersion), ResponseError> {
    let input = input
        .strip_prefix(b"HTTP/")
        .ok_or(ResponseError::InvalidVersion)?;

    let (&major, input) = input.split_first().ok_or(ResponseError::InvalidVersion)?;
    let major = chars::digit_to_uint(major).map_err(|_| ResponseError::InvalidVersion)?;

    let input = input
        .strip_prefix(b".")
        .ok_or(ResponseError::InvalidVersion)?;

    let (&minor, input) = input.split_first().ok_or(ResponseError::InvalidVersion)?;
    let minor = chars::digit_to_uint(minor).map_err(|_| ResponseError::InvalidVersion)?;

    Ok((
        input,
        HttpVersion {
            major: major as u16,
            minor: minor as u16,
        },
    ))
}

/// Parse a status code: exactly three digits
pub fn parse_status_code(input: &[u8]) -> Result<(&[u8], u16), ResponseError> {
    let count = input
        .iter()
        .take_while(|&&c| chars::is_digit_char(c))
        .count();
    if count != 3 {
        return Err(ResponseError::InvalidStatusCode);
    }

    let mut code = 0u16;
    for &c in &input[..3] {
        code = code * 10 + (c - b'0') as u16;
    }

    Ok((&input[3..], code))
}

/// Parse a reason phrase: the longest prefix of HTAB / SP / VCHAR / obs-text
pub fn parse_reason_phrase(input: &[u8]) -> (&[u8], String) {
    let count = input
        .iter()
        .take_while(|&&c| chars::is_field_value_char(c))
        .count();
    (
        &input[count..],
        String::from_utf8_lossy(&input[..count]).into_owned(),
    )
}

/// Parse a token: the longest non-empty run of token characters
pub fn parse_token(input: &[u8]) -> Result<(&[u8], String), ResponseError> {
    let count = input
        .iter()
        .take_while(|&&c| chars::is_token_char(c))
        .count();
    if count == 0 {
        return Err(ResponseError::InvalidToken);
    }

    Ok((
        &input[count..],
        String::from_utf8_lossy(&input[..count]).into_owned(),
    ))
}

/// Parse a field value, trimming trailing whitespace from the result
pub fn parse_field_value(input: &[u8]) -> (&[u8], String) {
    let count = input
        .iter()
        .take_while(|&&c| chars::is_field_value_char(c))
        .count();

    let value = &input[..count];
    let trimmed_length = value
        .iter()
        .rposition(|&c| !chars::is_white_space_char(c))
        .map_or(0, |position| position + 1);

    (
        &input[count..],
        String::from_utf8_lossy(&value[..trimmed_length]).into_owned(),
    )
}

/// Parse field content, collapsing each obsolete fold (`CR LF WS`) into a
/// single space
pub fn parse_field_content(input: &[u8]) -> (&[u8], String) {
    let (mut rest, mut content) = parse_field_value(input);

    while rest.len() >= 3
        && rest[0] == b'\r'
        && rest[1] == b'\n'
        && chars::is_white_space_char(rest[2])
    {
        content.push(' ');
        let (next, value) = parse_field_value(&rest[3..]);
        content.push_str(&value);
        rest = next;
    }

    (rest, content)
}

/// Parse one header field: `token ":" OWS field-content CRLF`
pub fn parse_header_field(input: &[u8]) -> Result<(&[u8], (String, String)), ResponseError> {
    let (input, name) = parse_token(input)?;

    let input = match input.split_first() {
        Some((&b':', rest)) => rest,
        _ => return Err(ResponseError::InvalidHeader),
    };

    let input = skip_white_spaces(input);
    let (input, value) = parse_field_content(input);

    let input = input
        .strip_prefix(b"\r\n")
        .ok_or(ResponseError::InvalidHeader)?;

    Ok((input, (name, value)))
}

/// Parse a status line: `HTTP-version SP status-code SP reason-phrase CRLF`
pub fn parse_status_line(input: &[u8]) -> Result<(&[u8], Status), ResponseError> {
    let (input, version) = parse_http_version(input)?;
    let input = input
        .strip_prefix(b" ")
        .ok_or(ResponseError::InvalidStatusLine)?;

    let (input, code) = parse_status_code(input)?;
    let input = input
        .strip_prefix(b" ")
        .ok_or(ResponseError::InvalidStatusLine)?;

    let (input, reason) = parse_reason_phrase(input);
    let input = input
        .strip_prefix(b"\r\n")
        .ok_or(ResponseError::InvalidStatusLine)?;

    Ok((
        input,
        Status {
            version,
            code,
            reason,
        },
    ))
}

//! Request driver
//!
//! Top-level orchestration of one HTTP exchange: resolve the host, connect,
//! drain the encoded request into the socket, then read the response
//! incrementally, parsing the header prefix first and terminating the body
//! by chunked framing, content length, or peer EOF.

use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use log::{debug, trace};

use crate::encoder;
use crate::parser::{self, Status};
use crate::socket::{AddressInfo, Socket};
use crate::uri::{self, Uri};
use crate::{chars, RequestError, ResponseError, Result, DEFAULT_PORT};

pub use crate::socket::InternetProtocol;

/// One response header field; the name is stored lower-cased
pub type HeaderField = (String, String);

/// A complete HTTP response
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: Status,
    pub header_fields: Vec<HeaderField>,
    pub body: Vec<u8>,
}

/// A reusable HTTP request handle
///
/// The URL is parsed eagerly at construction. Each [`send`](Request::send)
/// opens a fresh connection and releases it before returning; the handle
/// holds no socket between calls.
pub struct Request {
    uri: Uri,
    protocol: InternetProtocol,
}

const RECV_BUFFER_SIZE: usize = 4096;

impl Request {
    /// Parse `url` and build a request handle using IPv4
    pub fn new(url: &str) -> Result<Self> {
        Self::with_protocol(url, InternetProtocol::V4)
    }

    /// Parse `url` and build a request handle for the given IP family
    pub fn with_protocol(url: &str, protocol: InternetProtocol) -> Result<Self> {
        Ok(Request {
            uri: uri::parse_uri(url)?,
            protocol,
        })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Send a `GET` with no body and no extra header fields
    pub fn get(&self, timeout: Option<Duration>) -> Result<Response> {
        self.send("GET", &[], &[], timeout)
    }

    /// Issue the request and read the complete response
    ///
    /// `timeout` of `None` disables the deadline. The remaining budget is
    /// recomputed from the monotonic deadline before every blocking call,
    /// so a slow connect shortens the read budget.
    pub fn send(
        &self,
        method: &str,
        body: &[u8],
        header_fields: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        if self.uri.scheme != "http" {
            return Err(RequestError::UnsupportedScheme.into());
        }

        let host = self.uri.host.as_str();
        let port = if self.uri.port.is_empty() {
            DEFAULT_PORT
        } else {
            self.uri.port.as_str()
        };

        let address_info = AddressInfo::resolve(host, port, self.protocol)?;
        let request_data = encoder::encode_request(&self.uri, method, body, header_fields)?;

        let socket = Socket::new(self.protocol)?;
        debug!("connecting to {host}:{port}");
        socket
            .connect(
                address_info.address(),
                address_info.address_size(),
                remaining_milliseconds(deadline),
            )
            .map_err(|error| error.with_message(format!("Failed to connect to {host}:{port}")))?;

        let mut sent = 0;
        while sent < request_data.len() {
            let size = socket
                .send(&request_data[sent..], remaining_milliseconds(deadline))
                .map_err(|error| {
                    error.with_message(format!("Failed to send data to {host}:{port}"))
                })?;
            sent += size;
        }
        debug!("sent {method} request ({sent} bytes) to {host}:{port}");

        let mut temp_buffer = [0u8; RECV_BUFFER_SIZE];
        let mut buffer = BytesMut::new();
        let mut response = Response::default();

        let mut parsed_headers = false;
        let mut chunked = false;
        let mut content_length: Option<usize> = None;
        let mut expected_chunk_size = 0usize;
        let mut remove_crlf_after_chunk = false;

        loop {
            let size = socket
                .recv(&mut temp_buffer, remaining_milliseconds(deadline))
                .map_err(|error| {
                    error.with_message(format!("Failed to read data from {host}:{port}"))
                })?;
            if size == 0 {
                // disconnected
                break;
            }
            trace!("received {size} bytes");
            buffer.extend_from_slice(&temp_buffer[..size]);

            if !parsed_headers {
                // the CRLF CRLF boundary may straddle multiple reads
                if let Some(position) = find_sequence(&buffer, b"\r\n\r\n") {
                    let header_data = buffer.split_to(position + 4);

                    let (mut rest, status) = parser::parse_status_line(&header_data)?;
                    response.status = status;

                    while !rest.starts_with(b"\r\n") {
                        let (next, (name, value)) = parser::parse_header_field(rest)?;
                        rest = next;

                        let name = name.to_ascii_lowercase();
                        if name == "transfer-encoding" {
                            if value.eq_ignore_ascii_case("chunked") {
                                chunked = true;
                            } else {
                                return Err(
                                    ResponseError::UnsupportedTransferEncoding(value).into()
                                );
                            }
                        } else if name == "content-length" {
                            let length = chars::string_to_uint(value.as_bytes())?;
                            content_length = Some(length);
                            response.body.reserve(length);
                        }

                        response.header_fields.push((name, value));
                    }

                    parsed_headers = true;
                    debug!("parsed response status {}", response.status.code);
                }
            }

            if parsed_headers {
                if chunked {
                    loop {
                        if expected_chunk_size > 0 {
                            let to_write = expected_chunk_size.min(buffer.len());
                            response.body.extend_from_slice(&buffer[..to_write]);
                            buffer.advance(to_write);
                            expected_chunk_size -= to_write;

                            if expected_chunk_size == 0 {
                                remove_crlf_after_chunk = true;
                            }
                            if buffer.is_empty() {
                                break;
                            }
                        } else {
                            if remove_crlf_after_chunk {
                                if buffer.len() < 2 {
                                    break;
                                }
                                if &buffer[..2] != b"\r\n" {
                                    return Err(ResponseError::InvalidChunk.into());
                                }
                                buffer.advance(2);
                                remove_crlf_after_chunk = false;
                            }

                            match find_sequence(&buffer, b"\r\n") {
                                None => break,
                                Some(position) => {
                                    let line = buffer.split_to(position + 2);
                                    expected_chunk_size =
                                        chars::hex_string_to_uint(&line[..position])
                                            .map_err(|_| ResponseError::InvalidChunk)?;

                                    if expected_chunk_size == 0 {
                                        // the trailer section is not parsed
                                        return Ok(response);
                                    }
                                }
                            }
                        }
                    }
                } else if let Some(length) = content_length {
                    // the peer may send more than it declared; stop at the length
                    let to_write = buffer.len().min(length - response.body.len());
                    response.body.extend_from_slice(&buffer[..to_write]);
                    buffer.advance(to_write);

                    if response.body.len() >= length {
                        break;
                    }
                } else {
                    response.body.extend_from_slice(&buffer);
                    buffer.clear();
                }
            }
        }

        Ok(response)
    }
}

/// Remaining budget in milliseconds; `-1` when there is no deadline
fn remaining_milliseconds(deadline: Option<Instant>) -> i64 {
    match deadline {
        None => -1,
        Some(deadline) => {
            let now = Instant::now();
            if now >= deadline {
                0
            } else {
                (deadline - now).as_millis() as i64
            }
        }
    }
}

fn find_sequence(buffer: &[u8], sequence: &[u8]) -> Option<usize> {
    buffer
        .windows(sequence.len())
        .position(|window| window == sequence)
}

//! Socket abstraction
//!
//! A non-blocking TCP endpoint whose `connect`, `send` and `recv` are gated
//! by a `select` wait taking the remaining millisecond budget, plus an owned
//! wrapper around a `getaddrinfo` result. Both handles release the OS
//! resource on drop, on every exit path.

use std::ffi::CString;
use std::mem;
use std::os::fd::RawFd;
use std::ptr;

use crate::{Error, RequestError, ResponseError, Result, SystemError};

/// IP family used for resolution and the socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternetProtocol {
    V4,
    V6,
}

fn address_family(protocol: InternetProtocol) -> libc::c_int {
    match protocol {
        InternetProtocol::V4 => libc::AF_INET,
        InternetProtocol::V6 => libc::AF_INET6,
    }
}

/// Readiness direction for [`Socket::select`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

#[cfg(any(target_os = "linux", target_os = "android"))]
const NO_SIGNAL: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const NO_SIGNAL: libc::c_int = 0;

fn last_error() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Owned result list of a `getaddrinfo` lookup
pub struct AddressInfo {
    info: *mut libc::addrinfo,
}

impl AddressInfo {
    /// Resolve `host`/`port` to a list of stream addresses in one family
    pub fn resolve(host: &str, port: &str, protocol: InternetProtocol) -> Result<Self> {
        let host_name = CString::new(host).map_err(|_| RequestError::InvalidUri)?;
        let service = CString::new(port).map_err(|_| RequestError::InvalidUri)?;

        let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
        hints.ai_family = address_family(protocol);
        hints.ai_socktype = libc::SOCK_STREAM;

        let mut info = ptr::null_mut();
        let result =
            unsafe { libc::getaddrinfo(host_name.as_ptr(), service.as_ptr(), &hints, &mut info) };
        if result != 0 {
            return Err(
                SystemError::new(result, format!("Failed to get address info of {host}")).into(),
            );
        }

        Ok(AddressInfo { info })
    }

    /// The first address of the list
    pub fn address(&self) -> *const libc::sockaddr {
        unsafe { (*self.info).ai_addr }
    }

    pub fn address_size(&self) -> libc::socklen_t {
        unsafe { (*self.info).ai_addrlen }
    }
}

impl Drop for AddressInfo {
    fn drop(&mut self) {
        unsafe { libc::freeaddrinfo(self.info) };
    }
}

/// Exclusively owned, non-blocking TCP endpoint
///
/// Closed on drop. A negative millisecond budget on any operation means
/// "no deadline"; a `select` reporting zero ready descriptors raises
/// [`ResponseError::Timeout`].
pub struct Socket {
    fd: RawFd,
}

impl Socket {
    pub fn new(protocol: InternetProtocol) -> Result<Self> {
        let fd = unsafe {
            libc::socket(address_family(protocol), libc::SOCK_STREAM, libc::IPPROTO_TCP)
        };
        if fd == -1 {
            return Err(SystemError::new(last_error(), "Failed to create socket").into());
        }

        let socket = Socket { fd };

        #[cfg(any(target_os = "macos", target_os = "ios"))]
        {
            let value: libc::c_int = 1;
            let result = unsafe {
                libc::setsockopt(
                    socket.fd,
                    libc::SOL_SOCKET,
                    libc::SO_NOSIGPIPE,
                    &value as *const libc::c_int as *const libc::c_void,
                    mem::size_of::<libc::c_int>() as libc::socklen_t,
                )
            };
            if result == -1 {
                return Err(SystemError::new(last_error(), "Failed to set socket option").into());
            }
        }

        let flags = unsafe { libc::fcntl(socket.fd, libc::F_GETFL) };
        if flags == -1 {
            return Err(SystemError::new(last_error(), "Failed to get socket flags").into());
        }
        let result = unsafe { libc::fcntl(socket.fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if result == -1 {
            return Err(SystemError::new(last_error(), "Failed to set socket flags").into());
        }

        Ok(socket)
    }

    /// Connect to `address`, waiting at most `remaining` milliseconds
    ///
    /// An in-progress non-blocking connect is completed by waiting for
    /// writability and querying `SO_ERROR`.
    pub fn connect(
        &self,
        address: *const libc::sockaddr,
        address_size: libc::socklen_t,
        remaining: i64,
    ) -> Result<()> {
        let mut result = unsafe { libc::connect(self.fd, address, address_size) };
        while result == -1 && last_error() == libc::EINTR {
            result = unsafe { libc::connect(self.fd, address, address_size) };
        }

        if result == -1 {
            let error = last_error();
            if error != libc::EINPROGRESS && error != libc::EWOULDBLOCK {
                return Err(SystemError::new(error, "Failed to connect").into());
            }

            self.select(Direction::Write, remaining)?;

            let mut socket_error: libc::c_int = 0;
            let mut length = mem::size_of::<libc::c_int>() as libc::socklen_t;
            let result = unsafe {
                libc::getsockopt(
                    self.fd,
                    libc::SOL_SOCKET,
                    libc::SO_ERROR,
                    &mut socket_error as *mut libc::c_int as *mut libc::c_void,
                    &mut length,
                )
            };
            if result == -1 {
                return Err(SystemError::new(last_error(), "Failed to get socket option").into());
            }
            if socket_error != 0 {
                return Err(SystemError::new(socket_error, "Failed to connect").into());
            }
        }

        Ok(())
    }

    /// Send once after waiting for writability; partial sends are legal
    pub fn send(&self, data: &[u8], remaining: i64) -> Result<usize> {
        self.select(Direction::Write, remaining)?;

        loop {
            let result = unsafe {
                libc::send(
                    self.fd,
                    data.as_ptr() as *const libc::c_void,
                    data.len(),
                    NO_SIGNAL,
                )
            };
            if result == -1 {
                if last_error() == libc::EINTR {
                    continue;
                }
                return Err(SystemError::new(last_error(), "Failed to send data").into());
            }
            return Ok(result as usize);
        }
    }

    /// Receive once after waiting for readability; zero means clean EOF
    pub fn recv(&self, buffer: &mut [u8], remaining: i64) -> Result<usize> {
        self.select(Direction::Read, remaining)?;

        loop {
            let result = unsafe {
                libc::recv(
                    self.fd,
                    buffer.as_mut_ptr() as *mut libc::c_void,
                    buffer.len(),
                    NO_SIGNAL,
                )
            };
            if result == -1 {
                if last_error() == libc::EINTR {
                    continue;
                }
                return Err(SystemError::new(last_error(), "Failed to read data").into());
            }
            return Ok(result as usize);
        }
    }

    /// Wait for readiness with the remaining millisecond budget
    ///
    /// Interrupted waits are retried; zero ready descriptors is a timeout.
    pub fn select(&self, direction: Direction, remaining: i64) -> Result<()> {
        loop {
            let mut set: libc::fd_set = unsafe { mem::zeroed() };
            unsafe {
                libc::FD_ZERO(&mut set);
                libc::FD_SET(self.fd, &mut set);
            }

            let mut timeout = libc::timeval {
                tv_sec: (remaining / 1000) as libc::time_t,
                tv_usec: ((remaining % 1000) * 1000) as libc::suseconds_t,
            };
            let timeout_pointer = if remaining < 0 {
                ptr::null_mut()
            } else {
                &mut timeout as *mut libc::timeval
            };

            let set_pointer: *mut libc::fd_set = &mut set;
            let (read_set, write_set) = match direction {
                Direction::Read => (set_pointer, ptr::null_mut()),
                Direction::Write => (ptr::null_mut(), set_pointer),
            };

            let count = unsafe {
                libc::select(self.fd + 1, read_set, write_set, ptr::null_mut(), timeout_pointer)
            };
            if count == -1 {
                if last_error() == libc::EINTR {
                    continue;
                }
                return Err(SystemError::new(last_error(), "Failed to select socket").into());
            }
            if count == 0 {
                return Err(Error::Response(ResponseError::Timeout));
            }
            return Ok(());
        }
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    fn local_address(listener: &TcpListener) -> AddressInfo {
        let port = listener.local_addr().unwrap().port().to_string();
        AddressInfo::resolve("127.0.0.1", &port, InternetProtocol::V4).unwrap()
    }

    #[test]
    fn test_connect_and_recv() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let info = local_address(&listener);

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"Hello").unwrap();
        });

        let socket = Socket::new(InternetProtocol::V4).unwrap();
        socket
            .connect(info.address(), info.address_size(), 1000)
            .unwrap();

        let mut buffer = [0u8; 16];
        let size = socket.recv(&mut buffer, 1000).unwrap();
        assert_eq!(&buffer[..size], b"Hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_recv_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let info = local_address(&listener);

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let socket = Socket::new(InternetProtocol::V4).unwrap();
        socket
            .connect(info.address(), info.address_size(), 1000)
            .unwrap();

        let mut buffer = [0u8; 16];
        let size = socket.recv(&mut buffer, 1000).unwrap();
        assert_eq!(size, 0);

        handle.join().unwrap();
    }

    #[test]
    fn test_select_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let info = local_address(&listener);

        let socket = Socket::new(InternetProtocol::V4).unwrap();
        socket
            .connect(info.address(), info.address_size(), 1000)
            .unwrap();

        // nothing accepted, nothing written: the read wait must expire
        let mut buffer = [0u8; 16];
        let result = socket.recv(&mut buffer, 20);
        assert!(matches!(
            result,
            Err(Error::Response(ResponseError::Timeout))
        ));
    }

    #[test]
    fn test_resolve_failure() {
        let result = AddressInfo::resolve("host.invalid.", "80", InternetProtocol::V4);
        assert!(matches!(result, Err(Error::System(_))));
    }
}

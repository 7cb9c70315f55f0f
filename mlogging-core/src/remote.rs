//! The remote collector seam.
//!
//! The collector is an opaque external service. This module only fixes the
//! category naming rule and the traits a transport has to implement.

use std::io;

use crate::error::MloggingError;

/// A connection to a remote collector.
pub trait RemoteTransport: Send {
    fn send(&mut self, category: &str, line: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opens transports to a collector at `host:port`.
pub trait RemoteConnector: Send + Sync {
    fn connect(&self, host: &str, port: u16) -> Result<Box<dyn RemoteTransport>, MloggingError>;
}

/// Text before the first dot of `hostname`.
pub fn short_hostname(hostname: &str) -> &str {
    match hostname.find('.') {
        Some(pos) if pos > 0 => &hostname[..pos],
        _ => hostname,
    }
}

/// Category for a remote destination: `base`, followed by `.shorthost` when
/// `by_host` is set.
pub fn remote_category(base: &str, by_host: bool, hostname: &str) -> String {
    if by_host {
        format!("{base}.{}", short_hostname(hostname))
    } else {
        base.to_string()
    }
}

/// Hostname of this machine, or `localhost` when it cannot be read.
#[cfg(unix)]
pub fn hostname() -> String {
    use std::ffi::CStr;
    unsafe {
        let mut utsname: libc::utsname = std::mem::zeroed();
        if libc::uname(&mut utsname) != 0 {
            return "localhost".into();
        }
        CStr::from_ptr(utsname.nodename.as_ptr())
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(not(unix))]
pub fn hostname() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "localhost".into())
}

#[cfg(feature = "tcp")]
pub use tcp::{TcpConnector, TcpTransport};

#[cfg(feature = "tcp")]
mod tcp {
    use std::{
        io::{self, BufWriter, Write},
        net::TcpStream,
    };

    use super::{RemoteConnector, RemoteTransport};
    use crate::error::MloggingError;

    /// Connects to collectors speaking one `category\tline\n` per record.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct TcpConnector;

    impl RemoteConnector for TcpConnector {
        fn connect(
            &self,
            host: &str,
            port: u16,
        ) -> Result<Box<dyn RemoteTransport>, MloggingError> {
            if host.is_empty() {
                return Err(MloggingError::RemoteUnavailable("empty collector host".into()));
            }
            Ok(Box::new(TcpTransport {
                addr: format!("{host}:{port}"),
                stream: None,
            }))
        }
    }

    /// Lazily connected stream; a failed write drops the connection so the
    /// next record reconnects.
    pub struct TcpTransport {
        addr: String,
        stream: Option<BufWriter<TcpStream>>,
    }

    impl TcpTransport {
        fn stream(&mut self) -> io::Result<&mut BufWriter<TcpStream>> {
            match &mut self.stream {
                Some(stream) => Ok(stream),
                slot @ None => Ok(slot.insert(BufWriter::new(TcpStream::connect(&self.addr)?))),
            }
        }
    }

    impl RemoteTransport for TcpTransport {
        fn send(&mut self, category: &str, line: &str) -> io::Result<()> {
            let result = self
                .stream()
                .and_then(|stream| writeln!(stream, "{category}\t{line}"));
            if result.is_err() {
                self.stream = None;
            }
            result
        }

        fn flush(&mut self) -> io::Result<()> {
            let Some(stream) = self.stream.as_mut() else {
                return Ok(());
            };
            let result = stream.flush();
            if result.is_err() {
                self.stream = None;
            }
            result
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_by_host() {
        assert_eq!(remote_category("svc", true, "node07.internal.example"), "svc.node07");
        assert_eq!(remote_category("svc", false, "node07.internal.example"), "svc");
    }

    #[test]
    fn test_short_hostname() {
        assert_eq!(short_hostname("node07"), "node07");
        assert_eq!(short_hostname("a.b"), "a");
        assert_eq!(short_hostname(".hidden"), ".hidden");
    }

    #[test]
    fn test_hostname_is_not_empty() {
        assert!(!hostname().is_empty());
    }
}

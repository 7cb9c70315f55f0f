//! # mlogging-core
//! Core utilities for mlogging - level sets, record formatting, destination
//! writers and the per-handler writer threads.

mod config;
mod error;
mod format;
mod handler;
mod level;
mod log_writer;
mod remote;
mod utils;

pub use config::{Defaults, DefaultsUpdate, MLOGGING_CONFIG, MloggingConfig};
pub use error::{MloggingError, diagnostic};
pub use format::{DEFAULT_FORMAT, FormatSpec, Record, module_of};
pub use handler::{Destination, Handler, HandlerContext, HandlerKind};
pub use level::{Level, LevelSet};
pub use log_writer::{
    LogFile, LogRemote, LogScreen, LogWriter, MemoryWriter, ScreenTarget, local_path,
};
#[cfg(feature = "tcp")]
pub use remote::{TcpConnector, TcpTransport};
pub use remote::{RemoteConnector, RemoteTransport, hostname, remote_category, short_hostname};
pub use utils::{LogMessage, LogSender, spawn_log_thread};

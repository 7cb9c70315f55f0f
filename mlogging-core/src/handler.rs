use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use crate::{
    config::Defaults,
    error::MloggingError,
    format::{FormatSpec, Record},
    log_writer::{LogFile, LogRemote, LogScreen, ScreenTarget},
    remote::{RemoteConnector, remote_category},
    utils::{LogMessage, LogSender, spawn_log_thread},
};

/// A requested output. Unset fields fall back to the registry defaults at
/// construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Screen,
    Local {
        root: Option<PathBuf>,
    },
    Remote {
        host: Option<String>,
        port: Option<u16>,
        /// Defaults to the logger name.
        category: Option<String>,
        by_host: bool,
    },
}

impl Destination {
    pub fn local() -> Self {
        Destination::Local { root: None }
    }

    pub fn local_at(root: impl Into<PathBuf>) -> Self {
        Destination::Local {
            root: Some(root.into()),
        }
    }

    pub fn remote() -> Self {
        Destination::Remote {
            host: None,
            port: None,
            category: None,
            by_host: false,
        }
    }

    pub fn remote_by_host() -> Self {
        Destination::Remote {
            host: None,
            port: None,
            category: None,
            by_host: true,
        }
    }

    pub fn kind(&self) -> HandlerKind {
        match self {
            Destination::Screen => HandlerKind::Screen,
            Destination::Local { .. } => HandlerKind::Local,
            Destination::Remote { .. } => HandlerKind::Remote,
        }
    }
}

impl FromStr for Destination {
    type Err = MloggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "screen" => Ok(Destination::Screen),
            "local" => Ok(Destination::local()),
            "remote" => Ok(Destination::remote()),
            "remote_by_host" => Ok(Destination::remote_by_host()),
            other => Err(MloggingError::UnsupportedDestination(other.into())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Screen,
    Local,
    Remote,
    Void,
}

/// Everything handler construction reads besides the destination itself.
pub struct HandlerContext<'a> {
    pub defaults: &'a Defaults,
    pub screen: &'a ScreenTarget,
    pub remote: Option<&'a dyn RemoteConnector>,
    pub hostname: &'a str,
}

/// A live output attached to a logger.
///
/// Every handler except the void one owns a writer thread; dropping or
/// closing the handler drains and joins it.
pub struct Handler {
    kind: HandlerKind,
    sender: Option<LogSender>,
    local_path: Option<PathBuf>,
    category: Option<String>,
}

impl Handler {
    /// Builds the handler for `destination` on logger `name`.
    pub fn build(
        name: &str,
        destination: &Destination,
        ctx: &HandlerContext<'_>,
    ) -> Result<Self, MloggingError> {
        let format = ctx.defaults.format.clone();
        match destination {
            Destination::Screen => Ok(Self::screen(ctx.screen.clone(), format)),
            Destination::Local { root } => {
                let root = root.as_deref().unwrap_or(&ctx.defaults.local_root);
                Self::local(root, name, format)
            }
            Destination::Remote {
                host,
                port,
                category,
                by_host,
            } => {
                let connector = ctx.remote.ok_or_else(|| {
                    MloggingError::RemoteUnavailable("no remote transport available".into())
                })?;
                let base = category.as_deref().unwrap_or(name);
                Self::remote(
                    connector,
                    host.as_deref().unwrap_or(&ctx.defaults.remote_host),
                    port.unwrap_or(ctx.defaults.remote_port),
                    remote_category(base, *by_host, ctx.hostname),
                    format,
                )
            }
        }
    }

    pub fn screen(target: ScreenTarget, format: FormatSpec) -> Self {
        Self {
            kind: HandlerKind::Screen,
            sender: Some(spawn_log_thread(LogScreen::new(target), format, "screen".into())),
            local_path: None,
            category: None,
        }
    }

    /// Creates the directories for `name` under `root` right away.
    pub fn local(root: &Path, name: &str, format: FormatSpec) -> Result<Self, MloggingError> {
        let file = LogFile::open(root, name)?;
        let path = file.path().to_path_buf();
        let label = format!("local file {}", path.display());
        Ok(Self {
            kind: HandlerKind::Local,
            sender: Some(spawn_log_thread(file, format, label)),
            local_path: Some(path),
            category: None,
        })
    }

    pub fn remote(
        connector: &dyn RemoteConnector,
        host: &str,
        port: u16,
        category: String,
        format: FormatSpec,
    ) -> Result<Self, MloggingError> {
        let transport = connector.connect(host, port)?;
        let label = format!("remote collector {host}:{port}");
        Ok(Self {
            kind: HandlerKind::Remote,
            sender: Some(spawn_log_thread(
                LogRemote::new(category.clone(), transport),
                format,
                label,
            )),
            local_path: None,
            category: Some(category),
        })
    }

    /// Discards everything.
    pub fn void() -> Self {
        Self {
            kind: HandlerKind::Void,
            sender: None,
            local_path: None,
            category: None,
        }
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn failures(&self) -> u64 {
        self.sender.as_ref().map_or(0, LogSender::failures)
    }

    pub fn emit(&self, record: &Arc<Record>) {
        if let Some(sender) = &self.sender {
            // A closed channel means the handler is being torn down
            let _ = sender.send(LogMessage::Record(Arc::clone(record)));
        }
    }

    /// Applies to records emitted after this call.
    pub fn set_format(&self, format: FormatSpec) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(LogMessage::SetFormat(format));
        }
    }

    /// No-op on anything but a remote handler.
    pub fn set_category(&mut self, category: &str) {
        if self.kind != HandlerKind::Remote {
            return;
        }
        if let Some(sender) = &self.sender {
            let _ = sender.send(LogMessage::SetCategory(category.to_string()));
        }
        self.category = Some(category.to_string());
    }

    pub fn flush(&self) {
        if let Some(sender) = &self.sender {
            sender.flush();
        }
    }

    /// Drains pending records and releases the handler's resources.
    pub fn close(self) {
        if let Some(sender) = &self.sender {
            sender.shutdown();
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("kind", &self.kind)
            .field("local_path", &self.local_path)
            .field("category", &self.category)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io};

    use super::*;
    use crate::{level::Level, log_writer::MemoryWriter, remote::RemoteTransport};

    struct Unreachable;

    impl RemoteConnector for Unreachable {
        fn connect(&self, host: &str, port: u16) -> Result<Box<dyn RemoteTransport>, MloggingError> {
            Err(MloggingError::RemoteUnavailable(format!("{host}:{port}")))
        }
    }

    struct Discard;

    impl RemoteTransport for Discard {
        fn send(&mut self, _: &str, _: &str) -> io::Result<()> {
            Ok(())
        }
    }

    struct AcceptAll;

    impl RemoteConnector for AcceptAll {
        fn connect(&self, _: &str, _: u16) -> Result<Box<dyn RemoteTransport>, MloggingError> {
            Ok(Box::new(Discard))
        }
    }

    fn record(message: &str) -> Arc<Record> {
        Arc::new(Record::new(Level::Warning, "a.b".into(), "handler".into(), message.into()))
    }

    #[test]
    fn test_parse_destination() {
        assert_eq!("local".parse::<Destination>().unwrap(), Destination::local());
        assert_eq!(
            "remote_by_host".parse::<Destination>().unwrap().kind(),
            HandlerKind::Remote
        );
        assert!(matches!(
            "syslog".parse::<Destination>(),
            Err(MloggingError::UnsupportedDestination(kind)) if kind == "syslog"
        ));
    }

    #[test]
    fn test_local_handler_uses_default_root() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = Defaults {
            local_root: dir.path().to_path_buf(),
            format: FormatSpec::new("{name} {level} {message}"),
            ..Defaults::default()
        };
        let ctx = HandlerContext {
            defaults: &defaults,
            screen: &ScreenTarget::Stdout,
            remote: None,
            hostname: "host",
        };
        let handler = Handler::build("a.b", &Destination::local(), &ctx).unwrap();
        assert_eq!(handler.kind(), HandlerKind::Local);
        handler.emit(&record("hi"));
        handler.close();
        let path = dir.path().join("a").join("b");
        assert_eq!(fs::read_to_string(path).unwrap(), "a.b WARNING hi\n");
    }

    #[test]
    fn test_remote_without_connector_is_unavailable() {
        let defaults = Defaults::default();
        let ctx = HandlerContext {
            defaults: &defaults,
            screen: &ScreenTarget::Stdout,
            remote: None,
            hostname: "host",
        };
        let err = Handler::build("svc", &Destination::remote(), &ctx).unwrap_err();
        assert!(matches!(err, MloggingError::RemoteUnavailable(_)));

        let ctx = HandlerContext {
            remote: Some(&Unreachable),
            ..ctx
        };
        let err = Handler::build("svc", &Destination::remote(), &ctx).unwrap_err();
        assert!(matches!(err, MloggingError::RemoteUnavailable(addr) if addr == "127.0.0.1:1456"));
    }

    #[test]
    fn test_remote_category_by_host() {
        let defaults = Defaults::default();
        let ctx = HandlerContext {
            defaults: &defaults,
            screen: &ScreenTarget::Stdout,
            remote: Some(&AcceptAll),
            hostname: "node07.internal.example",
        };
        let mut handler = Handler::build("svc", &Destination::remote_by_host(), &ctx).unwrap();
        assert_eq!(handler.category(), Some("svc.node07"));
        handler.set_category("audit");
        assert_eq!(handler.category(), Some("audit"));
    }

    #[test]
    fn test_void_and_screen_ignore_category() {
        let mut void = Handler::void();
        void.emit(&record("dropped"));
        void.set_category("nope");
        assert_eq!(void.category(), None);

        let memory = MemoryWriter::new();
        let screen = Handler::screen(ScreenTarget::Memory(memory.clone()), FormatSpec::new("{message}"));
        screen.emit(&record("shown"));
        screen.flush();
        assert_eq!(memory.lines(), ["shown"]);
    }
}

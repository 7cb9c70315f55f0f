//! # mlogging
//! Named loggers routed to the screen, local files and remote collectors,
//! filtered by an explicit set of levels.
//!
//! ## Usage
//! ```rust
//! use mlogging::logger_config;
//!
//! let log = logger_config("mylog").init().unwrap();
//! log.info("hello world");
//! ```
//!
//! ## Level sets
//! Levels are an allow-list, not a threshold. This logger shows warnings and
//! debug messages and drops everything else.
//!
//! ```rust
//! use mlogging::logger_config;
//!
//! let log = logger_config("picky")
//!     .with_levels(["warning", "debug"])
//!     .init()
//!     .unwrap();
//! log.warning("shown");
//! log.error("dropped");
//! ```
//!
//! ## Logging to files
//! A local destination writes to `root/<name with dots as directories>`,
//! creating the directories when the logger is configured.
//!
//! ```rust
//! use mlogging::{Destination, LevelSet, registry};
//!
//! let root = std::env::temp_dir().join("mlogging_doc");
//! let log = registry()
//!     .configure("app.jobs", [Destination::local_at(&root)], LevelSet::all())
//!     .unwrap();
//! log.warning("disk almost full");
//! log.flush();
//! let written = std::fs::read_to_string(root.join("app").join("jobs")).unwrap();
//! assert!(written.ends_with("app.jobs WARNING disk almost full\n"));
//! ```
//!
//! ## With the `log` facade
//! ```rust
//! use mlogging::logger_config;
//!
//! let _guard = mlogging::init().unwrap();
//! logger_config("db").init().unwrap();
//! log::warn!(target: "db", "slow query");
//! // guard flushes every logger when dropped
//! ```

mod logger;
mod registry;

pub use logger::Logger;
pub use mlogging_core::{
    Defaults, DefaultsUpdate, Destination, FormatSpec, HandlerKind, Level, LevelSet,
    MemoryWriter, MloggingError, RemoteConnector, RemoteTransport, ScreenTarget,
};
#[cfg(feature = "tcp")]
pub use mlogging_core::TcpConnector;
pub use registry::{LoggerOption, Registry};

use log::{LevelFilter, Log};
use mlogging_core::module_of;
use std::{path::PathBuf, sync::LazyLock};

/// Process-wide registry used by the free functions and the `log` bridge.
static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Routes `log` records to the logger named by their target.
struct MLogger;

impl Log for MLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        REGISTRY
            .route(metadata.target())
            .is_some_and(|logger| logger.accepts(metadata.level().into()))
    }

    fn log(&self, record: &log::Record) {
        let Some(logger) = REGISTRY.route(record.target()) else {
            return;
        };
        let module = match (record.file(), record.module_path()) {
            (Some(file), _) => module_of(file),
            (None, Some(path)) => path.rsplit("::").next().unwrap_or(path).to_string(),
            (None, None) => String::new(),
        };
        logger.emit(record.level().into(), &module, record.args());
    }

    fn flush(&self) {
        REGISTRY.flush_all();
    }
}

/// Flushes every logger of the global registry when dropped.
/// Hold this guard for the lifetime of your logging session.
pub struct LoggerGuard {
    _private: (),
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        REGISTRY.flush_all();
    }
}

/// Installs the `log` bridge. Records whose target names no configured
/// logger are dropped.
#[must_use = "LoggerGuard flushes pending records when dropped. Do \"let _guard = mlogging::init()?;\""]
pub fn init() -> Result<LoggerGuard, MloggingError> {
    log::set_boxed_logger(Box::new(MLogger)).map_err(|_| MloggingError::AlreadyInitialized)?;
    log::set_max_level(LevelFilter::Trace);
    Ok(LoggerGuard { _private: () })
}

/// Replaces the handlers of `name` in the global registry.
pub fn configure<I>(name: &str, destinations: I, levels: LevelSet) -> Result<Logger, MloggingError>
where
    I: IntoIterator<Item = Destination>,
{
    REGISTRY.configure(name, destinations, levels)
}

/// Updates the global defaults used by handlers built afterwards.
pub fn set_defaults(update: DefaultsUpdate) {
    REGISTRY.set_defaults(update)
}

pub fn set_option(name: &str, option: LoggerOption) -> Result<(), MloggingError> {
    REGISTRY.set_option(name, option)
}

pub fn reset(name: &str) -> Result<(), MloggingError> {
    REGISTRY.reset(name)
}

/// Handle to `name` in the global registry, creating an empty entry if
/// needed.
pub fn get_logger(name: &str) -> Result<Logger, MloggingError> {
    REGISTRY.logger(name)
}

/// Builder for configuring a named logger.
///
/// Screen output is on unless disabled, every level is shown unless
/// restricted.
pub struct ConfigBuilder {
    name: String,
    screen: bool,
    destinations: Vec<Destination>,
    levels: LevelSet,
}

impl ConfigBuilder {
    fn destinations(&self) -> Vec<Destination> {
        let screen = self.screen.then_some(Destination::Screen);
        screen
            .into_iter()
            .chain(self.destinations.iter().cloned())
            .collect()
    }

    /// Adds `destination`, replacing any earlier one of the same kind.
    pub fn with_destination(mut self, destination: Destination) -> Self {
        if destination == Destination::Screen {
            return self.with_screen(true);
        }
        self.destinations
            .retain(|existing| existing.kind() != destination.kind());
        self.destinations.push(destination);
        self
    }

    /// Ignore screen logging
    pub fn no_screen(self) -> Self {
        Self {
            screen: false,
            ..self
        }
    }
    /// Dynamically set the screen flag.
    pub fn with_screen(self, yes: bool) -> Self {
        Self {
            screen: yes,
            ..self
        }
    }
    /// Logs to a file under the default local root.
    pub fn with_local(self) -> Self {
        self.with_destination(Destination::local())
    }
    /// Logs to a file under `root`.
    pub fn with_local_root<P: Into<PathBuf>>(self, root: P) -> Self {
        self.with_destination(Destination::local_at(root))
    }
    /// Maybe logs to a file under `root`.
    pub fn maybe_with_local_root<P: Into<PathBuf>>(self, root: Option<P>) -> Self {
        match root {
            Some(root) => self.with_local_root(root),
            None => self,
        }
    }
    /// Sends records to the default remote collector.
    pub fn with_remote(self) -> Self {
        self.with_destination(Destination::remote())
    }
    /// Like [`ConfigBuilder::with_remote`], with the short hostname appended
    /// to the category.
    pub fn with_remote_by_host(self) -> Self {
        self.with_destination(Destination::remote_by_host())
    }
    /// Sets the level allow-list from names; unknown names are dropped.
    pub fn with_levels<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            levels: LevelSet::from_names(names),
            ..self
        }
    }
    pub fn with_level_set(self, levels: LevelSet) -> Self {
        Self { levels, ..self }
    }
    /// Configures the logger in the global registry.
    pub fn init(self) -> Result<Logger, MloggingError> {
        self.init_in(&REGISTRY)
    }
    /// Configures the logger in `registry`.
    pub fn init_in(self, registry: &Registry) -> Result<Logger, MloggingError> {
        registry.configure(&self.name, self.destinations(), self.levels)
    }
}

/// Returns a default ConfigBuilder for logger `name`.
pub fn logger_config(name: &str) -> ConfigBuilder {
    ConfigBuilder {
        name: name.into(),
        screen: true,
        destinations: Vec::new(),
        levels: LevelSet::all(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn capture() -> (Registry, MemoryWriter) {
        let memory = MemoryWriter::new();
        let registry = Registry::new()
            .with_defaults(Defaults {
                format: FormatSpec::new("{name} {level} {message}"),
                ..Defaults::default()
            })
            .with_screen(ScreenTarget::Memory(memory.clone()))
            .without_remote();
        (registry, memory)
    }

    #[test]
    fn test_builder_screen_and_local() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, memory) = capture();
        let log = logger_config("local.test.test")
            .with_local_root(dir.path())
            .init_in(&registry)
            .unwrap();
        assert_eq!(log.handler_kinds(), [HandlerKind::Screen, HandlerKind::Local]);
        log.warning("warning");
        log.flush();
        assert_eq!(memory.lines(), ["local.test.test WARNING warning"]);
        let path = dir.path().join("local").join("test").join("test");
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "local.test.test WARNING warning\n"
        );
    }

    #[test]
    fn test_builder_levels_and_no_screen() {
        let (registry, memory) = capture();
        let log = logger_config("fileinfolog")
            .no_screen()
            .with_levels(["info"])
            .init_in(&registry)
            .unwrap();
        assert!(log.handler_kinds().is_empty());
        assert!(log.accepts(Level::Info));
        assert!(!log.accepts(Level::Warning));
        log.info("nowhere to go");
        log.flush();
        assert!(memory.lines().is_empty());
    }

    #[test]
    fn test_builder_keeps_one_destination_per_kind() {
        let dir = tempfile::tempdir().unwrap();
        let builder = logger_config("x")
            .with_local()
            .with_local_root(dir.path())
            .maybe_with_local_root(None::<PathBuf>);
        assert_eq!(
            builder.destinations(),
            [Destination::Screen, Destination::local_at(dir.path())]
        );
    }

    const EXIT_ROOT_VAR: &str = "MLOGGING_TEST_EXIT_ROOT";

    #[test]
    fn test_records_survive_process_exit() {
        if let Some(root) = std::env::var_os(EXIT_ROOT_VAR) {
            {
                let log = logger_config("exit.child")
                    .no_screen()
                    .with_local_root(PathBuf::from(root))
                    .init()
                    .unwrap();
                log.info("hello world");
                log.warning("last words");
            }
            std::process::exit(0);
        }
        let dir = tempfile::tempdir().unwrap();
        let status = std::process::Command::new(std::env::current_exe().unwrap())
            .args(["--exact", "tests::test_records_survive_process_exit", "--nocapture"])
            .env(EXIT_ROOT_VAR, dir.path())
            .status()
            .unwrap();
        assert!(status.success());
        let content = fs::read_to_string(dir.path().join("exit").join("child")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("exit.child INFO hello world"));
        assert!(lines[1].ends_with("exit.child WARNING last words"));
    }

    #[test]
    fn test_log_bridge_routes_by_target() {
        let _guard = init().unwrap();
        assert!(matches!(init(), Err(MloggingError::AlreadyInitialized)));
        let dir = tempfile::tempdir().unwrap();
        let log = configure(
            "bridge.target",
            [Destination::local_at(dir.path())],
            LevelSet::from_levels([Level::Warning]),
        )
        .unwrap();
        log::warn!(target: "bridge.target", "from the facade");
        log::info!(target: "bridge.target", "filtered out");
        log::error!(target: "unknown.target", "dropped");
        log.flush();
        let content = fs::read_to_string(dir.path().join("bridge").join("target")).unwrap();
        let fields: Vec<&str> = content.trim_end().split_whitespace().collect();
        assert_eq!(fields[1..], ["lib", "bridge.target", "WARNING", "from", "the", "facade"]);
        reset("bridge.target").unwrap();
    }
}

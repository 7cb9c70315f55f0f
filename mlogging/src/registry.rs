//! Named logger entries and the operations that replace or mutate them.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use mlogging_core::{
    Defaults, DefaultsUpdate, Destination, FormatSpec, Handler, HandlerContext, HandlerKind,
    LevelSet, MloggingError, RemoteConnector, ScreenTarget, diagnostic, hostname,
};

use crate::logger::Logger;

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Live state of one logger.
pub(crate) struct LoggerEntry {
    pub(crate) handlers: Vec<Handler>,
    pub(crate) levels: LevelSet,
    pub(crate) format: FormatSpec,
}

impl LoggerEntry {
    fn has(&self, kind: HandlerKind) -> bool {
        self.handlers.iter().any(|handler| handler.kind() == kind)
    }

    /// Detaches every handler of `kind`.
    fn take(&mut self, kind: HandlerKind) -> Vec<Handler> {
        let (taken, kept) = std::mem::take(&mut self.handlers)
            .into_iter()
            .partition(|handler| handler.kind() == kind);
        self.handlers = kept;
        taken
    }
}

/// A logger name with its own lock, so unrelated names never wait on each
/// other.
pub(crate) struct EntrySlot {
    pub(crate) name: Arc<str>,
    pub(crate) entry: RwLock<LoggerEntry>,
    warned_unrouted: AtomicBool,
}

impl EntrySlot {
    fn new(name: &str, format: FormatSpec) -> Self {
        Self {
            name: name.into(),
            entry: RwLock::new(LoggerEntry {
                handlers: Vec::new(),
                levels: LevelSet::all(),
                format,
            }),
            warned_unrouted: AtomicBool::new(false),
        }
    }

    pub(crate) fn warn_unrouted(&self) {
        if !self.warned_unrouted.swap(true, Ordering::Relaxed) {
            diagnostic(format_args!(
                "no destination configured for logger `{}`",
                self.name
            ));
        }
    }

    pub(crate) fn flush(&self) {
        for handler in &read(&self.entry).handlers {
            handler.flush();
        }
    }
}

/// A targeted change to one configured logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggerOption {
    /// Every attached handler switches to this template.
    Format(FormatSpec),
    /// Moves an existing local handler under a new root.
    LocalRoot(PathBuf),
    /// Reconnects an existing remote handler, keeping its category.
    RemoteAddr { host: String, port: u16 },
    /// Renames the category of an existing remote handler in place.
    RemoteCategory(String),
}

/// Handlers are closed outside of any entry lock, after they have been
/// detached.
fn close_all(handlers: Vec<Handler>) {
    for handler in handlers {
        handler.close();
    }
}

/// Maps logger names to their handlers, level sets and formats.
pub struct Registry {
    defaults: RwLock<Defaults>,
    entries: RwLock<HashMap<String, Arc<EntrySlot>>>,
    screen: ScreenTarget,
    remote: Option<Arc<dyn RemoteConnector>>,
    hostname: String,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Defaults come from the `MLOGGING_*` environment; screen output goes
    /// to stdout; the remote transport is TCP when the `tcp` feature is on.
    pub fn new() -> Self {
        Self {
            defaults: RwLock::new(Defaults::from_env()),
            entries: RwLock::new(HashMap::new()),
            screen: ScreenTarget::Stdout,
            remote: default_connector(),
            hostname: hostname(),
        }
    }

    pub fn with_defaults(self, defaults: Defaults) -> Self {
        Self {
            defaults: RwLock::new(defaults),
            ..self
        }
    }

    /// Redirects screen handlers built from now on.
    pub fn with_screen(self, screen: ScreenTarget) -> Self {
        Self { screen, ..self }
    }

    pub fn with_remote<C: RemoteConnector + 'static>(self, connector: C) -> Self {
        Self {
            remote: Some(Arc::new(connector)),
            ..self
        }
    }

    /// Remote destinations are skipped with a diagnostic.
    pub fn without_remote(self) -> Self {
        Self {
            remote: None,
            ..self
        }
    }

    /// Overrides the hostname used by `remote_by_host` categories.
    pub fn with_hostname(self, hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..self
        }
    }

    pub fn defaults(&self) -> Defaults {
        read(&self.defaults).clone()
    }

    /// Only handlers constructed after this call see the new values.
    pub fn set_defaults(&self, update: DefaultsUpdate) {
        write(&self.defaults).apply(update);
    }

    fn get_slot(&self, name: &str) -> Option<Arc<EntrySlot>> {
        read(&self.entries).get(name).cloned()
    }

    fn slot(&self, name: &str) -> Result<Arc<EntrySlot>, MloggingError> {
        if name.is_empty() {
            return Err(MloggingError::EmptyName);
        }
        if let Some(slot) = self.get_slot(name) {
            return Ok(slot);
        }
        let format = self.defaults().format;
        let mut entries = write(&self.entries);
        let slot = entries
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(EntrySlot::new(name, format)));
        Ok(Arc::clone(slot))
    }

    /// Handle to `name`, creating an entry without handlers if needed.
    pub fn logger(&self, name: &str) -> Result<Logger, MloggingError> {
        self.slot(name).map(Logger::new)
    }

    /// Handle to `name` if it has an entry.
    pub fn get(&self, name: &str) -> Option<Logger> {
        self.get_slot(name).map(Logger::new)
    }

    /// Like [`Registry::get`], but the handle does not flush when dropped.
    pub(crate) fn route(&self, name: &str) -> Option<Logger> {
        self.get_slot(name).map(Logger::transient)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.entries).keys().cloned().collect();
        names.sort();
        names
    }

    fn context<'a>(&'a self, defaults: &'a Defaults) -> HandlerContext<'a> {
        HandlerContext {
            defaults,
            screen: &self.screen,
            remote: self.remote.as_deref(),
            hostname: &self.hostname,
        }
    }

    fn build_handlers<I>(&self, name: &str, destinations: I, defaults: &Defaults) -> Vec<Handler>
    where
        I: IntoIterator<Item = Destination>,
    {
        let ctx = self.context(defaults);
        let mut handlers: Vec<Handler> = Vec::new();
        for destination in destinations {
            if handlers.iter().any(|handler| handler.kind() == destination.kind()) {
                diagnostic(format_args!(
                    "logger `{name}`: ignoring duplicate {:?} destination",
                    destination.kind()
                ));
                continue;
            }
            match Handler::build(name, &destination, &ctx) {
                Ok(handler) => handlers.push(handler),
                Err(err) => diagnostic(format_args!("logger `{name}`: skipping destination: {err}")),
            }
        }
        handlers
    }

    /// Replaces everything attached to `name`.
    ///
    /// New handlers are built from the current defaults, swapped in under the
    /// entry lock, and the previous handlers are drained and closed before
    /// this returns. A destination that cannot be built is skipped with a
    /// diagnostic; an empty `destinations` leaves the logger without output.
    pub fn configure<I>(
        &self,
        name: &str,
        destinations: I,
        levels: LevelSet,
    ) -> Result<Logger, MloggingError>
    where
        I: IntoIterator<Item = Destination>,
    {
        let slot = self.slot(name)?;
        let defaults = self.defaults();
        let handlers = self.build_handlers(name, destinations, &defaults);
        let replaced = {
            let mut entry = write(&slot.entry);
            entry.levels = levels;
            entry.format = defaults.format;
            std::mem::replace(&mut entry.handlers, handlers)
        };
        close_all(replaced);
        Ok(Logger::new(slot))
    }

    /// [`Registry::configure`] from destination and level names.
    ///
    /// Unsupported destination names are reported and skipped; unknown level
    /// names are dropped.
    pub fn configure_names<D, L>(
        &self,
        name: &str,
        destinations: D,
        levels: L,
    ) -> Result<Logger, MloggingError>
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        L: IntoIterator,
        L::Item: AsRef<str>,
    {
        let destinations: Vec<Destination> = destinations
            .into_iter()
            .filter_map(|kind| match kind.as_ref().parse::<Destination>() {
                Ok(destination) => Some(destination),
                Err(err) => {
                    diagnostic(format_args!("logger `{name}`: {err}"));
                    None
                }
            })
            .collect();
        self.configure(name, destinations, LevelSet::from_names(levels))
    }

    /// Applies `option` to the configured logger `name`.
    ///
    /// Handler replacements only happen when a handler of that kind is
    /// attached. If the replacement cannot be built the current handler is
    /// kept and the error returned.
    pub fn set_option(&self, name: &str, option: LoggerOption) -> Result<(), MloggingError> {
        let slot = self
            .get_slot(name)
            .ok_or_else(|| MloggingError::NotConfigured(name.into()))?;
        let replaced = {
            let mut entry = write(&slot.entry);
            match option {
                LoggerOption::Format(format) => {
                    for handler in &entry.handlers {
                        handler.set_format(format.clone());
                    }
                    entry.format = format;
                    Vec::new()
                }
                LoggerOption::LocalRoot(root) => {
                    if !entry.has(HandlerKind::Local) {
                        return Ok(());
                    }
                    let handler = Handler::local(&root, name, entry.format.clone())?;
                    let replaced = entry.take(HandlerKind::Local);
                    entry.handlers.push(handler);
                    replaced
                }
                LoggerOption::RemoteAddr { host, port } => {
                    let Some(category) = entry
                        .handlers
                        .iter()
                        .find(|handler| handler.kind() == HandlerKind::Remote)
                        .and_then(|handler| handler.category().map(String::from))
                    else {
                        return Ok(());
                    };
                    let connector = self.remote.as_deref().ok_or_else(|| {
                        MloggingError::RemoteUnavailable("no remote transport available".into())
                    })?;
                    let handler =
                        Handler::remote(connector, &host, port, category, entry.format.clone())?;
                    let replaced = entry.take(HandlerKind::Remote);
                    entry.handlers.push(handler);
                    replaced
                }
                LoggerOption::RemoteCategory(category) => {
                    for handler in entry.handlers.iter_mut() {
                        handler.set_category(&category);
                    }
                    Vec::new()
                }
            }
        };
        close_all(replaced);
        Ok(())
    }

    /// Silences `name`: every handler is replaced by a single void handler.
    pub fn reset(&self, name: &str) -> Result<(), MloggingError> {
        let slot = self.slot(name)?;
        let replaced = std::mem::replace(&mut write(&slot.entry).handlers, vec![Handler::void()]);
        close_all(replaced);
        Ok(())
    }

    /// Waits until every handler of every logger has written its backlog.
    pub fn flush_all(&self) {
        let slots: Vec<Arc<EntrySlot>> = read(&self.entries).values().cloned().collect();
        for slot in slots {
            slot.flush();
        }
    }
}

#[cfg(feature = "tcp")]
fn default_connector() -> Option<Arc<dyn RemoteConnector>> {
    Some(Arc::new(mlogging_core::TcpConnector))
}

#[cfg(not(feature = "tcp"))]
fn default_connector() -> Option<Arc<dyn RemoteConnector>> {
    None
}

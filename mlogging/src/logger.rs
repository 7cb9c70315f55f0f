use std::{fmt::Display, panic::Location, sync::Arc};

use mlogging_core::{HandlerKind, Level, LevelSet, Record, module_of};

use crate::registry::{EntrySlot, read};

/// Flushes the logger's handlers when the last clone of a handle goes away.
struct FlushOnDrop {
    slot: Arc<EntrySlot>,
}

impl Drop for FlushOnDrop {
    fn drop(&mut self) {
        self.slot.flush();
    }
}

/// Handle to a named logger.
///
/// Handles stay valid across reconfiguration: a later `configure`,
/// `set_option` or `reset` on the same name is seen by every clone.
///
/// Dropping the last clone of a handle waits for everything it emitted to
/// be written, so records are not lost when `main` returns. A handle kept
/// in a `static` is never dropped; call [`Logger::flush`] before exiting.
#[derive(Clone)]
pub struct Logger {
    slot: Arc<EntrySlot>,
    _flush: Option<Arc<FlushOnDrop>>,
}

impl Logger {
    pub(crate) fn new(slot: Arc<EntrySlot>) -> Self {
        Self {
            _flush: Some(Arc::new(FlushOnDrop {
                slot: Arc::clone(&slot),
            })),
            slot,
        }
    }

    /// Handle that does not flush on drop, for per-record lookups.
    pub(crate) fn transient(slot: Arc<EntrySlot>) -> Self {
        Self { slot, _flush: None }
    }

    pub fn name(&self) -> &str {
        &self.slot.name
    }

    pub fn levels(&self) -> LevelSet {
        read(&self.slot.entry).levels
    }

    pub fn accepts(&self, level: Level) -> bool {
        self.levels().accepts(level)
    }

    /// Kinds of the attached handlers, in attachment order.
    pub fn handler_kinds(&self) -> Vec<HandlerKind> {
        read(&self.slot.entry)
            .handlers
            .iter()
            .map(|handler| handler.kind())
            .collect()
    }

    /// Records the attached handlers failed to write.
    pub fn failures(&self) -> u64 {
        read(&self.slot.entry)
            .handlers
            .iter()
            .map(|handler| handler.failures())
            .sum()
    }

    /// Sends a record to every attached handler if `level` is in the
    /// logger's level set. Never blocks on I/O and never fails.
    pub fn emit(&self, level: Level, module: &str, message: impl Display) {
        if !self.accepts(level) {
            return;
        }
        // rendered before locking, `message` may log or reconfigure
        let message = message.to_string();
        let entry = read(&self.slot.entry);
        if !entry.levels.accepts(level) {
            return;
        }
        if entry.handlers.is_empty() {
            self.slot.warn_unrouted();
            return;
        }
        let record = Arc::new(Record::new(
            level,
            Arc::clone(&self.slot.name),
            module.to_string(),
            message,
        ));
        for handler in &entry.handlers {
            handler.emit(&record);
        }
    }

    #[track_caller]
    pub fn log(&self, level: Level, message: impl Display) {
        self.emit(level, &module_of(Location::caller().file()), message);
    }

    #[track_caller]
    pub fn debug(&self, message: impl Display) {
        self.log(Level::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, message: impl Display) {
        self.log(Level::Info, message);
    }

    #[track_caller]
    pub fn warning(&self, message: impl Display) {
        self.log(Level::Warning, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl Display) {
        self.log(Level::Error, message);
    }

    #[track_caller]
    pub fn critical(&self, message: impl Display) {
        self.log(Level::Critical, message);
    }

    /// Blocks until every record emitted so far has been written out.
    pub fn flush(&self) {
        self.slot.flush();
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.slot.name)
            .field("levels", &self.levels())
            .field("handlers", &self.handler_kinds())
            .finish()
    }
}

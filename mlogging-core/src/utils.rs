use std::{
    io,
    ops::Deref,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use crossbeam_channel::{RecvTimeoutError, Sender, bounded, unbounded};

use crate::{
    config::MLOGGING_CONFIG,
    error::diagnostic,
    format::{FormatSpec, Record},
    log_writer::LogWriter,
};

/// Messages understood by a writer thread, processed in the order sent.
#[derive(Debug)]
pub enum LogMessage {
    Record(Arc<Record>),
    SetFormat(FormatSpec),
    SetCategory(String),
    Flush(Sender<()>),
    Shutdown,
}

pub struct LogSender {
    sender: Sender<LogMessage>,
    handler: Mutex<Option<JoinHandle<()>>>,
    failures: Arc<AtomicU64>,
}

impl Deref for LogSender {
    type Target = Sender<LogMessage>;
    fn deref(&self) -> &Self::Target {
        &self.sender
    }
}

impl Drop for LogSender {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl LogSender {
    /// Number of records the writer failed to write.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Blocks until everything sent before has been written and flushed.
    pub fn flush(&self) {
        let (ack, done) = bounded(1);
        if self.send(LogMessage::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }

    /// Drains the queue, flushes, and joins the writer thread. Idempotent.
    pub fn shutdown(&self) {
        let mut guard = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = guard.take() {
            // Ignore error if the thread is already gone
            let _ = self.send(LogMessage::Shutdown);
            if handle.join().is_err() {
                diagnostic("logger thread panicked during shutdown");
            }
        }
    }
}

fn report_failure(failures: &AtomicU64, label: &str, err: io::Error) {
    if failures.fetch_add(1, Ordering::Relaxed) == 0 {
        diagnostic(format_args!(
            "write to {label} failed: {err} (further failures are only counted)"
        ));
    }
}

/// Spawns the thread owning `writer` and returns the sending side.
///
/// Records are batched and the writer is flushed every
/// `MLOGGING_FLUSH_INTERVAL_MS`, on [`LogSender::flush`] and on shutdown.
pub fn spawn_log_thread<W: LogWriter + Send + 'static>(
    mut writer: W,
    mut format: FormatSpec,
    label: String,
) -> LogSender {
    let (sender, receiver) = unbounded::<LogMessage>();
    let failures = Arc::new(AtomicU64::new(0));
    let thread_failures = Arc::clone(&failures);
    let handler = std::thread::spawn(move || {
        let failures = thread_failures;
        let mut batch = Vec::with_capacity(32);
        let flush_interval = MLOGGING_CONFIG.flush_interval();
        let mut last_flush = Instant::now();
        let mut dirty = false;
        loop {
            // Calculate timeout until next flush
            let elapsed = last_flush.elapsed();
            let timeout = if elapsed >= flush_interval {
                Duration::from_millis(1)
            } else {
                flush_interval - elapsed
            };

            match receiver.recv_timeout(timeout) {
                Ok(msg) => {
                    batch.push(msg);
                    while let Ok(msg) = receiver.try_recv() {
                        batch.push(msg);
                        if batch.len() >= 32 {
                            break;
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if dirty && last_flush.elapsed() >= flush_interval {
                        if let Err(err) = writer.flush() {
                            report_failure(&failures, &label, err);
                        }
                        dirty = false;
                        last_flush = Instant::now();
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }

            let mut should_shutdown = false;
            for message in batch.drain(..) {
                match message {
                    LogMessage::Record(record) => {
                        let line = format.render(&record, writer.colorize());
                        if let Err(err) = writer.write_line(&line) {
                            report_failure(&failures, &label, err);
                        }
                        dirty = true;
                    }
                    LogMessage::SetFormat(new_format) => format = new_format,
                    LogMessage::SetCategory(category) => writer.set_category(&category),
                    LogMessage::Flush(ack) => {
                        if let Err(err) = writer.flush() {
                            report_failure(&failures, &label, err);
                        }
                        dirty = false;
                        last_flush = Instant::now();
                        let _ = ack.send(());
                    }
                    LogMessage::Shutdown => {
                        should_shutdown = true;
                        break;
                    }
                }
            }

            // Flush periodically or when shutting down
            if should_shutdown || (dirty && last_flush.elapsed() >= flush_interval) {
                if let Err(err) = writer.flush() {
                    report_failure(&failures, &label, err);
                }
                dirty = false;
                last_flush = Instant::now();
            }

            if should_shutdown {
                break;
            }
        }
    });
    LogSender {
        sender,
        handler: Mutex::new(Some(handler)),
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        level::Level,
        log_writer::{LogScreen, MemoryWriter, ScreenTarget},
    };

    struct FailingWriter;

    impl LogWriter for FailingWriter {
        fn write_line(&mut self, _: &str) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record(level: Level, message: &str) -> Arc<Record> {
        Arc::new(Record::new(level, "t".into(), "utils".into(), message.into()))
    }

    #[test]
    fn test_records_and_format_changes_are_ordered() {
        let memory = MemoryWriter::new();
        let sender = spawn_log_thread(
            LogScreen::new(ScreenTarget::Memory(memory.clone())),
            FormatSpec::new("{level} {message}"),
            "screen".into(),
        );
        sender.send(LogMessage::Record(record(Level::Info, "one"))).unwrap();
        sender
            .send(LogMessage::SetFormat(FormatSpec::new("{message}")))
            .unwrap();
        sender.send(LogMessage::Record(record(Level::Info, "two"))).unwrap();
        sender.flush();
        assert_eq!(memory.lines(), ["INFO one", "two"]);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let memory = MemoryWriter::new();
        let sender = spawn_log_thread(
            LogScreen::new(ScreenTarget::Memory(memory.clone())),
            FormatSpec::new("{message}"),
            "screen".into(),
        );
        for i in 0..100 {
            sender
                .send(LogMessage::Record(record(Level::Debug, &i.to_string())))
                .unwrap();
        }
        sender.shutdown();
        sender.shutdown();
        assert_eq!(memory.lines().len(), 100);
        assert_eq!(memory.lines()[99], "99");
    }

    #[test]
    fn test_write_failures_are_counted() {
        let sender = spawn_log_thread(FailingWriter, FormatSpec::default(), "failing".into());
        for _ in 0..3 {
            sender.send(LogMessage::Record(record(Level::Error, "x"))).unwrap();
        }
        sender.flush();
        assert_eq!(sender.failures(), 3);
    }
}

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Component, Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use crate::{error::MloggingError, remote::RemoteTransport};

/// Sink at the end of a writer thread.
pub trait LogWriter {
    fn write_line(&mut self, line: &str) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    /// Only meaningful for remote writers.
    fn set_category(&mut self, _category: &str) {}
    /// Whether the level should be rendered with terminal colors.
    fn colorize(&self) -> bool {
        false
    }
}

/// Shared in-memory byte sink. Used to capture screen output.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(String::from).collect()
    }

    pub fn clear(&self) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Where screen handlers write.
#[derive(Debug, Clone, Default)]
pub enum ScreenTarget {
    #[default]
    Stdout,
    Memory(MemoryWriter),
}

#[derive(Debug, Default)]
pub struct LogScreen {
    target: ScreenTarget,
}

impl LogScreen {
    pub fn new(target: ScreenTarget) -> Self {
        Self { target }
    }
}

impl LogWriter for LogScreen {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        match &mut self.target {
            ScreenTarget::Stdout => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{line}")?;
                stdout.flush()
            }
            // One write per line so concurrent handlers never interleave
            ScreenTarget::Memory(memory) => memory.write_all(format!("{line}\n").as_bytes()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.target {
            ScreenTarget::Stdout => io::stdout().flush(),
            ScreenTarget::Memory(_) => Ok(()),
        }
    }

    fn colorize(&self) -> bool {
        matches!(self.target, ScreenTarget::Stdout)
    }
}

/// File of logger `name` under `root`: every dot of the name becomes a
/// directory level.
///
/// Only plain path components are kept, so the result never leaves `root`.
pub fn local_path(root: &Path, name: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in name.split('.') {
        path.extend(Path::new(part).components().filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        }));
    }
    path
}

pub struct LogFile {
    path: PathBuf,
    file: BufWriter<File>,
}

impl LogFile {
    /// Creates missing parent directories and opens the logger's file for
    /// appending.
    pub fn open(root: &Path, name: &str) -> Result<Self, MloggingError> {
        let path = local_path(root, name);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|err| MloggingError::filesystem(dir, err))?;
        }
        let file = File::options()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| MloggingError::filesystem(&path, err))?;
        Ok(Self {
            path,
            file: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogWriter for LogFile {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.file, "{line}")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

pub struct LogRemote {
    category: String,
    transport: Box<dyn RemoteTransport>,
}

impl LogRemote {
    pub fn new(category: String, transport: Box<dyn RemoteTransport>) -> Self {
        Self {
            category,
            transport,
        }
    }
}

impl LogWriter for LogRemote {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.transport.send(&self.category, line)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.transport.flush()
    }

    fn set_category(&mut self, category: &str) {
        self.category = category.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path() {
        let path = local_path(Path::new("/tmp/x"), "a.b.c");
        assert_eq!(path, Path::new("/tmp/x").join("a").join("b").join("c"));
    }

    #[test]
    fn test_local_path_stays_under_root() {
        let root = Path::new("/tmp/x");
        assert_eq!(local_path(root, ".hidden"), root.join("hidden"));
        assert_eq!(local_path(root, "a..b"), root.join("a").join("b"));
        assert_eq!(local_path(root, "../etc/passwd"), root.join("etc").join("passwd"));
        assert_eq!(local_path(root, "/abs.x"), root.join("abs").join("x"));
    }

    #[test]
    fn test_log_file_creates_dirs_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let mut log_file = LogFile::open(dir.path(), "svc.worker").unwrap();
        assert!(dir.path().join("svc").is_dir());
        log_file.write_line("first").unwrap();
        log_file.flush().unwrap();
        drop(log_file);

        let mut log_file = LogFile::open(dir.path(), "svc.worker").unwrap();
        log_file.write_line("second").unwrap();
        log_file.flush().unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("svc").join("worker")).unwrap(),
            "first\nsecond\n"
        );
    }

    #[test]
    fn test_log_file_reports_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blocker"), "").unwrap();
        let err = LogFile::open(dir.path(), "blocker.child").err().unwrap();
        assert!(matches!(err, MloggingError::Filesystem { .. }));
    }

    #[test]
    fn test_memory_screen() {
        let memory = MemoryWriter::new();
        let mut screen = LogScreen::new(ScreenTarget::Memory(memory.clone()));
        assert!(!screen.colorize());
        screen.write_line("hello").unwrap();
        screen.write_line("world").unwrap();
        assert_eq!(memory.lines(), ["hello", "world"]);
    }
}

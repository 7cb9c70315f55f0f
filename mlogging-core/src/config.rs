use std::{path::PathBuf, sync::LazyLock, time::Duration};

use derive_from_env::FromEnv;

use crate::{error::diagnostic, format::FormatSpec};

#[derive(FromEnv)]
#[from_env(prefix = "MLOGGING")]
#[allow(non_snake_case)]
pub struct MloggingConfig {
    #[from_env(default = "100")]
    pub FLUSH_INTERVAL_MS: u64,
    #[from_env(default = "{time} {module} {name} {level} {message}")]
    pub FORMAT: String,
    #[from_env(default = "/tmp")]
    pub LOCAL_ROOT: String,
    #[from_env(default = "127.0.0.1")]
    pub REMOTE_HOST: String,
    #[from_env(default = "1456")]
    pub REMOTE_PORT: u16,
}

impl MloggingConfig {
    fn builtin() -> Self {
        Self {
            FLUSH_INTERVAL_MS: 100,
            FORMAT: crate::format::DEFAULT_FORMAT.into(),
            LOCAL_ROOT: "/tmp".into(),
            REMOTE_HOST: "127.0.0.1".into(),
            REMOTE_PORT: 1456,
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.FLUSH_INTERVAL_MS)
    }
}

pub static MLOGGING_CONFIG: LazyLock<MloggingConfig> = LazyLock::new(|| {
    MloggingConfig::from_env().unwrap_or_else(|err| {
        diagnostic(format_args!(
            "invalid MLOGGING_* environment ({err:?}), using built-in defaults"
        ));
        MloggingConfig::builtin()
    })
});

/// Values used when a handler is constructed.
///
/// Changing them never touches handlers that already exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub format: FormatSpec,
    pub local_root: PathBuf,
    pub remote_host: String,
    pub remote_port: u16,
}

impl Defaults {
    /// Defaults seeded from the `MLOGGING_*` environment.
    pub fn from_env() -> Self {
        let config = &*MLOGGING_CONFIG;
        Self {
            format: FormatSpec::new(config.FORMAT.as_str()),
            local_root: PathBuf::from(&config.LOCAL_ROOT),
            remote_host: config.REMOTE_HOST.clone(),
            remote_port: config.REMOTE_PORT,
        }
    }

    /// Overwrites only the fields present in `update`.
    pub fn apply(&mut self, update: DefaultsUpdate) {
        let DefaultsUpdate {
            format,
            local_root,
            remote_host,
            remote_port,
        } = update;
        if let Some(format) = format {
            self.format = format;
        }
        if let Some(local_root) = local_root {
            self.local_root = local_root;
        }
        if let Some(remote_host) = remote_host {
            self.remote_host = remote_host;
        }
        if let Some(remote_port) = remote_port {
            self.remote_port = remote_port;
        }
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            format: FormatSpec::default(),
            local_root: PathBuf::from("/tmp"),
            remote_host: "127.0.0.1".into(),
            remote_port: 1456,
        }
    }
}

/// Partial update of [`Defaults`].
#[derive(Debug, Clone, Default)]
pub struct DefaultsUpdate {
    format: Option<FormatSpec>,
    local_root: Option<PathBuf>,
    remote_host: Option<String>,
    remote_port: Option<u16>,
}

impl DefaultsUpdate {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_format(self, format: impl Into<FormatSpec>) -> Self {
        Self {
            format: Some(format.into()),
            ..self
        }
    }
    pub fn with_local_root(self, root: impl Into<PathBuf>) -> Self {
        Self {
            local_root: Some(root.into()),
            ..self
        }
    }
    pub fn with_remote_host(self, host: impl Into<String>) -> Self {
        Self {
            remote_host: Some(host.into()),
            ..self
        }
    }
    pub fn with_remote_port(self, port: u16) -> Self {
        Self {
            remote_port: Some(port),
            ..self
        }
    }
}

#[test]
fn test_apply_keeps_unspecified_fields() {
    let mut defaults = Defaults::default();
    defaults.apply(
        DefaultsUpdate::new()
            .with_format("{message}")
            .with_remote_port(9000),
    );
    assert_eq!(defaults.format.template(), "{message}");
    assert_eq!(defaults.remote_port, 9000);
    assert_eq!(defaults.local_root, PathBuf::from("/tmp"));
    assert_eq!(defaults.remote_host, "127.0.0.1");
}

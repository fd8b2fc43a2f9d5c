//! Structured logging setup.
//!
//! Library code only emits `tracing` events. Binaries install a subscriber with
//! [`init_tracing`]; `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    pub service_name: Option<String>,
    pub enabled: bool,
    pub level: TracingLevel,
    /// Emit newline-delimited JSON instead of human-readable lines.
    pub json: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingLevel {
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl TracingLevel {
    /// Map a `-v` count: none is `info`, one is `debug`, more is `trace`.
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => Self::Info,
            1 => Self::Debug,
            _ => Self::Trace,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn level(mut self, level: TracingLevel) -> Self {
        self.level = level;
        self
    }

    pub fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Filter directive: the configured level for this crate, `warn` elsewhere.
    pub fn directive(&self) -> String {
        let target = self
            .service_name
            .as_deref()
            .unwrap_or(env!("CARGO_CRATE_NAME"))
            .replace('-', "_");
        format!("warn,{}={}", target, self.level.as_str())
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directive()))
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Returns `false` when tracing is disabled or a subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> bool {
    if !config.enabled {
        return false;
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.is_ok()
}

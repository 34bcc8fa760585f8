use std::sync::Once;

use env_logger::fmt::TimestampPrecision;

/// How the process-wide logger is set up.
///
/// `filter` uses the `env_logger` directive syntax
/// ("warn,diorama_scene=debug"); when absent `RUST_LOG` is consulted, then
/// `info`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter: Option<String>,
    pub style: env_logger::WriteStyle,
    /// Millisecond timestamps on each line. Off for test output.
    pub timestamps: bool,
    /// Prefix lines with the emitting module path.
    pub targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: None, style: env_logger::WriteStyle::Auto, timestamps: true, targets: true }
    }
}

impl LoggingConfig {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self { filter: Some(filter.into()), ..Self::default() }
    }

    /// Compact, uncolored output captured by the test harness.
    pub fn for_tests() -> Self {
        Self {
            filter: Some("debug".into()),
            style: env_logger::WriteStyle::Never,
            timestamps: false,
            targets: false,
        }
    }

    fn builder(&self) -> env_logger::Builder {
        let mut builder = env_logger::Builder::new();
        match self.filter.clone().or_else(|| std::env::var("RUST_LOG").ok()) {
            Some(filter) => builder.parse_filters(&filter),
            None => builder.filter_level(log::LevelFilter::Info),
        };
        builder
            .write_style(self.style)
            .format_timestamp(self.timestamps.then_some(TimestampPrecision::Millis))
            .format_target(self.targets);
        builder
    }
}

static INIT: Once = Once::new();

/// Installs the global logger on the first call; later calls do nothing.
///
/// Returns `false` when some other logger was already installed, which
/// happens when an embedding host sets up its own.
pub fn init_logging(config: LoggingConfig) -> bool {
    let mut installed = false;
    INIT.call_once(|| {
        installed = config.builder().is_test(!config.timestamps).try_init().is_ok();
        if installed {
            log::debug!("logging initialized");
        }
    });
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_first_call_installs() {
        init_logging(LoggingConfig::for_tests());
        assert!(!init_logging(LoggingConfig::default()));
        log::debug!("still logging after a second init");
    }
}

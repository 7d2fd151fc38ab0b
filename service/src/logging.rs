use crate::config::Config;
use log::{LevelFilter, SetLoggerError};
use simplelog::{self, ConfigBuilder};

/// Modules to filter out from logging when not in Trace mode.
/// The HTTP stack logs every relayed chunk of a long-lived stream.
const FILTERED_MODULES: &[&str] = &["tower", "tower_http", "tracing", "hyper", "axum", "mio"];

pub struct Logger {}

impl Logger {
    /// Installs the global console logger.
    ///
    /// Every record carries its source location and, at Debug and above, the
    /// emitting thread, which is what makes interleaved producer and broadcast
    /// output readable.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        let level = config.log_level_filter;
        let log_config = Self::build_log_config(level);

        simplelog::TermLogger::init(
            Self::convert_level_filter(level),
            log_config,
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )
    }

    fn convert_level_filter(level: LevelFilter) -> simplelog::LevelFilter {
        match level {
            LevelFilter::Off => simplelog::LevelFilter::Off,
            LevelFilter::Error => simplelog::LevelFilter::Error,
            LevelFilter::Warn => simplelog::LevelFilter::Warn,
            LevelFilter::Info => simplelog::LevelFilter::Info,
            LevelFilter::Debug => simplelog::LevelFilter::Debug,
            LevelFilter::Trace => simplelog::LevelFilter::Trace,
        }
    }

    /// Trace shows dependency output too.
    fn should_filter_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }

    fn should_log_threads(level: LevelFilter) -> bool {
        level >= LevelFilter::Debug
    }

    fn build_log_config(level: LevelFilter) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder
            .set_time_format_rfc3339()
            .set_location_level(simplelog::LevelFilter::Error);

        if Self::should_log_threads(level) {
            builder
                .set_thread_level(simplelog::LevelFilter::Error)
                .set_thread_mode(simplelog::ThreadLogMode::Both);
        } else {
            builder.set_thread_level(simplelog::LevelFilter::Off);
        }

        if Self::should_filter_dependencies(level) {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(*module);
            }
        }

        builder.build()
    }
}

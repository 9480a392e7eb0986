//! Structured logging for the voxmap tile streaming core.
//!
//! Sets up span-based, filterable logging via the `tracing` ecosystem: console
//! output with uptime timestamps and module paths, plus JSON file logging in
//! debug builds so tile load failures can be analysed after a session.

use std::path::Path;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use voxmap_config::Config;

/// Filter used when neither `RUST_LOG` nor the config set a level.
/// HTTP client internals are noisy at `info`.
pub const DEFAULT_FILTER: &str = "info,wgpu=warn,naga=warn,hyper=warn,hyper_util=warn,reqwest=warn";

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "voxmap.log";

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - whether file logging is enabled
/// * `config` - optional configuration providing `debug.log_level`
///
/// `RUST_LOG` always wins over the configured level.
///
/// # Examples
///
/// ```no_run
/// use voxmap_config::Config;
/// use voxmap_log::init_logging;
///
/// let config = Config::default();
/// init_logging(None, false, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_string(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true) // tokio workers are named
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Resolve the filter directive string from the configuration.
///
/// A bare level such as `debug` is applied to the voxmap crates only, so that
/// dependency noise stays at the default level.
pub fn filter_string(config: Option<&Config>) -> String {
    match config.map(|c| c.debug.log_level.trim()) {
        Some(level) if !level.is_empty() && !level.contains('=') && level != "info" => {
            format!(
                "{DEFAULT_FILTER},voxmap_manager={level},voxmap_loader={level},\
                 voxmap_cache={level},voxmap_lod={level},voxmap_cli={level}"
            )
        }
        Some(directives) if directives.contains('=') => directives.to_string(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        let filter_str = format!("{}", default_env_filter());
        assert!(filter_str.contains("reqwest=warn"));
        assert!(filter_str.contains("info"));
    }

    #[test]
    fn test_filter_without_config_is_default() {
        assert_eq!(filter_string(None), DEFAULT_FILTER);
    }

    #[test]
    fn test_bare_level_scoped_to_voxmap_crates() {
        let mut config = Config::default();
        config.debug.log_level = "debug".to_string();
        let filter = filter_string(Some(&config));
        assert!(filter.contains("voxmap_loader=debug"));
        assert!(filter.contains("voxmap_manager=debug"));
        assert!(filter.starts_with(DEFAULT_FILTER));
    }

    #[test]
    fn test_full_directives_passed_through() {
        let mut config = Config::default();
        config.debug.log_level = "warn,voxmap_cache=trace".to_string();
        assert_eq!(filter_string(Some(&config)), "warn,voxmap_cache=trace");
    }

    #[test]
    fn test_env_filter_parsing() {
        let valid_filters = [
            "info",
            "debug,voxmap_loader=trace",
            "warn,voxmap_manager=debug,voxmap_cache=trace",
            "error",
        ];

        for filter_str in &valid_filters {
            let result = EnvFilter::try_from(*filter_str);
            assert!(result.is_ok(), "Failed to parse filter: {}", filter_str);
        }
    }

    #[test]
    fn test_generated_filters_parse() {
        let mut config = Config::default();
        for level in ["trace", "debug", "warn", "error", "info", ""] {
            config.debug.log_level = level.to_string();
            let filter = filter_string(Some(&config));
            assert!(EnvFilter::try_new(&filter).is_ok(), "bad filter: {filter}");
        }
    }

    #[test]
    fn test_file_logger_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp_dir.path()).unwrap();
        let log_file_path = temp_dir.path().join(LOG_FILE_NAME);
        assert_eq!(log_file_path.file_name().unwrap(), "voxmap.log");
    }

    #[test]
    fn test_json_layer_keeps_structured_fields() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(LOG_FILE_NAME);
        let file = std::fs::File::create(&path).unwrap();
        let layer = fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .json();

        tracing::subscriber::with_default(tracing_subscriber::registry().with(layer), || {
            tracing::warn!(tile = "overworld/0/5/5", attempts = 3u32, "tile load failed");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        let first = contents.lines().next().unwrap();
        let line: serde_json::Value = serde_json::from_str(first).unwrap();
        assert_eq!(line["level"], "WARN");
        assert_eq!(line["fields"]["message"], "tile load failed");
        assert_eq!(line["fields"]["tile"], "overworld/0/5/5");
        assert_eq!(line["fields"]["attempts"], 3);
    }
}

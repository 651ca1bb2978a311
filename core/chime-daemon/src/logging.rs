//! Tracing bootstrap for the daemon.
//!
//! Default is stderr at info, overridable with `RUST_LOG`. Setting
//! `CHIME_DEBUG_LOG` forces debug level and, when a home directory is
//! available, additionally writes to `~/.chime/logs/` so race windows can
//! be inspected after the fact.

use std::env;

use fs_err as fs;
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "CHIME_DEBUG_LOG";

pub fn init() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let debug_enabled = env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);

    if debug_enabled {
        if let Some(home) = dirs::home_dir() {
            let log_dir = home.join(".chime").join("logs");
            if fs::create_dir_all(&log_dir).is_ok() {
                let appender = tracing_appender::rolling::daily(log_dir, "daemon.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                tracing_subscriber::fmt()
                    .with_env_filter(build_filter(debug_enabled))
                    .with_writer(writer)
                    .with_ansi(false)
                    .init();
                return Some(guard);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(build_filter(debug_enabled))
        .init();
    None
}

fn build_filter(debug_enabled: bool) -> EnvFilter {
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

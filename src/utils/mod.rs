// src/utils/mod.rs
use log::{info, Level, LevelFilter};
use std::fmt;

/// Current wall-clock time in epoch seconds.
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Reads `LOG_LEVEL` (e.g. `debug`, `warn`), defaulting to `info`.
pub fn log_level_from_env() -> LevelFilter {
    std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// `<timestamp> [LEVEL] <target> message`
fn log_line(timestamp: &str, level: Level, target: &str, message: impl fmt::Display) -> String {
    format!("{} [{}] {} {}", timestamp, level, target, message)
}

pub fn setup_logging(level: LevelFilter) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            let timestamp =
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);
            out.finish(format_args!(
                "{}",
                log_line(&timestamp, record.level(), record.target(), message)
            ))
        })
        .level(level)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("redis", LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;
    info!("Logging initialized.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_line_layout() {
        assert_eq!(
            log_line(
                "2024-05-01T08:00:00+08:00",
                Level::Warn,
                "api_cache_poller::poller",
                "No flight records returned"
            ),
            "2024-05-01T08:00:00+08:00 [WARN] api_cache_poller::poller No flight records returned"
        );
    }

    #[test]
    fn test_now_ts_is_recent() {
        // 2023-11-14, well before any test run
        assert!(now_ts() > 1_700_000_000);
    }
}

//! Optional tracing around each caching operation.
//!
//! When enabled, every operation runs inside a `kv` span tagged with the
//! operation name and `measured = true`, its duration is logged at debug
//! level, and failures are logged at error level before being returned.
//! When disabled the operation is called directly.

use std::time::Instant;

use tracing::{debug, error, info_span};

use crate::config::Config;

/// Environment variable that turns monitoring on regardless of config.
pub const MONITORING_ENV: &str = "TALLY_KV_MONITORING";

/// Span wrapper for caching operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Monitor {
    enabled: bool,
}

impl Monitor {
    /// A monitor in the given state.
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Enabled by `kv.monitoring` in config or a truthy `TALLY_KV_MONITORING`.
    pub fn from_config(config: &Config) -> Self {
        let from_env = std::env::var(MONITORING_ENV)
            .ok()
            .is_some_and(|v| is_truthy(&v));
        Self::new(config.kv.monitoring.unwrap_or(false) || from_env)
    }

    /// Whether spans are emitted.
    pub const fn enabled(self) -> bool {
        self.enabled
    }

    /// Run `f`, traced when enabled.
    pub fn wrap<T, E: std::fmt::Display>(
        self,
        name: &'static str,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        if !self.enabled {
            return f();
        }

        let span = info_span!("kv", operation = name, measured = true);
        let _entered = span.enter();
        debug!(operation = name, "calling");

        let start = Instant::now();
        let result = f();
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(_) => debug!(operation = name, elapsed_ms, "finished"),
            Err(e) => error!(
                operation = name,
                elapsed_ms,
                error = %e,
                "failed to call kv store caching func"
            ),
        }
        result
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_passes_results_through() {
        let monitor = Monitor::new(false);
        assert_eq!(monitor.wrap("op", || Ok::<_, String>(5)), Ok(5));
        assert_eq!(
            monitor.wrap("op", || Err::<i32, _>("boom".to_string())),
            Err("boom".to_string())
        );
    }

    #[test]
    fn enabled_passes_results_through() {
        let monitor = Monitor::new(true);
        assert_eq!(monitor.wrap("op", || Ok::<_, String>("v")), Ok("v"));
        assert!(monitor.wrap("op", || Err::<(), _>("boom")).is_err());
    }

    #[test]
    fn config_flag_enables() {
        let mut config = Config::default();
        config.kv.monitoring = Some(true);
        assert!(Monitor::from_config(&config).enabled());
    }

    #[test]
    fn truthy_values() {
        for v in ["1", "true", "TRUE", " yes ", "on"] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["", "0", "false", "off", "prod"] {
            assert!(!is_truthy(v), "{v}");
        }
    }
}

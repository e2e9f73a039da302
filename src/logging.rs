use alloc::{string::String, sync::Arc};
use core::sync::atomic::{AtomicBool, Ordering};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter, Registry};

use crate::{any::Capabilities, component::Component};

/// Environment variable overriding [`LogConfig::level`].
pub const LOG_FILTER_ENV: &str = "WIREUP_LOG";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directives, `info` or `wireup=debug,warn`.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
        }
    }
}

/// Logging subsystem configured by the container once the config is loaded.
pub trait LogProvider: Send + Sync {
    /// # Errors
    /// Returns an error if the configuration can't be applied. The container logs it and continues.
    fn configure(&self, config: &LogConfig) -> anyhow::Result<()>;
}

/// Installs a `tracing-subscriber` formatter as the global subscriber.
///
/// An already installed global subscriber is kept.
#[derive(Debug, Default)]
pub struct TracingLog {
    installed: AtomicBool,
}

impl TracingLog {
    /// `true` if this provider installed the global subscriber.
    #[inline]
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }
}

impl LogProvider for TracingLog {
    fn configure(&self, config: &LogConfig) -> anyhow::Result<()> {
        let filter = match EnvFilter::try_from_env(LOG_FILTER_ENV) {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&config.level)?,
        };

        match Registry::default().with(filter).with(fmt::layer().with_target(true)).try_init() {
            Ok(()) => {
                self.installed.store(true, Ordering::Release);
                debug!(level = %config.level, "Subscriber installed");
            }
            Err(err) => debug!("Keeping the existing subscriber: {}", err),
        }
        Ok(())
    }
}

impl Component for TracingLog {
    fn provide(this: &Arc<Self>, capabilities: &mut Capabilities) {
        capabilities.insert(this.clone() as Arc<dyn LogProvider>);
    }
}

#[cfg(test)]
mod tests {
    use super::{LogConfig, LogProvider as _, TracingLog};

    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_existing_subscriber_is_kept() {
        let log = TracingLog::default();
        log.configure(&LogConfig::default()).unwrap();
        assert!(!log.is_installed());
    }

    #[test]
    #[traced_test]
    fn test_invalid_level() {
        let log = TracingLog::default();
        let config = LogConfig {
            level: String::from("wireup=loud"),
        };
        if std::env::var_os(super::LOG_FILTER_ENV).is_none() {
            assert!(log.configure(&config).is_err());
        }
    }
}

use crate::error::{Error, Result};
use crate::executor::{PanicStrategy, Qos};
use std::sync::OnceLock;

const MAX_THREADS: usize = 1024;

static GLOBAL_CONFIG: OnceLock<Config> = OnceLock::new();

/// Settings for the platform layer: pool sizing, thread naming and the
/// policy applied to panicking work.
#[derive(Debug, Clone)]
pub struct Config {
    /// Threads per concurrent pool at `Default` and higher tiers.
    /// `None` means one per CPU.
    pub default_pool_threads: Option<usize>,
    /// Threads for the `Utility` and `Background` pools.
    /// `None` means a quarter of the CPUs, at least one.
    pub background_pool_threads: Option<usize>,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
    pub panic_strategy: PanicStrategy,
    /// Raise the OS niceness of `Utility`/`Background` threads (Linux only).
    pub lower_background_priority: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_pool_threads: None,
            background_pool_threads: None,
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "strand".to_string(),
            panic_strategy: PanicStrategy::default(),
            lower_background_priority: false,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("default_pool_threads", self.default_pool_threads),
            ("background_pool_threads", self.background_pool_threads),
        ] {
            if let Some(n) = value {
                if n == 0 {
                    return Err(Error::config(format!("{} must be > 0", name)));
                }
                if n > MAX_THREADS {
                    return Err(Error::config(format!(
                        "{} too large (max {})",
                        name, MAX_THREADS
                    )));
                }
            }
        }

        if self.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }

        if let Some(size) = self.stack_size {
            if size < 64 * 1024 {
                return Err(Error::config("stack_size must be at least 64 KiB"));
            }
        }

        Ok(())
    }

    /// Number of threads the concurrent pool for `qos` starts with.
    pub fn pool_threads(&self, qos: Qos) -> usize {
        match qos {
            Qos::Background | Qos::Utility => self
                .background_pool_threads
                .unwrap_or_else(|| (num_cpus::get() / 4).max(1)),
            _ => self.default_pool_threads.unwrap_or_else(num_cpus::get),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn default_pool_threads(mut self, n: usize) -> Self {
        self.config.default_pool_threads = Some(n);
        self
    }

    pub fn background_pool_threads(mut self, n: usize) -> Self {
        self.config.background_pool_threads = Some(n);
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn lower_background_priority(mut self, lower: bool) -> Self {
        self.config.lower_background_priority = lower;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Installs `config` for the whole process.
///
/// Must run before anything touches the platform (a context accessor, a
/// pool, the timer). Fails with [`Error::AlreadyInitialized`] afterwards, or
/// when called a second time.
pub fn configure(config: Config) -> Result<()> {
    config.validate()?;
    GLOBAL_CONFIG
        .set(config)
        .map_err(|_| Error::AlreadyInitialized)
}

/// The process-wide configuration. The first call freezes it.
pub(crate) fn current() -> &'static Config {
    GLOBAL_CONFIG.get_or_init(Config::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_zero_threads() {
        let result = Config::builder().default_pool_threads(0).build();
        assert!(matches!(result, Err(Error::Config(_))));

        let result = Config::builder().background_pool_threads(4096).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_empty_prefix() {
        assert!(Config::builder().thread_name_prefix("").build().is_err());
    }

    #[test]
    fn test_pool_threads_per_tier() {
        let config = Config::builder()
            .default_pool_threads(6)
            .background_pool_threads(2)
            .build()
            .unwrap();

        assert_eq!(config.pool_threads(Qos::Default), 6);
        assert_eq!(config.pool_threads(Qos::UserInteractive), 6);
        assert_eq!(config.pool_threads(Qos::Background), 2);
        assert_eq!(config.pool_threads(Qos::Utility), 2);
    }

    #[test]
    fn test_default_background_pool_is_never_empty() {
        assert!(Config::default().pool_threads(Qos::Background) >= 1);
    }

    #[test]
    fn test_configure_after_start_fails() {
        let _ = current();
        let result = configure(Config::default());
        assert!(matches!(result, Err(Error::AlreadyInitialized)));
    }
}

//! Queue pool configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Environment variables (runtime)
//! 2. User's `QP_CONFIG_RS` file (compile-time)
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use qpool_runtime::config::PoolConfig;
//! use qpool_runtime::sync::NotifyPolicy;
//!
//! let config = PoolConfig::from_env()
//!     .queue_capacity(64)
//!     .notify_policy(NotifyPolicy::Broadcast);
//! ```

pub mod defaults;

use qpool_core::env::{env_get, env_get_str};
use qpool_core::error::ConfigError;

use crate::sync::NotifyPolicy;

/// Settings applied to every queue of a pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Slots per queue, fixed once the queue exists
    pub queue_capacity: usize,
    /// Wake policy used by every queue's condition variable
    pub notify_policy: NotifyPolicy,
}

/// Compile-time defaults; use `from_env` for runtime overrides
impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolConfig {
    /// Compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `QP_QUEUE_CAPACITY` - Slots per queue
    /// - `QP_NOTIFY_POLICY` - `broadcast` or `signal`
    pub fn from_env() -> Self {
        let base = Self::new();
        let policy = env_get_str("QP_NOTIFY_POLICY", base.notify_policy.name());
        Self {
            queue_capacity: env_get("QP_QUEUE_CAPACITY", base.queue_capacity),
            notify_policy: NotifyPolicy::parse(&policy).unwrap_or(base.notify_policy),
        }
    }

    /// Compile-time defaults only (no env override)
    pub fn new() -> Self {
        Self {
            queue_capacity: defaults::QUEUE_CAPACITY,
            notify_policy: if defaults::NOTIFY_BROADCAST {
                NotifyPolicy::Broadcast
            } else {
                NotifyPolicy::Signal
            },
        }
    }

    // Builder methods

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn notify_policy(mut self, policy: NotifyPolicy) -> Self {
        self.notify_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue("queue_capacity must be > 0"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("qpool configuration:");
        eprintln!("  queue_capacity:  {}", self.queue_capacity);
        eprintln!("  notify_policy:   {}", self.notify_policy.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    // Tests that set QP_* variables must not interleave
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[test]
    fn test_library_defaults() {
        let config = PoolConfig::new();
        assert!(config.validate().is_ok());
        assert!(config.queue_capacity > 0);
    }

    #[test]
    fn test_default_ignores_env() {
        let _g = env_lock();
        std::env::set_var("QP_QUEUE_CAPACITY", "7");
        let config = PoolConfig::default();
        std::env::remove_var("QP_QUEUE_CAPACITY");

        assert_eq!(config, PoolConfig::new());
    }

    #[test]
    fn test_builder() {
        let config = PoolConfig::new()
            .queue_capacity(8)
            .notify_policy(NotifyPolicy::Signal);

        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.notify_policy, NotifyPolicy::Signal);
    }

    #[test]
    fn test_validation() {
        let config = PoolConfig::new().queue_capacity(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidValue("queue_capacity must be > 0"))
        );
    }

    #[test]
    fn test_from_env_overrides() {
        let _g = env_lock();
        std::env::set_var("QP_QUEUE_CAPACITY", "32");
        std::env::set_var("QP_NOTIFY_POLICY", "signal");
        let config = PoolConfig::from_env();
        std::env::remove_var("QP_QUEUE_CAPACITY");
        std::env::remove_var("QP_NOTIFY_POLICY");

        assert_eq!(config.queue_capacity, 32);
        assert_eq!(config.notify_policy, NotifyPolicy::Signal);
    }
}

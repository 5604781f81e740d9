//! Runtime configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, RuntimeError};

/// Configuration for the skyrun runtime.
///
/// Every field has a default, so a partial JSON document is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Folder, relative to an app's mount, holding routine sources.
    pub routine_dir: String,

    /// File extension of routine sources.
    pub routine_extension: String,

    /// Routine started when an app boots or restarts.
    pub launch_routine: String,

    /// How often a draining restart reports processes that are still live.
    pub drain_log_interval_ms: u64,

    /// Deepest table nesting the marshaler will convert.
    pub max_marshal_depth: usize,

    /// Open only the side-effect free Lua libraries (table, string, math,
    /// utf8, coroutine).
    pub sandbox_stdlib: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            routine_dir: "/source/routines".to_string(),
            routine_extension: "lua".to_string(),
            launch_routine: "launch".to_string(),
            drain_log_interval_ms: 1000,
            max_marshal_depth: 64,
            sandbox_stdlib: false,
        }
    }
}

impl RuntimeConfig {
    /// Reject configurations the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.launch_routine.is_empty() {
            return Err(RuntimeError::InvalidConfig(
                "launch_routine must not be empty".to_string(),
            ));
        }
        if self.drain_log_interval_ms == 0 {
            return Err(RuntimeError::InvalidConfig(
                "drain_log_interval_ms must be positive".to_string(),
            ));
        }
        if self.max_marshal_depth == 0 {
            return Err(RuntimeError::InvalidConfig(
                "max_marshal_depth must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of a routine's source file.
    pub fn routine_path(&self, routine: &str) -> String {
        format!(
            "{}/{}.{}",
            self.routine_dir.trim_end_matches('/'),
            routine,
            self.routine_extension
        )
    }

    pub fn drain_log_interval(&self) -> Duration {
        Duration::from_millis(self.drain_log_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_config_default() {
        let config = RuntimeConfig::default();
        assert_eq!(config.launch_routine, "launch");
        assert_eq!(config.drain_log_interval(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn routine_path_follows_convention() {
        let config = RuntimeConfig::default();
        assert_eq!(config.routine_path("launch"), "/source/routines/launch.lua");
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{"sandbox_stdlib": true, "drain_log_interval_ms": 50}"#)
                .unwrap();
        assert!(config.sandbox_stdlib);
        assert_eq!(config.drain_log_interval_ms, 50);
        assert_eq!(config.routine_extension, "lua");
    }

    #[test]
    fn invalid_configs_rejected() {
        let config = RuntimeConfig {
            drain_log_interval_ms: 0,
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RuntimeError::InvalidConfig(_))
        ));
    }
}

//! Engine configuration.

use std::hash::{Hash, Hasher};
use std::time::Duration;

use rustc_hash::FxHasher;

/// Capability switches and limits shaping a workflow graph and its run.
///
/// Two equal configurations always compile to the same graph; the
/// [`fingerprint`](EngineConfig::fingerprint) keys the graph cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Run the memory stage before everything else.
    pub memory_enabled: bool,
    /// Run the retrieval stage before the model.
    pub retrieval_enabled: bool,
    /// Advertise tools and allow the tool-calling loop.
    pub tools_enabled: bool,
    /// Hard budget on tool calls per execution.
    pub max_tool_calls: u32,
    /// Maximum history length before trimming kicks in.
    pub memory_window: usize,
    /// Passages requested from the retriever.
    pub retrieval_k: usize,
    /// Character budget for concatenated retrieval context.
    pub retrieval_char_budget: usize,
    /// Trailing window of executed calls the recursion guard inspects.
    pub recursion_window: usize,
    /// Deadline for a single model invocation.
    pub model_timeout: Duration,
    /// Deadline for one retrieval round trip.
    pub retrieval_timeout: Duration,
    /// Deadline for a single tool invocation.
    pub tool_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            retrieval_enabled: true,
            tools_enabled: true,
            max_tool_calls: 3,
            memory_window: 8,
            retrieval_k: 4,
            retrieval_char_budget: 4000,
            recursion_window: 4,
            model_timeout: Duration::from_secs(60),
            retrieval_timeout: Duration::from_secs(5),
            tool_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Build a configuration from `CONVOGRAPH_*` environment variables,
    /// falling back to defaults for anything unset or unparseable.
    /// A `.env` file is honored when present.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            memory_enabled: env_flag("CONVOGRAPH_MEMORY_ENABLED", defaults.memory_enabled),
            retrieval_enabled: env_flag("CONVOGRAPH_RETRIEVAL_ENABLED", defaults.retrieval_enabled),
            tools_enabled: env_flag("CONVOGRAPH_TOOLS_ENABLED", defaults.tools_enabled),
            max_tool_calls: env_parse("CONVOGRAPH_MAX_TOOL_CALLS", defaults.max_tool_calls),
            memory_window: env_parse("CONVOGRAPH_MEMORY_WINDOW", defaults.memory_window),
            retrieval_k: env_parse("CONVOGRAPH_RETRIEVAL_K", defaults.retrieval_k),
            retrieval_char_budget: env_parse(
                "CONVOGRAPH_RETRIEVAL_CHAR_BUDGET",
                defaults.retrieval_char_budget,
            ),
            recursion_window: env_parse("CONVOGRAPH_RECURSION_WINDOW", defaults.recursion_window),
            model_timeout: env_secs("CONVOGRAPH_MODEL_TIMEOUT_SECS", defaults.model_timeout),
            retrieval_timeout: env_secs(
                "CONVOGRAPH_RETRIEVAL_TIMEOUT_SECS",
                defaults.retrieval_timeout,
            ),
            tool_timeout: env_secs("CONVOGRAPH_TOOL_TIMEOUT_SECS", defaults.tool_timeout),
        }
    }

    #[must_use]
    pub fn with_memory_enabled(mut self, enabled: bool) -> Self {
        self.memory_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_retrieval_enabled(mut self, enabled: bool) -> Self {
        self.retrieval_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_tools_enabled(mut self, enabled: bool) -> Self {
        self.tools_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_max_tool_calls(mut self, max: u32) -> Self {
        self.max_tool_calls = max;
        self
    }

    #[must_use]
    pub fn with_memory_window(mut self, window: usize) -> Self {
        self.memory_window = window;
        self
    }

    #[must_use]
    pub fn with_retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = k;
        self
    }

    #[must_use]
    pub fn with_recursion_window(mut self, window: usize) -> Self {
        self.recursion_window = window;
        self
    }

    #[must_use]
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retrieval_timeout(mut self, timeout: Duration) -> Self {
        self.retrieval_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Stable hash over every field, used as the graph-cache key.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.memory_enabled.hash(&mut hasher);
        self.retrieval_enabled.hash(&mut hasher);
        self.tools_enabled.hash(&mut hasher);
        self.max_tool_calls.hash(&mut hasher);
        self.memory_window.hash(&mut hasher);
        self.retrieval_k.hash(&mut hasher);
        self.retrieval_char_budget.hash(&mut hasher);
        self.recursion_window.hash(&mut hasher);
        self.model_timeout.as_millis().hash(&mut hasher);
        self.retrieval_timeout.as_millis().hash(&mut hasher);
        self.tool_timeout.as_millis().hash(&mut hasher);
        hasher.finish()
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map_or(default, Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_tracks_field_changes() {
        let base = EngineConfig::default();
        assert_eq!(base.fingerprint(), EngineConfig::default().fingerprint());
        assert_ne!(
            base.fingerprint(),
            base.clone().with_max_tool_calls(9).fingerprint()
        );
        assert_ne!(
            base.fingerprint(),
            base.clone()
                .with_model_timeout(Duration::from_secs(10))
                .fingerprint()
        );
    }

    #[test]
    fn builders_set_fields() {
        let config = EngineConfig::default()
            .with_memory_enabled(false)
            .with_retrieval_k(9)
            .with_recursion_window(2);
        assert!(!config.memory_enabled);
        assert_eq!(config.retrieval_k, 9);
        assert_eq!(config.recursion_window, 2);
    }
}

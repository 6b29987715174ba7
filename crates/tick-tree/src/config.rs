//! Run loop configuration and loaders.
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Limits applied by [`BehaviorTree::run_with`](crate::BehaviorTree::run_with).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Give up after this many ticks (default: unbounded).
    pub max_ticks: Option<u64>,
    /// Pause between consecutive ticks (default: none).
    pub tick_interval: Option<Duration>,
}

impl RunConfig {
    pub const fn new() -> Self {
        Self {
            max_ticks: None,
            tick_interval: None,
        }
    }

    pub const fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    pub const fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = Some(interval);
        self
    }

    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `TICK_TREE_MAX_TICKS` - Tick limit for a run (default: unbounded)
    /// - `TICK_TREE_TICK_INTERVAL_MS` - Pause between ticks (default: none)
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Same as [`RunConfig::from_env`], reading variables through `lookup`.
    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(max_ticks) = parse_var::<u64>(&lookup, "TICK_TREE_MAX_TICKS") {
            config.max_ticks = Some(max_ticks.max(1));
        }

        if let Some(millis) = parse_var::<u64>(&lookup, "TICK_TREE_TICK_INTERVAL_MS") {
            config.tick_interval = Some(Duration::from_millis(millis)).filter(|d| !d.is_zero());
        }

        config
    }
}

fn parse_var<T: FromStr>(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn default_is_unbounded() {
        let config = RunConfig::default();
        assert_eq!(config.max_ticks, None);
        assert_eq!(config.tick_interval, None);
    }

    #[test]
    fn builder_methods_set_limits() {
        let config = RunConfig::new()
            .with_max_ticks(10)
            .with_tick_interval(Duration::from_millis(5));
        assert_eq!(config.max_ticks, Some(10));
        assert_eq!(config.tick_interval, Some(Duration::from_millis(5)));
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn from_vars_parses_limits() {
        let config = RunConfig::from_vars(vars(&[
            ("TICK_TREE_MAX_TICKS", " 250 "),
            ("TICK_TREE_TICK_INTERVAL_MS", "16"),
        ]));
        assert_eq!(config.max_ticks, Some(250));
        assert_eq!(config.tick_interval, Some(Duration::from_millis(16)));
    }

    #[test]
    fn from_vars_clamps_zero_limits() {
        let config = RunConfig::from_vars(vars(&[
            ("TICK_TREE_MAX_TICKS", "0"),
            ("TICK_TREE_TICK_INTERVAL_MS", "0"),
        ]));
        assert_eq!(config.max_ticks, Some(1));
        assert_eq!(config.tick_interval, None);
    }

    #[test]
    fn from_vars_ignores_unparsable_values() {
        let config = RunConfig::from_vars(vars(&[
            ("TICK_TREE_MAX_TICKS", "lots"),
            ("TICK_TREE_TICK_INTERVAL_MS", "-5"),
        ]));
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn from_env_without_variables_is_default() {
        assert_eq!(
            RunConfig::from_vars(|key| env::var(format!("{key}_UNSET_IN_TESTS")).ok()),
            RunConfig::default()
        );
    }
}

// CfgSearch
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Configuration types for loading repositories and running searches

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for the repository loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Reject repositories in which some required interface has no provider
    pub check_required_interfaces_resolvable: bool,
    /// Strip `/* ... */` comments before parsing declaration files
    pub strip_block_comments: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            check_required_interfaces_resolvable: false,
            strip_block_comments: true,
        }
    }
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolvability_check(mut self, enable: bool) -> Self {
        self.check_required_interfaces_resolvable = enable;
        self
    }

    pub fn with_comment_stripping(mut self, enable: bool) -> Self {
        self.strip_block_comments = enable;
        self
    }
}

/// Configuration for the randomized-completion search engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Successfully evaluated random completions wanted to score one partial node
    pub samples: usize,
    /// Upper bound on completions drawn for one node, failed ones included
    pub max_samples: usize,
    /// Attempts to find a feasible completion before a sample counts as failed
    pub max_attempts_per_sample: usize,
    /// Per-call limit for the external evaluator, in milliseconds
    pub evaluation_timeout_ms: u64,
    /// Limit for scoring one node across all of its samples, in milliseconds
    pub node_evaluation_timeout_ms: Option<u64>,
    /// Evaluator calls allowed to run at once
    pub max_workers: usize,
    pub seed: u64,
    /// Reuse scores of structurally identical nodes and instances
    pub cache_enabled: bool,
    /// Failed samplings after which a node shape is de-prioritised
    pub failure_threshold: u32,
    /// Nesting limit for random completions of recursive interfaces
    pub max_completion_depth: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            samples: 3,
            max_samples: 10,
            max_attempts_per_sample: 10,
            evaluation_timeout_ms: 30_000,
            node_evaluation_timeout_ms: None,
            max_workers: num_cpus::get(),
            seed: 0,
            cache_enabled: true,
            failure_threshold: 3,
            max_completion_depth: 64,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_max_attempts_per_sample(mut self, attempts: usize) -> Self {
        self.max_attempts_per_sample = attempts;
        self
    }

    pub fn with_evaluation_timeout(mut self, timeout: Duration) -> Self {
        self.evaluation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_node_evaluation_timeout(mut self, timeout: Duration) -> Self {
        self.node_evaluation_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_caching(mut self, enable: bool) -> Self {
        self.cache_enabled = enable;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_max_completion_depth(mut self, depth: usize) -> Self {
        self.max_completion_depth = depth;
        self
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluation_timeout_ms)
    }

    pub fn node_evaluation_timeout(&self) -> Option<Duration> {
        self.node_evaluation_timeout_ms.map(Duration::from_millis)
    }

    /// Successful samples wanted per node, never zero
    pub fn wanted_samples(&self) -> usize {
        self.samples.max(1)
    }

    /// Draw limit per node, never below the wanted samples
    pub fn sample_limit(&self) -> usize {
        self.max_samples.max(self.wanted_samples())
    }

    /// Worker count, never zero
    pub fn workers(&self) -> usize {
        self.max_workers.max(1)
    }
}

/// Limits for one search run; `None` means unlimited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchBudget {
    /// Nodes taken from the open list and expanded
    pub max_expansions: Option<usize>,
    /// Distinct evaluated instances after which the search stops
    pub max_solutions: Option<usize>,
    /// Wall-clock limit in milliseconds
    pub deadline_ms: Option<u64>,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            max_expansions: Some(1_000),
            max_solutions: None,
            deadline_ms: None,
        }
    }
}

impl SearchBudget {
    pub fn unlimited() -> Self {
        Self {
            max_expansions: None,
            max_solutions: None,
            deadline_ms: None,
        }
    }

    pub fn with_max_expansions(mut self, expansions: usize) -> Self {
        self.max_expansions = Some(expansions);
        self
    }

    pub fn with_max_solutions(mut self, solutions: usize) -> Self {
        self.max_solutions = Some(solutions);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = Some(deadline.as_millis() as u64);
        self
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// Top-level configuration, loadable from JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub loader: LoaderConfig,
    pub search: SearchConfig,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.samples, 3);
        assert_eq!(config.evaluation_timeout(), Duration::from_secs(30));
        assert!(config.cache_enabled);
        assert!(config.workers() >= 1);
        assert_eq!(config.sample_limit(), 10);
        assert_eq!(config.node_evaluation_timeout(), None);
        assert!(!LoaderConfig::default().check_required_interfaces_resolvable);
    }

    #[test]
    fn test_config_builder() {
        let config = SearchConfig::new().with_samples(5).with_seed(42).with_caching(false).with_max_workers(0).with_evaluation_timeout(Duration::from_millis(250));
        assert_eq!(config.samples, 5);
        assert_eq!(config.seed, 42);
        assert!(!config.cache_enabled);
        assert_eq!(config.workers(), 1);
        assert_eq!(config.evaluation_timeout_ms, 250);

        let config = SearchConfig::new().with_samples(0).with_max_samples(0).with_node_evaluation_timeout(Duration::from_secs(2));
        assert_eq!(config.wanted_samples(), 1);
        assert_eq!(config.sample_limit(), 1);
        assert_eq!(config.with_samples(6).sample_limit(), 6);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{"search": {"samples": 7, "node_evaluation_timeout_ms": 1500}, "loader": {"check_required_interfaces_resolvable": true}}"#).unwrap();
        assert_eq!(config.search.samples, 7);
        assert_eq!(config.search.max_attempts_per_sample, 10);
        assert_eq!(config.search.max_samples, 10);
        assert_eq!(config.search.node_evaluation_timeout(), Some(Duration::from_millis(1500)));
        assert!(config.loader.check_required_interfaces_resolvable);
        assert!(config.loader.strip_block_comments);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(EngineConfig::from_json_str("{"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_budget() {
        let budget = SearchBudget::unlimited().with_max_solutions(3).with_deadline(Duration::from_secs(2));
        assert_eq!(budget.max_expansions, None);
        assert_eq!(budget.max_solutions, Some(3));
        assert_eq!(budget.deadline(), Some(Duration::from_secs(2)));
    }
}

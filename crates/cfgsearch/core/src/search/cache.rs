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

//! Score memoisation for nodes, instances and node shapes

use super::evaluator::EvaluationError;
use crate::resolution::{NodeSignature, PruneReason, ShapeSignature};
use cfgsearch_common::ComponentInstance;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Estimated quality of a partial node from its random completions
#[derive(Debug, Clone, PartialEq)]
pub struct NodeScore<S> {
    pub best: S,
    /// The completion that produced `best`
    pub best_instance: ComponentInstance,
    /// Every successfully evaluated completion, in draw order
    pub samples: Vec<(ComponentInstance, S)>,
    pub completed: usize,
    /// Successful completions wanted
    pub requested: usize,
    /// Completions drawn, including failed ones
    pub drawn: usize,
    pub failures: usize,
}

impl<S> NodeScore<S> {
    /// Fewer completions succeeded than were requested
    pub fn is_partial(&self) -> bool {
        self.completed < self.requested
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome<S> {
    Scored(NodeScore<S>),
    Pruned(PruneReason),
}

type NodeCell<S> = Arc<OnceCell<NodeOutcome<S>>>;
type InstanceCell<S> = Arc<OnceCell<Result<S, EvaluationError>>>;

/// Concurrent score cache keyed by node signature and instance signature
///
/// Each entry is computed at most once even under concurrent requests.
/// Cancelled computations are never stored.
pub struct ScoreCache<S> {
    enabled: bool,
    nodes: DashMap<NodeSignature, NodeCell<S>>,
    instances: DashMap<String, InstanceCell<S>>,
    shape_failures: DashMap<ShapeSignature, u32>,
}

impl<S: Clone> ScoreCache<S> {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            nodes: DashMap::new(),
            instances: DashMap::new(),
            shape_failures: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Cached outcome for `signature`, or the result of `compute`
    ///
    /// The flag is true when the outcome came from the cache.
    pub async fn node_outcome<F, Fut>(&self, signature: NodeSignature, compute: F) -> Result<(NodeOutcome<S>, bool), EvaluationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<NodeOutcome<S>, EvaluationError>>,
    {
        if !self.enabled {
            return compute().await.map(|outcome| (outcome, false));
        }
        let cell = self.nodes.entry(signature).or_insert_with(|| Arc::new(OnceCell::new())).clone();
        if let Some(outcome) = cell.get() {
            return Ok((outcome.clone(), true));
        }
        cell.get_or_try_init(compute).await.map(|outcome| (outcome.clone(), false))
    }

    /// Cached evaluation result for an instance signature, or the result of `evaluate`
    ///
    /// Failures and timeouts are cached like scores.
    pub async fn instance_score<F, Fut>(&self, key: String, evaluate: F) -> Result<S, EvaluationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, EvaluationError>>,
    {
        if !self.enabled {
            return evaluate().await;
        }
        let cell = self.instances.entry(key).or_insert_with(|| Arc::new(OnceCell::new())).clone();
        let stored = cell
            .get_or_try_init(|| async move {
                match evaluate().await {
                    Err(EvaluationError::Cancelled) => Err(EvaluationError::Cancelled),
                    other => Ok(other),
                }
            })
            .await?;
        stored.clone()
    }

    pub fn cached_node(&self, signature: &NodeSignature) -> Option<NodeOutcome<S>> {
        self.nodes.get(signature).and_then(|cell| cell.get().cloned())
    }

    /// Records a failed sampling of `shape` and returns the new count
    pub fn record_failure(&self, shape: &ShapeSignature) -> u32 {
        let mut count = self.shape_failures.entry(shape.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn failures(&self, shape: &ShapeSignature) -> u32 {
        self.shape_failures.get(shape).map(|count| *count).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.nodes.clear();
        self.instances.clear();
        self.shape_failures.clear();
    }
}

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

//! Best-first search over the resolution tree, guided by random completions

use super::cache::{NodeOutcome, NodeScore, ScoreCache};
use super::cancellation::CancellationToken;
use super::completion::RandomCompleter;
use super::evaluator::{EvaluationError, Evaluator};
use crate::config::{SearchBudget, SearchConfig};
use crate::repository::Repository;
use crate::resolution::{Expansion, NodeSignature, PruneReason, PruneRecord, ResolutionError, Resolver, SearchNode};
use cfgsearch_common::ComponentInstance;
use dashmap::DashMap;
use futures::future::join_all;
use metrics::counter;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, trace};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("search cancelled before any solution was found")]
    Cancelled,
}

pub type SearchResult<T> = Result<T, SearchError>;

/// Scoring lifecycle of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeState {
    Unvisited,
    Sampling,
    Scored,
    Pruned,
    /// Interrupted with no completed sample; may be sampled again
    Cancelled,
}

#[derive(Debug, Default)]
struct SearchStats {
    nodes_expanded: AtomicU64,
    nodes_scored: AtomicU64,
    nodes_pruned: AtomicU64,
    cache_hits: AtomicU64,
    inherited_scores: AtomicU64,
    samples_drawn: AtomicU64,
    samples_failed: AtomicU64,
    evaluations: AtomicU64,
    evaluation_failures: AtomicU64,
}

impl SearchStats {
    fn snapshot(&self) -> SearchStatsSnapshot {
        let read = |counter: &AtomicU64| counter.load(AtomicOrdering::Relaxed);
        SearchStatsSnapshot {
            nodes_expanded: read(&self.nodes_expanded),
            nodes_scored: read(&self.nodes_scored),
            nodes_pruned: read(&self.nodes_pruned),
            cache_hits: read(&self.cache_hits),
            inherited_scores: read(&self.inherited_scores),
            samples_drawn: read(&self.samples_drawn),
            samples_failed: read(&self.samples_failed),
            evaluations: read(&self.evaluations),
            evaluation_failures: read(&self.evaluation_failures),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, AtomicOrdering::Relaxed);
}

/// Engine counters, cumulative over the engine's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchStatsSnapshot {
    pub nodes_expanded: u64,
    pub nodes_scored: u64,
    pub nodes_pruned: u64,
    pub cache_hits: u64,
    pub inherited_scores: u64,
    pub samples_drawn: u64,
    pub samples_failed: u64,
    /// Evaluator calls actually dispatched to a worker
    pub evaluations: u64,
    pub evaluation_failures: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedInstance<S> {
    pub instance: ComponentInstance,
    pub score: S,
}

#[derive(Debug, Clone)]
pub struct SearchReport<S> {
    /// Every evaluated instance, best first
    pub ranked: Vec<RankedInstance<S>>,
    pub pruned: Vec<PruneRecord>,
    pub stats: SearchStatsSnapshot,
    /// Stopped by cancellation
    pub interrupted: bool,
    /// The whole search space was explored
    pub exhausted: bool,
}

impl<S> SearchReport<S> {
    pub fn best(&self) -> Option<&RankedInstance<S>> {
        self.ranked.first()
    }
}

/// Evaluated instances of one search, unique by instance signature
struct SolutionPool<S> {
    solutions: Mutex<BTreeMap<String, (ComponentInstance, S)>>,
}

impl<S: Ord + Clone> SolutionPool<S> {
    fn new() -> Self {
        Self { solutions: Mutex::new(BTreeMap::new()) }
    }

    fn record(&self, instance: &ComponentInstance, score: &S) {
        self.solutions.lock().entry(instance.signature()).or_insert_with(|| (instance.clone(), score.clone()));
    }

    fn len(&self) -> usize {
        self.solutions.lock().len()
    }

    fn into_ranked(self) -> Vec<RankedInstance<S>> {
        let mut ranked: Vec<RankedInstance<S>> = self.solutions.into_inner().into_values().map(|(instance, score)| RankedInstance { instance, score }).collect();
        // stable: ties keep signature order
        ranked.sort_by(|a, b| a.score.cmp(&b.score));
        ranked
    }
}

struct OpenEntry<S> {
    penalized: bool,
    score: S,
    sequence: u64,
    node: SearchNode,
}

impl<S: Ord> OpenEntry<S> {
    fn key(&self) -> (bool, &S, u64) {
        (self.penalized, &self.score, self.sequence)
    }
}

impl<S: Ord> PartialEq for OpenEntry<S> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<S: Ord> Eq for OpenEntry<S> {}

impl<S: Ord> PartialOrd for OpenEntry<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S: Ord> Ord for OpenEntry<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Open nodes ordered by penalty, then score, then insertion
struct Frontier<S> {
    heap: BinaryHeap<Reverse<OpenEntry<S>>>,
    sequence: u64,
}

impl<S: Ord> Frontier<S> {
    fn new() -> Self {
        Self { heap: BinaryHeap::new(), sequence: 0 }
    }

    fn push(&mut self, node: SearchNode, score: S, penalized: bool) {
        self.sequence += 1;
        self.heap.push(Reverse(OpenEntry {
            penalized,
            score,
            sequence: self.sequence,
            node,
        }));
    }

    fn pop(&mut self) -> Option<OpenEntry<S>> {
        self.heap.pop().map(|Reverse(entry)| entry)
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Random generator for the `index`-th sample of a node
fn sample_rng(seed: u64, signature: &NodeSignature, index: usize) -> StdRng {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(signature.as_bytes());
    hasher.update(&(index as u64).to_le_bytes());
    StdRng::from_seed(*hasher.finalize().as_bytes())
}

/// Searches the resolution tree of an interface for the best-scoring instances
///
/// Partial nodes are scored by the best of several random completions, each
/// evaluated on a bounded pool of blocking workers. Nodes are expanded best
/// first. Every evaluated completion is kept as a candidate solution, so an
/// interrupted search still reports the best instances seen so far.
pub struct SearchEngine<E: Evaluator> {
    resolver: Resolver,
    completer: RandomCompleter,
    evaluator: Arc<E>,
    config: SearchConfig,
    cache: ScoreCache<E::Score>,
    workers: Arc<Semaphore>,
    cancellation: CancellationToken,
    states: DashMap<NodeSignature, NodeState>,
    stats: SearchStats,
}

impl<E: Evaluator> SearchEngine<E> {
    pub fn new(repository: Arc<Repository>, evaluator: E, config: SearchConfig) -> Self {
        Self::with_resolver(Resolver::new(repository), evaluator, config)
    }

    /// An engine over a preconfigured resolver, e.g. one with domain overrides
    pub fn with_resolver(resolver: Resolver, evaluator: E, config: SearchConfig) -> Self {
        let completer = RandomCompleter::new(resolver.clone(), config.max_attempts_per_sample, config.max_completion_depth);
        Self {
            completer,
            evaluator: Arc::new(evaluator),
            cache: ScoreCache::new(config.cache_enabled),
            workers: Arc::new(Semaphore::new(config.workers())),
            cancellation: CancellationToken::new(),
            states: DashMap::new(),
            stats: SearchStats::default(),
            resolver,
            config,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn stats(&self) -> SearchStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn node_state(&self, signature: &NodeSignature) -> NodeState {
        self.states.get(signature).map(|state| *state).unwrap_or(NodeState::Unvisited)
    }

    /// Scores one instance, at most once per instance signature while caching is on
    pub async fn evaluate_instance(&self, instance: &ComponentInstance) -> Result<E::Score, EvaluationError> {
        if self.cancellation.is_cancelled() {
            return Err(EvaluationError::Cancelled);
        }
        self.cache.instance_score(instance.signature(), || self.run_evaluation(instance.clone())).await
    }

    async fn run_evaluation(&self, instance: ComponentInstance) -> Result<E::Score, EvaluationError> {
        let permit = tokio::select! {
            permit = Arc::clone(&self.workers).acquire_owned() => permit.map_err(|_| EvaluationError::Cancelled)?,
            _ = self.cancellation.cancelled() => return Err(EvaluationError::Cancelled),
        };
        bump(&self.stats.evaluations);
        counter!("cfgsearch_evaluations_total", 1);

        let evaluator = Arc::clone(&self.evaluator);
        let timeout = self.config.evaluation_timeout();
        // The permit is released when the evaluator returns, even after a timeout
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            evaluator.evaluate(&instance)
        });
        // A result that is already in wins over a concurrent cancellation
        let result = tokio::select! {
            biased;
            joined = tokio::time::timeout(timeout, task) => match joined {
                Err(_) => Err(EvaluationError::Timeout(timeout)),
                Ok(Err(join_error)) => Err(EvaluationError::WorkerPanicked(join_error.to_string())),
                Ok(Ok(result)) => result,
            },
            _ = self.cancellation.cancelled() => Err(EvaluationError::Cancelled),
        };
        match &result {
            Ok(_) | Err(EvaluationError::Cancelled) => {}
            Err(error) => {
                bump(&self.stats.evaluation_failures);
                counter!("cfgsearch_evaluation_failures_total", 1);
                debug!(%error, "Evaluation failed");
            }
        }
        result
    }

    /// Scores `node` without running a search
    ///
    /// Fails only when cancellation interrupted every sample.
    pub async fn estimate(&self, node: &SearchNode) -> Result<NodeOutcome<E::Score>, EvaluationError> {
        let pool = SolutionPool::new();
        if node.is_terminal() {
            self.score_terminal(node, &pool).await
        } else {
            self.score_node(node, &pool).await
        }
    }

    async fn score_node(&self, node: &SearchNode, pool: &SolutionPool<E::Score>) -> Result<NodeOutcome<E::Score>, EvaluationError> {
        let signature = node.signature();
        self.states.insert(signature, NodeState::Sampling);
        let result = self.cache.node_outcome(signature, || self.sample_node(node, pool)).await;
        let state = match &result {
            Ok((NodeOutcome::Scored(score), hit)) => {
                if *hit {
                    bump(&self.stats.cache_hits);
                    counter!("cfgsearch_cache_hits_total", 1);
                    for (instance, sample) in &score.samples {
                        pool.record(instance, sample);
                    }
                }
                bump(&self.stats.nodes_scored);
                NodeState::Scored
            }
            Ok((NodeOutcome::Pruned(_), _)) => NodeState::Pruned,
            Err(_) => NodeState::Cancelled,
        };
        trace!(node = %signature, ?state, "Node scored");
        self.states.insert(signature, state);
        result.map(|(outcome, _)| outcome)
    }

    /// Draws completions in rounds until enough succeed, the draw limit is hit
    /// or the node deadline passes
    async fn sample_node(&self, node: &SearchNode, pool: &SolutionPool<E::Score>) -> Result<NodeOutcome<E::Score>, EvaluationError> {
        let requested = self.config.wanted_samples();
        let limit = self.config.sample_limit();
        let deadline = self.config.node_evaluation_timeout().map(|budget| (Instant::now() + budget, budget));
        let signature = node.signature();
        let mut drawn = 0usize;
        let mut failures = 0usize;
        let mut last_error = None;
        let mut samples: Vec<(ComponentInstance, E::Score)> = Vec::with_capacity(requested);
        let mut cancelled = false;

        while samples.len() < requested && drawn < limit {
            if self.cancellation.is_cancelled() {
                cancelled = true;
                break;
            }
            if deadline.is_some_and(|(at, _)| Instant::now() >= at) {
                debug!(node = %signature, drawn, completed = samples.len(), "Node evaluation deadline reached");
                break;
            }

            let round = (requested - samples.len()).min(limit - drawn);
            let mut instances = Vec::with_capacity(round);
            for index in drawn..drawn + round {
                let mut rng = sample_rng(self.config.seed, &signature, index);
                bump(&self.stats.samples_drawn);
                match self.completer.complete(node, &mut rng) {
                    Ok(instance) => instances.push(instance),
                    Err(error) => {
                        bump(&self.stats.samples_failed);
                        trace!(node = %signature, index, %error, "Sample has no feasible completion");
                        failures += 1;
                        last_error = Some(error.to_string());
                    }
                }
            }
            drawn += round;

            let results = join_all(instances.into_iter().map(|instance| async move {
                let score = self.evaluate_within(&instance, deadline).await;
                (instance, score)
            }))
            .await;

            for (instance, result) in results {
                match result {
                    Ok(score) => {
                        pool.record(&instance, &score);
                        samples.push((instance, score));
                    }
                    Err(EvaluationError::Cancelled) => cancelled = true,
                    Err(error) => {
                        bump(&self.stats.samples_failed);
                        failures += 1;
                        last_error = Some(error.to_string());
                    }
                }
            }
            if cancelled {
                break;
            }
        }

        let best = samples.iter().min_by(|a, b| a.1.cmp(&b.1)).map(|(instance, score)| (score.clone(), instance.clone()));
        match best {
            Some((best, best_instance)) => Ok(NodeOutcome::Scored(NodeScore {
                best,
                best_instance,
                completed: samples.len(),
                samples,
                requested,
                drawn,
                failures,
            })),
            None if cancelled => Err(EvaluationError::Cancelled),
            None => Ok(NodeOutcome::Pruned(PruneReason::SamplingFailed {
                samples: drawn,
                failures,
                last_error,
            })),
        }
    }

    /// Evaluates `instance`, giving up when the node deadline passes
    async fn evaluate_within(&self, instance: &ComponentInstance, deadline: Option<(Instant, Duration)>) -> Result<E::Score, EvaluationError> {
        let Some((at, budget)) = deadline else {
            return self.evaluate_instance(instance).await;
        };
        match tokio::time::timeout_at(at.into(), self.evaluate_instance(instance)).await {
            Ok(result) => result,
            Err(_) => Err(EvaluationError::Timeout(budget)),
        }
    }

    /// Exact score of a terminal node's representative instance
    async fn score_terminal(&self, node: &SearchNode, pool: &SolutionPool<E::Score>) -> Result<NodeOutcome<E::Score>, EvaluationError> {
        let instance = match self.resolver.instantiate(node) {
            Ok(instance) => instance,
            Err(error) => return Ok(NodeOutcome::Pruned(PruneReason::CompletionFailed { reason: error.to_string() })),
        };
        match self.evaluate_instance(&instance).await {
            Ok(score) => {
                pool.record(&instance, &score);
                bump(&self.stats.nodes_scored);
                Ok(NodeOutcome::Scored(NodeScore {
                    best: score.clone(),
                    best_instance: instance.clone(),
                    samples: vec![(instance, score)],
                    completed: 1,
                    requested: 1,
                    drawn: 1,
                    failures: 0,
                }))
            }
            Err(EvaluationError::Cancelled) => Err(EvaluationError::Cancelled),
            Err(error) => Ok(NodeOutcome::Pruned(PruneReason::SamplingFailed {
                samples: 1,
                failures: 1,
                last_error: Some(error.to_string()),
            })),
        }
    }

    /// Scores the children of an expansion and queues the non-terminal ones
    ///
    /// Returns true when cancellation interrupted the scoring.
    async fn score_children(
        &self,
        parent_score: Option<&E::Score>,
        expansion: Expansion,
        frontier: &mut Frontier<E::Score>,
        pruned: &mut Vec<PruneRecord>,
        pool: &SolutionPool<E::Score>,
    ) -> bool {
        let Expansion { children, pruned: dropped } = expansion;
        for record in dropped {
            bump(&self.stats.nodes_pruned);
            pruned.push(record);
        }

        // A lone successor covers every feasible completion of its parent
        if children.len() == 1
            && let Some(score) = parent_score
            && !children[0].is_terminal()
        {
            bump(&self.stats.inherited_scores);
            for child in children {
                let penalized = self.is_penalized(&child);
                frontier.push(child, score.clone(), penalized);
            }
            return false;
        }

        let outcomes = join_all(children.iter().map(|child| async move {
            if child.is_terminal() {
                self.score_terminal(child, pool).await
            } else {
                self.score_node(child, pool).await
            }
        }))
        .await;

        let mut interrupted = false;
        for (child, outcome) in children.into_iter().zip(outcomes) {
            match outcome {
                Ok(NodeOutcome::Scored(score)) => {
                    if !child.is_terminal() {
                        let penalized = self.is_penalized(&child);
                        frontier.push(child, score.best, penalized);
                    }
                }
                Ok(NodeOutcome::Pruned(reason)) => {
                    let shape = child.shape();
                    let failures = self.cache.record_failure(&shape);
                    bump(&self.stats.nodes_pruned);
                    debug!(%shape, failures, %reason, "Node pruned after scoring");
                    pruned.push(PruneRecord {
                        shape,
                        decision: child.last_decision().cloned(),
                        reason,
                    });
                }
                Err(_) => interrupted = true,
            }
        }
        interrupted
    }

    fn is_penalized(&self, node: &SearchNode) -> bool {
        self.cache.failures(&node.shape()) >= self.config.failure_threshold
    }

    /// Best-first search for instances of `interface`
    ///
    /// Stops when the budget is spent, the tree is exhausted or the engine is
    /// cancelled. A cancelled search that found nothing is an error.
    #[instrument(skip(self, budget), fields(seed = self.config.seed))]
    pub async fn search(&self, interface: &str, budget: &SearchBudget) -> SearchResult<SearchReport<E::Score>> {
        let started = Instant::now();
        let roots = self.resolver.roots(interface)?;
        let pool = SolutionPool::new();
        let mut frontier = Frontier::new();
        let mut pruned = Vec::new();
        let mut interrupted = self.score_children(None, roots, &mut frontier, &mut pruned, &pool).await;
        let mut expansions = 0usize;

        loop {
            if interrupted || self.cancellation.is_cancelled() {
                interrupted = true;
                break;
            }
            if budget.max_expansions.is_some_and(|max| expansions >= max) {
                debug!(expansions, "Expansion budget spent");
                break;
            }
            if budget.max_solutions.is_some_and(|max| pool.len() >= max) {
                debug!(solutions = pool.len(), "Solution budget reached");
                break;
            }
            if budget.deadline().is_some_and(|deadline| started.elapsed() >= deadline) {
                debug!(elapsed = ?started.elapsed(), "Search deadline reached");
                break;
            }
            let Some(entry) = frontier.pop() else {
                break;
            };

            expansions += 1;
            bump(&self.stats.nodes_expanded);
            counter!("cfgsearch_nodes_expanded_total", 1);
            trace!(node = %entry.node.signature(), score = ?entry.score, depth = entry.node.depth(), "Expanding node");
            let expansion = self.resolver.successors(&entry.node);
            interrupted = self.score_children(Some(&entry.score), expansion, &mut frontier, &mut pruned, &pool).await;
        }

        if interrupted && pool.len() == 0 {
            info!("Search cancelled without solutions");
            return Err(SearchError::Cancelled);
        }
        let exhausted = frontier.is_empty() && !interrupted;
        let ranked = pool.into_ranked();
        info!(solutions = ranked.len(), expansions, pruned = pruned.len(), interrupted, exhausted, "Search finished");
        Ok(SearchReport {
            ranked,
            pruned,
            stats: self.stats(),
            interrupted,
            exhausted,
        })
    }
}

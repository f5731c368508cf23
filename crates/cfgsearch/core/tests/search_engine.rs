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


//! Integration tests for the randomized-completion search engine

use cfgsearch_core::model::ComponentInstance;
use cfgsearch_core::search::{EvaluationError, FloatScore, RankedInstance};
use cfgsearch_core::{CancellationToken, Repository, RepositoryLoader, SearchBudget, SearchConfig, SearchEngine, SearchError, evaluator_fn, search};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

const MODELS: &str = r#"{ "components": [
    { "name": "pipeline", "providedInterface": ["pipeline"], "requiredInterface": [{ "id": "model", "name": "model" }] },
    { "name": "tree", "providedInterface": ["model"],
      "parameter": [{ "name": "depth", "type": "int", "default": 4, "min": 1, "max": 32, "refineSplits": 2, "minInterval": 1 }] },
    { "name": "ridge", "providedInterface": ["model"],
      "parameter": [
          { "name": "alpha", "type": "double", "default": 0.5, "min": 0.0, "max": 1.0, "refineSplits": 2, "minInterval": 0.05 },
          { "name": "intercept", "type": "bool", "default": true }
      ],
      "dependencies": [{ "pre": "intercept = false", "post": "alpha in [0.0, 0.5]" }] }
] }"#;

fn repository() -> Arc<Repository> {
    Arc::new(RepositoryLoader::default().load_str(MODELS).unwrap())
}

fn loss(instance: &ComponentInstance) -> Result<FloatScore, EvaluationError> {
    let model = instance.children("model").first().ok_or_else(|| EvaluationError::Failed("no model".into()))?;
    let value = |name: &str| model.parameter_value(name).and_then(|v| v.as_f64()).unwrap_or_default();
    let score = match model.component_name() {
        "tree" => 1.0 + (value("depth") - 12.0).abs() / 10.0,
        "ridge" => 0.8 + (value("alpha") - 0.3).powi(2),
        other => return Err(EvaluationError::Failed(format!("unknown model {other}"))),
    };
    Ok(FloatScore(score))
}

fn config(seed: u64) -> SearchConfig {
    SearchConfig::default().with_samples(3).with_max_workers(4).with_seed(seed)
}

fn signatures(ranked: &[RankedInstance<FloatScore>]) -> Vec<(String, FloatScore)> {
    ranked.iter().map(|r| (r.instance.signature(), r.score)).collect()
}

#[tokio::test]
async fn test_search_is_deterministic_for_a_seed() {
    let budget = SearchBudget::default().with_max_expansions(25);
    let first = search(repository(), "pipeline", evaluator_fn(loss), config(42), &budget).await.unwrap();
    let second = search(repository(), "pipeline", evaluator_fn(loss), config(42), &budget).await.unwrap();

    assert_eq!(signatures(&first.ranked), signatures(&second.ranked));
    assert_eq!(first.stats, second.stats);
    assert!(first.best().unwrap().score <= first.ranked.last().unwrap().score);
}

#[tokio::test]
async fn test_disabling_cache_keeps_best_score() {
    let budget = SearchBudget::default().with_max_expansions(25);
    let cached = search(repository(), "pipeline", evaluator_fn(loss), config(7), &budget).await.unwrap();
    let uncached = search(repository(), "pipeline", evaluator_fn(loss), config(7).with_caching(false), &budget).await.unwrap();

    assert_eq!(cached.best().unwrap().score, uncached.best().unwrap().score);
    assert!(cached.stats.evaluations <= uncached.stats.evaluations);
}

#[tokio::test]
async fn test_each_instance_reaches_the_evaluator_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = {
        let calls = Arc::clone(&calls);
        evaluator_fn(move |instance: &ComponentInstance| {
            calls.fetch_add(1, Ordering::SeqCst);
            loss(instance)
        })
    };
    let report = search(repository(), "pipeline", counted, config(3), &SearchBudget::unlimited().with_max_expansions(40)).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst) as u64, report.stats.evaluations);
    assert!(report.ranked.len() <= calls.load(Ordering::SeqCst));
    let mut seen: Vec<String> = report.ranked.iter().map(|r| r.instance.signature()).collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), report.ranked.len(), "ranked instances are unique");
}

#[tokio::test]
async fn test_failing_evaluator_prunes_without_crashing() {
    let failing = evaluator_fn(|instance: &ComponentInstance| {
        if instance.signature().contains("tree") {
            Err(EvaluationError::Failed("tree models are broken".into()))
        } else {
            loss(instance)
        }
    });
    let report = search(repository(), "pipeline", failing, config(5), &SearchBudget::default().with_max_expansions(10)).await.unwrap();

    assert!(report.ranked.iter().all(|r| !r.instance.signature().contains("tree")));
    assert!(report.pruned.iter().any(|record| record.to_string().contains("tree models are broken")));
}

#[tokio::test]
async fn test_unresolvable_interface_fails_the_search() {
    let repository = Arc::new(RepositoryLoader::default().load_str(r#"{ "components": [{ "name": "b", "providedInterface": ["Z"], "requiredInterface": [{ "id": "y", "name": "Y" }] }] }"#).unwrap());
    let result = search(repository, "Z", evaluator_fn(loss), config(0), &SearchBudget::default()).await;
    assert!(matches!(result, Err(SearchError::Resolution(_))));
}

/// Scores the first instance at once; later calls block for `delay`
fn first_call_fast(calls: Arc<AtomicUsize>, delay: Duration) -> impl Fn(&ComponentInstance) -> Result<FloatScore, EvaluationError> + Send + Sync + 'static {
    move |instance: &ComponentInstance| {
        if calls.fetch_add(1, Ordering::SeqCst) > 0 {
            std::thread::sleep(delay);
        }
        loss(instance)
    }
}

async fn cancel_after_calls(calls: &AtomicUsize, count: usize, token: CancellationToken) {
    while calls.load(Ordering::SeqCst) < count {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    token.cancel();
}

#[tokio::test]
async fn test_cancellation_returns_best_so_far() {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = SearchEngine::new(repository(), evaluator_fn(first_call_fast(Arc::clone(&calls), Duration::from_millis(300))), config(9).with_max_workers(1));
    let started = Instant::now();

    let budget = SearchBudget::unlimited();
    let (result, _) = tokio::join!(engine.search("pipeline", &budget), cancel_after_calls(&calls, 2, engine.cancellation_token()));

    assert!(started.elapsed() < Duration::from_secs(2), "cancellation should stop the search promptly");
    let report = result.unwrap();
    assert!(report.interrupted);
    assert!(!report.exhausted);
    assert_eq!(report.ranked.len(), 1);
    assert_eq!(report.stats.nodes_expanded, 0);
}

#[tokio::test]
async fn test_cancellation_before_any_score_is_an_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let slow = {
        let calls = Arc::clone(&calls);
        evaluator_fn(move |instance: &ComponentInstance| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            loss(instance)
        })
    };
    let engine = SearchEngine::new(repository(), slow, config(9).with_max_workers(1));

    let budget = SearchBudget::unlimited();
    let (result, _) = tokio::join!(engine.search("pipeline", &budget), cancel_after_calls(&calls, 1, engine.cancellation_token()));
    assert!(matches!(result, Err(SearchError::Cancelled)));
}

#[tokio::test]
async fn test_deadline_stops_the_search() {
    let slow = evaluator_fn(|instance: &ComponentInstance| {
        std::thread::sleep(Duration::from_millis(5));
        loss(instance)
    });
    let budget = SearchBudget::unlimited().with_deadline(Duration::from_millis(50));
    let report = search(repository(), "pipeline", slow, config(1), &budget).await.unwrap();
    assert!(!report.interrupted);
    assert!(!report.ranked.is_empty());
}

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

//! Randomized-completion search

pub mod cache;
pub mod cancellation;
pub mod completion;
pub mod engine;
pub mod evaluator;

pub use cache::{NodeOutcome, NodeScore, ScoreCache};
pub use cancellation::CancellationToken;
pub use completion::{RandomCompleter, RandomPicker, sample_value};
pub use engine::{NodeState, RankedInstance, SearchEngine, SearchError, SearchReport, SearchResult, SearchStatsSnapshot};
pub use evaluator::{EvaluationError, Evaluator, FloatScore, FnEvaluator, evaluator_fn};

use crate::config::{SearchBudget, SearchConfig};
use crate::repository::Repository;
use std::sync::Arc;

/// Runs one search for `interface` on a fresh engine
pub async fn search<E: Evaluator>(repository: Arc<Repository>, interface: &str, evaluator: E, config: SearchConfig, budget: &SearchBudget) -> SearchResult<SearchReport<E::Score>> {
    SearchEngine::new(repository, evaluator, config).search(interface, budget).await
}

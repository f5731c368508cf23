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

//! The external evaluator seam

use cfgsearch_common::ComponentInstance;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("evaluation failed: {0}")]
    Failed(String),
    #[error("evaluation timed out after {0:?}")]
    Timeout(Duration),
    #[error("evaluation cancelled")]
    Cancelled,
    #[error("evaluation worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Scores a finished component instance; lower scores are better
///
/// Implementations may block for a long time. The engine runs every call on a
/// blocking worker and applies its own timeout and cancellation.
#[cfg_attr(test, mockall::automock(type Score = u64;))]
pub trait Evaluator: Send + Sync + 'static {
    type Score: Ord + Clone + fmt::Debug + Send + Sync + 'static;

    fn evaluate(&self, instance: &ComponentInstance) -> Result<Self::Score, EvaluationError>;
}

/// Adapts a closure into an [`Evaluator`]
pub struct FnEvaluator<F, S> {
    function: F,
    _score: PhantomData<fn() -> S>,
}

impl<F, S> FnEvaluator<F, S>
where
    F: Fn(&ComponentInstance) -> Result<S, EvaluationError> + Send + Sync + 'static,
    S: Ord + Clone + fmt::Debug + Send + Sync + 'static,
{
    pub fn new(function: F) -> Self {
        Self { function, _score: PhantomData }
    }
}

impl<F, S> Evaluator for FnEvaluator<F, S>
where
    F: Fn(&ComponentInstance) -> Result<S, EvaluationError> + Send + Sync + 'static,
    S: Ord + Clone + fmt::Debug + Send + Sync + 'static,
{
    type Score = S;

    fn evaluate(&self, instance: &ComponentInstance) -> Result<S, EvaluationError> {
        (self.function)(instance)
    }
}

pub fn evaluator_fn<F, S>(function: F) -> FnEvaluator<F, S>
where
    F: Fn(&ComponentInstance) -> Result<S, EvaluationError> + Send + Sync + 'static,
    S: Ord + Clone + fmt::Debug + Send + Sync + 'static,
{
    FnEvaluator::new(function)
}

/// Totally ordered float score
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FloatScore(pub f64);

impl PartialEq for FloatScore {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloatScore {}

impl PartialOrd for FloatScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for FloatScore {
    fn from(value: f64) -> Self {
        FloatScore(value)
    }
}

impl fmt::Display for FloatScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

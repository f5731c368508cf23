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


//! Component configuration resolution and search.
//!
//! A [`Repository`] of components is loaded from declaration files, the
//! [`resolution`] layer enumerates the tree of partial configurations that
//! realise a requested interface, and the [`search`] layer explores that tree
//! best first, scoring partial nodes by random completions handed to an
//! external [`Evaluator`].

pub mod config;
pub mod propagation;
pub mod repository;
pub mod resolution;
pub mod search;

pub use cfgsearch_common as model;
pub use config::{ConfigError, EngineConfig, LoaderConfig, SearchBudget, SearchConfig};
pub use propagation::{Contradiction, DependencyEvaluator, DomainMap, InstanceViolation};
pub use repository::{LoadError, LoadResult, Repository, RepositoryLoader, RepositoryStats, load};
pub use resolution::{Decision, DomainOverrides, PruneReason, PruneRecord, ResolutionError, ResolutionStream, Resolver, SearchNode, resolve};
pub use search::{CancellationToken, EvaluationError, Evaluator, FloatScore, SearchEngine, SearchError, SearchReport, evaluator_fn, search};

use std::collections::BTreeSet;

/// Required interfaces of `repository` that no component provides
pub fn get_unresolvable_required_interfaces(repository: &Repository) -> BTreeSet<String> {
    repository.unresolvable_required_interfaces()
}

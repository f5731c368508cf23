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

//! Shared data model for the component configuration search.
//!
//! This crate holds the value-domain algebra, the refinement rules for
//! numeric domains, and the immutable component model that repositories,
//! resolvers and the search engine operate on.

pub mod component;
pub mod dependency;
pub mod domain;
pub mod instance;
pub mod refinement;

pub use component::{Component, Parameter, RequiredInterface};
pub use dependency::{Dependency, Literal};
pub use domain::{BooleanDomain, CategoricalDomain, Domain, NumericDomain, ParameterValue, ValueError, intersect};
pub use instance::ComponentInstance;
pub use refinement::{LogScale, RefinementPolicy, is_terminal, refine};

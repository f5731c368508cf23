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

use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a repository; a failed load leaves nothing behind
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("malformed declaration file {file}: {source}")]
    Json { file: String, source: serde_json::Error },

    #[error("{file}: included path '{include}' does not exist")]
    MissingInclude { file: String, include: String },

    #[error("{file}: component '{component}' is declared more than once")]
    DuplicateComponent { file: String, component: String },

    #[error("{file}: component '{component}' declares parameter '{parameter}' more than once")]
    DuplicateParameter { file: String, component: String, parameter: String },

    #[error("{file}: component '{component}' declares required interface id '{id}' more than once")]
    DuplicateRequiredInterfaceId { file: String, component: String, id: String },

    #[error("{file}: parameter '{parameter}' of component '{component}' is missing field '{field}'")]
    MissingField { file: String, component: String, parameter: String, field: &'static str },

    #[error("{file}: numeric parameter '{parameter}' of component '{component}' is missing refinement field '{field}'")]
    MissingRefinementField { file: String, component: String, parameter: String, field: &'static str },

    #[error("{file}: parameter '{parameter}' of component '{component}' has invalid refinement field '{field}': {reason}")]
    InvalidRefinementField { file: String, component: String, parameter: String, field: &'static str, reason: String },

    #[error("{file}: parameter '{parameter}' of component '{component}' has unsupported type '{kind}'")]
    UnsupportedParameterType { file: String, component: String, parameter: String, kind: String },

    #[error("{file}: parameter '{parameter}' of component '{component}' has invalid default: {reason}")]
    InvalidDefault { file: String, component: String, parameter: String, reason: String },

    #[error("{file}: parameter '{parameter}' of component '{component}' has invalid domain: {reason}")]
    InvalidDomain { file: String, component: String, parameter: String, reason: String },

    #[error("{file}: component '{component}' has invalid dependency '{dependency}': {reason}")]
    InvalidDependency { file: String, component: String, dependency: String, reason: String },

    #[error("{file}: dependency '{dependency}' of component '{component}' references unknown parameter '{parameter}'")]
    UnknownParameter { file: String, component: String, dependency: String, parameter: String },

    #[error("required interfaces without any provider: {0:?}")]
    UnresolvableRequiredInterfaces(BTreeSet<String>),
}

pub type LoadResult<T> = Result<T, LoadError>;

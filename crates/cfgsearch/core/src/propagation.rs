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

//! Dependency propagation over one component's parameter domains.
//!
//! Propagation repeats full passes over the component's dependencies until no
//! domain changes. A dependency fires when some monomial of its premise is
//! entailed by the current domains; its conclusion literals are then
//! intersected into the map. Domains only ever shrink, so the loop ends.

use cfgsearch_common::{Component, ComponentInstance, Domain};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, trace};

/// Current domain of every parameter of one component
pub type DomainMap = BTreeMap<String, Domain>;

/// A parameter left without any admissible value
#[derive(Debug, Clone, PartialEq, Error)]
#[error("parameter '{parameter}' of component '{component}' has no value left after {dependency}")]
pub struct Contradiction {
    pub component: String,
    pub parameter: String,
    /// Position of the responsible dependency, `None` when a caller restriction emptied the domain
    pub dependency_index: Option<usize>,
    pub dependency: String,
}

/// Ways a concrete instance can break its components' declarations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstanceViolation {
    #[error("component '{component}' has no value for parameter '{parameter}'")]
    MissingValue { component: String, parameter: String },
    #[error("value {value} of parameter '{parameter}' is outside its domain in component '{component}'")]
    OutsideDomain { component: String, parameter: String, value: String },
    #[error("component '{component}' violates dependency '{dependency}'")]
    DependencyViolated { component: String, dependency: String },
    #[error("required interface '{id}' of component '{component}' has no child")]
    UnsatisfiedSlot { component: String, id: String },
}

/// Stateless fixpoint propagator
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyEvaluator;

impl DependencyEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// The declared domain of every parameter of `component`
    pub fn initial_domains(&self, component: &Component) -> DomainMap {
        component.parameters().iter().map(|p| (p.name().to_string(), p.domain().clone())).collect()
    }

    /// Narrows `current` to the fixpoint of `component`'s dependencies
    pub fn propagate(&self, component: &Component, current: &DomainMap) -> Result<DomainMap, Contradiction> {
        let mut domains = current.clone();
        let mut passes = 0usize;
        loop {
            passes += 1;
            let mut changed = false;
            for (index, dependency) in component.dependencies().iter().enumerate() {
                let fires = dependency
                    .premise()
                    .iter()
                    .any(|monomial| monomial.iter().all(|literal| domains.get(literal.parameter()).is_some_and(|d| literal.is_entailed_by(d))));
                if !fires {
                    continue;
                }

                for literal in dependency.conclusion() {
                    let Some(domain) = domains.get(literal.parameter()) else {
                        continue;
                    };
                    let narrowed = domain.intersect(literal.restriction());
                    if narrowed.is_empty() {
                        debug!(component = component.name(), parameter = literal.parameter(), dependency = %dependency, "Dependency propagation found a contradiction");
                        return Err(Contradiction {
                            component: component.name().to_string(),
                            parameter: literal.parameter().to_string(),
                            dependency_index: Some(index),
                            dependency: dependency.to_string(),
                        });
                    }
                    if narrowed != *domain {
                        trace!(parameter = literal.parameter(), from = %domain, to = %narrowed, "Narrowed domain");
                        domains.insert(literal.parameter().to_string(), narrowed);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        trace!(component = component.name(), passes, "Propagation reached fixpoint");
        Ok(domains)
    }

    /// Checks a concrete instance tree against every component's declarations
    pub fn check_instance(&self, instance: &ComponentInstance) -> Result<(), InstanceViolation> {
        let component = instance.component();
        let mut points = DomainMap::new();
        for parameter in component.parameters() {
            let value = instance.parameter_value(parameter.name()).ok_or_else(|| InstanceViolation::MissingValue {
                component: component.name().to_string(),
                parameter: parameter.name().to_string(),
            })?;
            if !parameter.domain().contains_value(value) {
                return Err(InstanceViolation::OutsideDomain {
                    component: component.name().to_string(),
                    parameter: parameter.name().to_string(),
                    value: value.to_string(),
                });
            }
            points.insert(parameter.name().to_string(), parameter.domain().restrict_to(value));
        }

        for dependency in component.dependencies() {
            let fires = dependency.premise().iter().any(|m| m.iter().all(|l| points.get(l.parameter()).is_some_and(|p| l.is_entailed_by(p))));
            let violated = dependency.conclusion().iter().any(|l| points.get(l.parameter()).is_some_and(|p| !p.is_subset_of(l.restriction())));
            if fires && violated {
                return Err(InstanceViolation::DependencyViolated {
                    component: component.name().to_string(),
                    dependency: dependency.to_string(),
                });
            }
        }

        for required in component.required_interfaces() {
            let children = instance.children(&required.id);
            if children.is_empty() {
                return Err(InstanceViolation::UnsatisfiedSlot {
                    component: component.name().to_string(),
                    id: required.id.clone(),
                });
            }
            for child in children {
                self.check_instance(child)?;
            }
        }
        Ok(())
    }

    pub fn is_valid_instance(&self, instance: &ComponentInstance) -> bool {
        self.check_instance(instance).is_ok()
    }
}

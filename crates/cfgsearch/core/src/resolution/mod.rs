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

//! Resolution of a requested interface into partial and concrete component trees.
//!
//! The [`Resolver`] turns a [`SearchNode`] into its successors by taking one
//! decision at a time: the first open slot is bound to each providing
//! component, otherwise the first non-terminal parameter is refined. Every
//! successor is propagated; infeasible ones are returned as [`PruneRecord`]s.

use crate::propagation::{Contradiction, DependencyEvaluator, DomainMap};
use crate::repository::Repository;
use cfgsearch_common::{Component, ComponentInstance, Domain, Parameter, ParameterValue, refine};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, trace};

pub mod node;
pub mod stream;

pub use node::{Decision, NodeSignature, PartialInstance, SearchNode, ShapeSignature, Slot, SlotBinding, SlotPath, representative_value};
pub use stream::ResolutionStream;

use node::Step;

/// Extra per-component domain restrictions, keyed by component then parameter
pub type DomainOverrides = BTreeMap<String, DomainMap>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    #[error("cannot resolve '{requested}': no component provides {unresolvable:?}")]
    UnresolvableRequiredInterface { requested: String, unresolvable: BTreeSet<String> },
    #[error("domain override names unknown component '{0}'")]
    UnknownComponent(String),
    #[error("domain override names unknown parameter '{parameter}' of component '{component}'")]
    UnknownParameter { component: String, parameter: String },
}

pub type ResolutionResult<T> = Result<T, ResolutionError>;

/// Why a branch was dropped
#[derive(Debug, Clone, PartialEq)]
pub enum PruneReason {
    Contradiction(Contradiction),
    /// The provider already appears on the path from the root
    CyclicRequirement { component: String, interface: String },
    CompletionFailed { reason: String },
    /// Every random completion failed
    SamplingFailed { samples: usize, failures: usize, last_error: Option<String> },
}

impl fmt::Display for PruneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PruneReason::Contradiction(contradiction) => write!(f, "{}", contradiction),
            PruneReason::CyclicRequirement { component, interface } => write!(f, "component '{}' would require itself through '{}'", component, interface),
            PruneReason::CompletionFailed { reason } => write!(f, "no concrete instance: {}", reason),
            PruneReason::SamplingFailed { samples, failures, last_error } => {
                write!(f, "{} of {} samples failed", failures, samples)?;
                if let Some(error) = last_error {
                    write!(f, " (last error: {})", error)?;
                }
                Ok(())
            }
        }
    }
}

/// An attributable pruning decision
#[derive(Debug, Clone, PartialEq)]
pub struct PruneRecord {
    /// Shape of the node the pruned branch was derived from
    pub shape: ShapeSignature,
    /// The decision that led into the pruned branch, if any
    pub decision: Option<Decision>,
    pub reason: PruneReason,
}

impl fmt::Display for PruneRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.decision {
            Some(decision) => write!(f, "{} after '{}': {}", self.shape, decision, self.reason),
            None => write!(f, "{}: {}", self.shape, self.reason),
        }
    }
}

/// Successors of one node
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub children: Vec<SearchNode>,
    pub pruned: Vec<PruneRecord>,
}

/// Failures while building a concrete instance from a partial one
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompletionError {
    #[error(transparent)]
    Contradiction(#[from] Contradiction),
    #[error("no value could be chosen for parameter '{parameter}' of component '{component}'")]
    NoValue { component: String, parameter: String },
    #[error("no acyclic provider for interface '{interface}'")]
    NoProvider { interface: String },
    #[error("completion exceeded nesting depth {0}")]
    DepthExceeded(usize),
}

/// Chooses concrete values and providers while completing a partial instance
pub trait CompletionPicker {
    fn pick_value(&mut self, parameter: &Parameter, domain: &Domain) -> Option<ParameterValue>;
    fn pick_provider(&mut self, interface: &str, candidates: &[Arc<Component>]) -> Option<Arc<Component>>;
}

/// Picks the representative value of every domain and the first provider
#[derive(Debug, Clone, Copy, Default)]
pub struct RepresentativePicker;

impl CompletionPicker for RepresentativePicker {
    fn pick_value(&mut self, parameter: &Parameter, domain: &Domain) -> Option<ParameterValue> {
        representative_value(parameter, domain)
    }

    fn pick_provider(&mut self, _interface: &str, candidates: &[Arc<Component>]) -> Option<Arc<Component>> {
        candidates.first().cloned()
    }
}

/// Expands search nodes against a repository
#[derive(Debug, Clone)]
pub struct Resolver {
    repository: Arc<Repository>,
    evaluator: DependencyEvaluator,
    overrides: DomainOverrides,
}

impl Resolver {
    pub fn new(repository: Arc<Repository>) -> Self {
        Self {
            repository,
            evaluator: DependencyEvaluator::new(),
            overrides: DomainOverrides::new(),
        }
    }

    /// Adds restrictions applied to a component's domains whenever it is chosen
    pub fn with_overrides(mut self, overrides: DomainOverrides) -> ResolutionResult<Self> {
        for (component, domains) in &overrides {
            let declared = self.repository.component(component).ok_or_else(|| ResolutionError::UnknownComponent(component.clone()))?;
            if let Some(parameter) = domains.keys().find(|p| declared.parameter(p).is_none()) {
                return Err(ResolutionError::UnknownParameter {
                    component: component.clone(),
                    parameter: parameter.clone(),
                });
            }
        }
        self.overrides = overrides;
        Ok(self)
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    pub fn evaluator(&self) -> &DependencyEvaluator {
        &self.evaluator
    }

    /// One root node per component providing `interface`
    ///
    /// Fails when any interface reachable from `interface` has no provider.
    #[instrument(skip(self))]
    pub fn roots(&self, interface: &str) -> ResolutionResult<Expansion> {
        let unresolvable = self.repository.unresolvable_interfaces_reachable_from(interface);
        if !unresolvable.is_empty() {
            debug!(?unresolvable, "Requested interface cannot be resolved");
            return Err(ResolutionError::UnresolvableRequiredInterface {
                requested: interface.to_string(),
                unresolvable,
            });
        }

        let mut expansion = Expansion::default();
        for provider in self.repository.providers_of(interface) {
            match self.open_partial(provider) {
                Ok(partial) => expansion.children.push(SearchNode::new(interface, partial)),
                Err(contradiction) => expansion.pruned.push(PruneRecord {
                    shape: shape_of_choice(provider),
                    decision: Some(Decision::ChooseComponent {
                        path: Vec::new(),
                        slot: String::new(),
                        component: provider.name().to_string(),
                    }),
                    reason: PruneReason::Contradiction(contradiction),
                }),
            }
        }
        debug!(roots = expansion.children.len(), pruned = expansion.pruned.len(), "Created root nodes");
        Ok(expansion)
    }

    /// Successors of `node`; a terminal node has none
    pub fn successors(&self, node: &SearchNode) -> Expansion {
        let mut expansion = Expansion::default();
        match node.next_step() {
            None => {}
            Some(Step::Resolve { path, slot, interface, ancestors }) => {
                for provider in self.repository.providers_of(&interface) {
                    let decision = Decision::ChooseComponent {
                        path: path.clone(),
                        slot: slot.clone(),
                        component: provider.name().to_string(),
                    };
                    if ancestors.iter().any(|a| a == provider.name()) {
                        expansion.pruned.push(PruneRecord {
                            shape: node.shape(),
                            decision: Some(decision),
                            reason: PruneReason::CyclicRequirement {
                                component: provider.name().to_string(),
                                interface: interface.clone(),
                            },
                        });
                        continue;
                    }
                    match self.open_partial(provider) {
                        Ok(partial) => expansion.children.extend(node.with_resolved_slot(&path, partial, decision)),
                        Err(contradiction) => expansion.pruned.push(PruneRecord {
                            shape: node.shape(),
                            decision: Some(decision),
                            reason: PruneReason::Contradiction(contradiction),
                        }),
                    }
                }
            }
            Some(Step::Refine { path, component, parameter, domain, policy }) => {
                let Some(partial) = node.partial_at(&path) else {
                    return expansion;
                };
                for piece in refine(&domain, &policy) {
                    let decision = Decision::RefineParameter {
                        path: path.clone(),
                        component: component.name().to_string(),
                        parameter: parameter.clone(),
                        domain: piece.clone(),
                    };
                    let mut domains = partial.domains().clone();
                    domains.insert(parameter.clone(), piece);
                    match self.evaluator.propagate(&component, &domains) {
                        Ok(domains) => expansion.children.extend(node.with_domains(&path, &parameter, domains, decision)),
                        Err(contradiction) => expansion.pruned.push(PruneRecord {
                            shape: node.shape(),
                            decision: Some(decision),
                            reason: PruneReason::Contradiction(contradiction),
                        }),
                    }
                }
            }
        }
        for record in &expansion.pruned {
            debug!(shape = %record.shape, reason = %record.reason, "Pruned branch");
        }
        trace!(children = expansion.children.len(), pruned = expansion.pruned.len(), "Expanded node");
        expansion
    }

    /// The concrete instance of a terminal node, using representative values
    pub fn instantiate(&self, node: &SearchNode) -> Result<ComponentInstance, CompletionError> {
        self.complete(node, &mut RepresentativePicker, usize::MAX)
    }

    /// Completes every open domain and slot of `node` with choices from `picker`
    ///
    /// Each chosen value is propagated before the next one is picked, so the
    /// result satisfies every dependency or the call fails.
    pub fn complete(&self, node: &SearchNode, picker: &mut dyn CompletionPicker, max_depth: usize) -> Result<ComponentInstance, CompletionError> {
        let mut ancestors = Vec::new();
        self.complete_partial(node.root(), picker, &mut ancestors, max_depth)
    }

    fn complete_partial(&self, partial: &PartialInstance, picker: &mut dyn CompletionPicker, ancestors: &mut Vec<String>, max_depth: usize) -> Result<ComponentInstance, CompletionError> {
        if ancestors.len() >= max_depth {
            return Err(CompletionError::DepthExceeded(max_depth));
        }
        let component = partial.component();
        let mut domains = partial.domains().clone();
        let mut values = BTreeMap::new();
        for parameter in component.parameters() {
            let Some(domain) = domains.get(parameter.name()) else {
                continue;
            };
            let value = match domain.singleton_value() {
                Some(value) => value,
                None => picker.pick_value(parameter, domain).ok_or_else(|| CompletionError::NoValue {
                    component: component.name().to_string(),
                    parameter: parameter.name().to_string(),
                })?,
            };
            let point = domain.restrict_to(&value);
            if point.is_empty() {
                return Err(CompletionError::NoValue {
                    component: component.name().to_string(),
                    parameter: parameter.name().to_string(),
                });
            }
            domains.insert(parameter.name().to_string(), point);
            domains = self.evaluator.propagate(component, &domains)?;
            values.insert(parameter.name().to_string(), value);
        }

        let mut instance = ComponentInstance::new(Arc::clone(component), values);
        ancestors.push(component.name().to_string());
        for binding in partial.slots() {
            let child = match &binding.slot {
                Slot::Resolved(child) => self.complete_partial(child, picker, ancestors, max_depth)?,
                Slot::Open { interface } => {
                    let candidates: Vec<Arc<Component>> = self
                        .repository
                        .providers_of(interface)
                        .into_iter()
                        .filter(|c| !ancestors.iter().any(|a| a == c.name()))
                        .cloned()
                        .collect();
                    let provider = picker.pick_provider(interface, &candidates).ok_or_else(|| CompletionError::NoProvider { interface: interface.clone() })?;
                    let opened = self.open_partial(&provider)?;
                    self.complete_partial(&opened, picker, ancestors, max_depth)?
                }
            };
            instance = instance.with_child(binding.id.clone(), child);
        }
        ancestors.pop();
        Ok(instance)
    }

    /// Declared domains narrowed by overrides and propagated
    fn open_partial(&self, component: &Arc<Component>) -> Result<PartialInstance, Contradiction> {
        let mut domains = self.evaluator.initial_domains(component);
        if let Some(overrides) = self.overrides.get(component.name()) {
            for (parameter, restriction) in overrides {
                let Some(declared) = domains.get(parameter) else {
                    continue;
                };
                let narrowed = declared.intersect(restriction);
                if narrowed.is_empty() {
                    return Err(Contradiction {
                        component: component.name().to_string(),
                        parameter: parameter.clone(),
                        dependency_index: None,
                        dependency: format!("domain override {}", restriction),
                    });
                }
                domains.insert(parameter.clone(), narrowed);
            }
        }
        let domains = self.evaluator.propagate(component, &domains)?;
        Ok(PartialInstance::new(Arc::clone(component), domains))
    }
}

fn shape_of_choice(component: &Component) -> ShapeSignature {
    SearchNode::new("", PartialInstance::new(Arc::new(component.clone()), DomainMap::new())).shape()
}

/// Snapshot of a prune record for reports
#[derive(Debug, Clone, Serialize)]
pub struct PruneSummary {
    pub shape: String,
    pub decision: Option<String>,
    pub reason: String,
}

impl From<&PruneRecord> for PruneSummary {
    fn from(record: &PruneRecord) -> Self {
        Self {
            shape: record.shape.to_string(),
            decision: record.decision.as_ref().map(|d| d.to_string()),
            reason: record.reason.to_string(),
        }
    }
}

/// Lazily enumerates the nodes realising `interface`, depth first
///
/// `overrides` narrows the domains of the named components wherever they are
/// chosen; pass an empty map to search the declared domains.
pub fn resolve(repository: Arc<Repository>, interface: &str, overrides: DomainOverrides) -> ResolutionResult<ResolutionStream> {
    ResolutionStream::new(Resolver::new(repository).with_overrides(overrides)?, interface)
}

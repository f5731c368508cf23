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

//! The validated, read-only component repository.
//!
//! A [`Repository`] owns every loaded [`Component`] and keeps an explicit
//! interface graph (an edge `I -> J` whenever a provider of `I` requires `J`)
//! so that resolvability and cycles are answered by graph queries instead of
//! recursion at resolve time.

use cfgsearch_common::{Component, ComponentInstance, Domain};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

pub mod error;
pub mod literal_parser;
pub mod loader;

pub use error::{LoadError, LoadResult};
pub use loader::{RepositoryLoader, load};

const PROGRAMMATIC_SOURCE: &str = "<components>";

/// Interface adjacency by name
#[derive(Debug, Clone, Default)]
struct InterfaceGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl InterfaceGraph {
    fn build(components: &[Arc<Component>]) -> Self {
        let mut graph = Self::default();
        for component in components {
            for provided in component.provided_interfaces() {
                let from = graph.node(provided);
                for required in component.required_interfaces() {
                    let to = graph.node(&required.interface);
                    graph.graph.update_edge(from, to, ());
                }
            }
            for required in component.required_interfaces() {
                graph.node(&required.interface);
            }
        }
        graph
    }

    fn node(&mut self, interface: &str) -> NodeIndex {
        if let Some(index) = self.nodes.get(interface) {
            return *index;
        }
        let index = self.graph.add_node(interface.to_string());
        self.nodes.insert(interface.to_string(), index);
        index
    }

    fn reachable(&self, interface: &str) -> BTreeSet<NodeIndex> {
        let mut reachable = BTreeSet::new();
        if let Some(start) = self.nodes.get(interface) {
            let mut dfs = Dfs::new(&self.graph, *start);
            while let Some(node) = dfs.next(&self.graph) {
                reachable.insert(node);
            }
        }
        reachable
    }

    fn has_cycle_within(&self, nodes: &BTreeSet<NodeIndex>) -> bool {
        tarjan_scc(&self.graph).into_iter().any(|scc| {
            let cyclic = scc.len() > 1 || scc.first().is_some_and(|n| self.graph.contains_edge(*n, *n));
            cyclic && scc.iter().any(|n| nodes.contains(n))
        })
    }
}

/// Parameter and component counts of a repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryStats {
    pub components: usize,
    pub parameters: usize,
    pub numeric_parameters: usize,
    pub integer_parameters: usize,
    pub continuous_parameters: usize,
    pub categorical_parameters: usize,
    pub boolean_parameters: usize,
    pub dependencies: usize,
}

/// Immutable set of components with derived interface sets
#[derive(Debug, Clone)]
pub struct Repository {
    components: Vec<Arc<Component>>,
    by_name: HashMap<String, usize>,
    required: BTreeSet<String>,
    provided: BTreeSet<String>,
    graph: InterfaceGraph,
}

impl Repository {
    /// Builds a repository, rejecting duplicate component names
    pub fn from_components(components: impl IntoIterator<Item = Component>) -> LoadResult<Self> {
        let mut stored = Vec::new();
        let mut by_name = HashMap::new();
        let mut required = BTreeSet::new();
        let mut provided = BTreeSet::new();

        for component in components {
            if by_name.contains_key(component.name()) {
                return Err(LoadError::DuplicateComponent {
                    file: PROGRAMMATIC_SOURCE.to_string(),
                    component: component.name().to_string(),
                });
            }
            required.extend(component.required_interfaces().iter().map(|r| r.interface.clone()));
            provided.extend(component.provided_interfaces().iter().cloned());
            by_name.insert(component.name().to_string(), stored.len());
            stored.push(Arc::new(component));
        }

        let graph = InterfaceGraph::build(&stored);
        info!(components = stored.len(), required = required.len(), provided = provided.len(), "Built component repository");
        Ok(Self {
            components: stored,
            by_name,
            required,
            provided,
            graph,
        })
    }

    /// Components in load order
    pub fn components(&self) -> &[Arc<Component>] {
        &self.components
    }

    pub fn component(&self, name: &str) -> Option<&Arc<Component>> {
        self.by_name.get(name).map(|i| &self.components[*i])
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Components providing `interface`, in load order
    pub fn providers_of(&self, interface: &str) -> Vec<&Arc<Component>> {
        self.components.iter().filter(|c| c.provides(interface)).collect()
    }

    pub fn required_interfaces(&self) -> &BTreeSet<String> {
        &self.required
    }

    pub fn provided_interfaces(&self) -> &BTreeSet<String> {
        &self.provided
    }

    /// `required - provided`: every required interface nobody provides
    pub fn unresolvable_required_interfaces(&self) -> BTreeSet<String> {
        self.required.difference(&self.provided).cloned().collect()
    }

    /// Interfaces that resolving `interface` may need, `interface` included
    pub fn interfaces_reachable_from(&self, interface: &str) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self.graph.reachable(interface).into_iter().map(|n| self.graph.graph[n].clone()).collect();
        names.insert(interface.to_string());
        names
    }

    /// Interfaces reachable from `interface` that have no provider
    pub fn unresolvable_interfaces_reachable_from(&self, interface: &str) -> BTreeSet<String> {
        self.interfaces_reachable_from(interface).into_iter().filter(|i| !self.provided.contains(i)).collect()
    }

    /// Whether resolving `interface` can run into a recursive requirement
    pub fn has_cycles(&self, interface: &str) -> bool {
        let reachable = self.graph.reachable(interface);
        let cyclic = self.graph.has_cycle_within(&reachable);
        debug!(interface, cyclic, "Checked interface graph for cycles");
        cyclic
    }

    /// Every component that may take part in a tree realising `interface`
    pub fn affected_components(&self, interface: &str) -> Vec<&Arc<Component>> {
        let interfaces = self.interfaces_reachable_from(interface);
        self.components.iter().filter(|c| c.provided_interfaces().iter().any(|i| interfaces.contains(i))).collect()
    }

    /// Number of distinct component trees for `interface`, ignoring parameters
    ///
    /// Returns `None` when the interface graph below `interface` is cyclic and
    /// the number is unbounded. Saturates at `u64::MAX`.
    pub fn count_unparameterized_compositions(&self, interface: &str) -> Option<u64> {
        if self.has_cycles(interface) {
            return None;
        }
        let mut memo = HashMap::new();
        Some(self.count_for(interface, &mut memo))
    }

    fn count_for(&self, interface: &str, memo: &mut HashMap<String, u64>) -> u64 {
        if let Some(count) = memo.get(interface) {
            return *count;
        }
        let mut total: u64 = 0;
        for provider in self.providers_of(interface) {
            let mut product: u64 = 1;
            for required in provider.required_interfaces() {
                product = product.saturating_mul(self.count_for(&required.interface, memo));
            }
            total = total.saturating_add(product);
        }
        memo.insert(interface.to_string(), total);
        total
    }

    /// Every component tree for `interface` with default parameter values
    ///
    /// Returns `None` for cyclic interfaces, whose trees are unbounded.
    pub fn all_algorithm_selection_instances(&self, interface: &str) -> Option<Vec<ComponentInstance>> {
        if self.has_cycles(interface) {
            return None;
        }
        Some(self.selections_for(interface))
    }

    fn selections_for(&self, interface: &str) -> Vec<ComponentInstance> {
        let mut instances = Vec::new();
        for provider in self.providers_of(interface) {
            let mut partial = vec![ComponentInstance::default_of(Arc::clone(provider))];
            for required in provider.required_interfaces() {
                let children = self.selections_for(&required.interface);
                partial = partial
                    .into_iter()
                    .flat_map(|instance| children.iter().map(move |child| instance.clone().with_child(required.id.clone(), child.clone())))
                    .collect();
            }
            instances.extend(partial);
        }
        instances
    }

    pub fn stats(&self) -> RepositoryStats {
        let mut stats = RepositoryStats {
            components: self.components.len(),
            ..Default::default()
        };
        for component in &self.components {
            stats.dependencies += component.dependencies().len();
            for parameter in component.parameters() {
                stats.parameters += 1;
                match parameter.domain() {
                    Domain::Numeric(d) => {
                        stats.numeric_parameters += 1;
                        if d.is_integer() {
                            stats.integer_parameters += 1;
                        } else {
                            stats.continuous_parameters += 1;
                        }
                    }
                    Domain::Categorical(_) => stats.categorical_parameters += 1,
                    Domain::Boolean(_) => stats.boolean_parameters += 1,
                    Domain::Empty => {}
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgsearch_common::{Parameter, ParameterValue};

    fn leaf(name: &str, interface: &str) -> Component {
        Component::new(name).with_provided_interface(interface)
    }

    fn pipeline_repository() -> Repository {
        Repository::from_components(vec![
            Component::new("pipeline")
                .with_provided_interface("pipeline")
                .with_required_interface("pre", "preprocessor")
                .with_required_interface("clf", "classifier")
                .with_parameter(Parameter::new("parallel", Domain::boolean(), ParameterValue::Boolean(false))),
            leaf("pca", "preprocessor"),
            leaf("scaler", "preprocessor"),
            leaf("svm", "classifier").with_parameter(Parameter::new("C", Domain::real(0.1, 10.0), ParameterValue::Real(1.0))),
            leaf("knn", "classifier").with_parameter(Parameter::new("k", Domain::integer(1.0, 9.0), ParameterValue::Integer(3))),
            leaf("tree", "classifier"),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_component_rejected() {
        let result = Repository::from_components(vec![leaf("a", "X"), leaf("a", "Y")]);
        assert!(matches!(result, Err(LoadError::DuplicateComponent { component, .. }) if component == "a"));
    }

    #[test]
    fn test_unresolvable_required_interfaces() {
        let repository = Repository::from_components(vec![Component::new("b").with_provided_interface("Z").with_required_interface("y", "Y")]).unwrap();
        assert_eq!(repository.unresolvable_required_interfaces(), BTreeSet::from(["Y".to_string()]));
        assert_eq!(repository.unresolvable_interfaces_reachable_from("Z"), BTreeSet::from(["Y".to_string()]));
        assert!(pipeline_repository().unresolvable_required_interfaces().is_empty());
    }

    #[test]
    fn test_providers_and_lookup() {
        let repository = pipeline_repository();
        let names: Vec<&str> = repository.providers_of("classifier").iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["svm", "knn", "tree"]);
        assert!(repository.component("pca").is_some());
        assert!(repository.component("missing").is_none());
    }

    #[test]
    fn test_composition_count() {
        let repository = pipeline_repository();
        assert_eq!(repository.count_unparameterized_compositions("pipeline"), Some(6));
        assert_eq!(repository.count_unparameterized_compositions("classifier"), Some(3));
        assert_eq!(repository.count_unparameterized_compositions("nothing"), Some(0));
        assert_eq!(repository.all_algorithm_selection_instances("pipeline").map(|v| v.len()), Some(6));
    }

    #[test]
    fn test_cycle_detection() {
        let repository = Repository::from_components(vec![
            Component::new("ensemble").with_provided_interface("classifier").with_required_interface("base", "classifier"),
            leaf("tree", "classifier"),
            leaf("standalone", "other"),
        ])
        .unwrap();
        assert!(repository.has_cycles("classifier"));
        assert!(!repository.has_cycles("other"));
        assert_eq!(repository.count_unparameterized_compositions("classifier"), None);
        assert!(repository.all_algorithm_selection_instances("classifier").is_none());
        assert!(!pipeline_repository().has_cycles("pipeline"));
    }

    #[test]
    fn test_affected_components() {
        let repository = pipeline_repository();
        assert_eq!(repository.affected_components("pipeline").len(), 6);
        assert_eq!(repository.affected_components("preprocessor").len(), 2);
    }

    #[test]
    fn test_stats() {
        let stats = pipeline_repository().stats();
        assert_eq!(stats.components, 6);
        assert_eq!(stats.parameters, 3);
        assert_eq!(stats.numeric_parameters, 2);
        assert_eq!(stats.integer_parameters, 1);
        assert_eq!(stats.continuous_parameters, 1);
        assert_eq!(stats.boolean_parameters, 1);
    }
}

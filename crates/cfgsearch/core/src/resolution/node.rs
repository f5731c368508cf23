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

//! Partial configurations explored by the resolver and the search engine.

use crate::propagation::DomainMap;
use cfgsearch_common::{Component, Domain, Parameter, ParameterValue, RefinementPolicy, is_terminal};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Slot indices leading from the root to a partial instance
pub type SlotPath = Vec<usize>;

/// A required-interface slot of a partial instance
#[derive(Debug, Clone)]
pub enum Slot {
    Open { interface: String },
    Resolved(Box<PartialInstance>),
}

#[derive(Debug, Clone)]
pub struct SlotBinding {
    pub id: String,
    pub slot: Slot,
}

/// A component whose parameters are still restricted domains
#[derive(Debug, Clone)]
pub struct PartialInstance {
    component: Arc<Component>,
    domains: DomainMap,
    refined: BTreeSet<String>,
    slots: Vec<SlotBinding>,
}

impl PartialInstance {
    pub(crate) fn new(component: Arc<Component>, domains: DomainMap) -> Self {
        let slots = component
            .required_interfaces()
            .iter()
            .map(|r| SlotBinding {
                id: r.id.clone(),
                slot: Slot::Open { interface: r.interface.clone() },
            })
            .collect();
        Self {
            component,
            domains,
            refined: BTreeSet::new(),
            slots,
        }
    }

    pub fn component(&self) -> &Arc<Component> {
        &self.component
    }

    pub fn domains(&self) -> &DomainMap {
        &self.domains
    }

    pub fn domain(&self, parameter: &str) -> Option<&Domain> {
        self.domains.get(parameter)
    }

    pub fn slots(&self) -> &[SlotBinding] {
        &self.slots
    }

    pub fn is_refined(&self, parameter: &str) -> bool {
        self.refined.contains(parameter)
    }

    /// Refinement policy for the next step of `parameter`
    pub fn policy_for(&self, parameter: &Parameter) -> RefinementPolicy {
        let policy = parameter.refinement();
        if self.is_refined(parameter.name()) { policy.after_first_step() } else { policy }
    }

    pub(crate) fn set_domains(&mut self, domains: DomainMap) {
        self.domains = domains;
    }

    pub(crate) fn mark_refined(&mut self, parameter: &str) {
        self.refined.insert(parameter.to_string());
    }

    pub(crate) fn resolve_slot(&mut self, index: usize, child: PartialInstance) {
        if let Some(binding) = self.slots.get_mut(index) {
            binding.slot = Slot::Resolved(Box::new(child));
        }
    }

    fn at_mut(&mut self, path: &[usize]) -> Option<&mut PartialInstance> {
        match path.split_first() {
            None => Some(self),
            Some((index, rest)) => match &mut self.slots.get_mut(*index)?.slot {
                Slot::Resolved(child) => child.at_mut(rest),
                Slot::Open { .. } => None,
            },
        }
    }

    fn write_canonical(&self, out: &mut String) {
        out.push_str(self.component.name());
        out.push('(');
        for (i, (name, domain)) in self.domains.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(name);
            if self.is_refined(name) {
                out.push('*');
            }
            out.push('=');
            out.push_str(&domain.to_string());
        }
        out.push(')');
        self.write_slots(out, PartialInstance::write_canonical);
    }

    fn write_shape(&self, out: &mut String) {
        out.push_str(self.component.name());
        self.write_slots(out, PartialInstance::write_shape);
    }

    fn write_slots(&self, out: &mut String, nested: fn(&PartialInstance, &mut String)) {
        if self.slots.is_empty() {
            return;
        }
        out.push('{');
        for (i, binding) in self.slots.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&binding.id);
            out.push(':');
            match &binding.slot {
                Slot::Open { interface } => {
                    out.push('?');
                    out.push_str(interface);
                }
                Slot::Resolved(child) => nested(child, out),
            }
        }
        out.push('}');
    }
}

/// A decision applied to reach a node from its parent
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    ChooseComponent { path: SlotPath, slot: String, component: String },
    RefineParameter { path: SlotPath, component: String, parameter: String, domain: Domain },
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::ChooseComponent { slot, component, .. } if slot.is_empty() => write!(f, "choose {}", component),
            Decision::ChooseComponent { slot, component, .. } => write!(f, "choose {} for slot {}", component, slot),
            Decision::RefineParameter { component, parameter, domain, .. } => write!(f, "refine {}.{} to {}", component, parameter, domain),
        }
    }
}

/// Hash of a node's canonical form; equal for structurally identical nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeSignature([u8; 32]);

impl NodeSignature {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for NodeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Component and slot structure of a node, ignoring parameter domains
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeSignature(String);

impl ShapeSignature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShapeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The next decision a node needs
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Resolve {
        path: SlotPath,
        slot: String,
        interface: String,
        /// Components on the way from the root to the slot's owner
        ancestors: Vec<String>,
    },
    Refine {
        path: SlotPath,
        component: Arc<Component>,
        parameter: String,
        domain: Domain,
        policy: RefinementPolicy,
    },
}

/// A partial configuration realising a requested interface
///
/// Nodes are never changed in place; every decision yields a new node.
#[derive(Debug, Clone)]
pub struct SearchNode {
    interface: String,
    root: PartialInstance,
    decisions: Vec<Decision>,
}

impl SearchNode {
    pub(crate) fn new(interface: &str, root: PartialInstance) -> Self {
        let decision = Decision::ChooseComponent {
            path: Vec::new(),
            slot: String::new(),
            component: root.component().name().to_string(),
        };
        Self {
            interface: interface.to_string(),
            root,
            decisions: vec![decision],
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn root(&self) -> &PartialInstance {
        &self.root
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    pub fn last_decision(&self) -> Option<&Decision> {
        self.decisions.last()
    }

    pub fn depth(&self) -> usize {
        self.decisions.len()
    }

    /// Every parameter domain is terminal and every slot is resolved
    pub fn is_terminal(&self) -> bool {
        self.next_step().is_none()
    }

    pub fn canonical(&self) -> String {
        let mut out = String::new();
        self.root.write_canonical(&mut out);
        out
    }

    pub fn signature(&self) -> NodeSignature {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.interface.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.canonical().as_bytes());
        NodeSignature(*hasher.finalize().as_bytes())
    }

    pub fn shape(&self) -> ShapeSignature {
        let mut out = String::new();
        self.root.write_shape(&mut out);
        ShapeSignature(out)
    }

    /// Open slots first in pre-order, then the first non-terminal parameter in pre-order
    pub(crate) fn next_step(&self) -> Option<Step> {
        let mut path = Vec::new();
        let mut ancestors = Vec::new();
        find_open_slot(&self.root, &mut path, &mut ancestors).or_else(|| find_refinable(&self.root, &mut Vec::new()))
    }

    pub(crate) fn with_resolved_slot(&self, path: &[usize], child: PartialInstance, decision: Decision) -> Option<SearchNode> {
        let (index, owner) = path.split_last()?;
        let mut node = self.clone();
        node.root.at_mut(owner)?.resolve_slot(*index, child);
        node.decisions.push(decision);
        Some(node)
    }

    pub(crate) fn with_domains(&self, path: &[usize], parameter: &str, domains: DomainMap, decision: Decision) -> Option<SearchNode> {
        let mut node = self.clone();
        let partial = node.root.at_mut(path)?;
        partial.set_domains(domains);
        partial.mark_refined(parameter);
        node.decisions.push(decision);
        Some(node)
    }

    pub(crate) fn partial_at(&self, path: &[usize]) -> Option<&PartialInstance> {
        let mut current = &self.root;
        for index in path {
            current = match &current.slots.get(*index)?.slot {
                Slot::Resolved(child) => child,
                Slot::Open { .. } => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for SearchNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

fn find_open_slot(partial: &PartialInstance, path: &mut Vec<usize>, ancestors: &mut Vec<String>) -> Option<Step> {
    ancestors.push(partial.component.name().to_string());
    for (index, binding) in partial.slots.iter().enumerate() {
        if let Slot::Open { interface } = &binding.slot {
            let mut slot_path = path.clone();
            slot_path.push(index);
            return Some(Step::Resolve {
                path: slot_path,
                slot: binding.id.clone(),
                interface: interface.clone(),
                ancestors: ancestors.clone(),
            });
        }
    }
    for (index, binding) in partial.slots.iter().enumerate() {
        if let Slot::Resolved(child) = &binding.slot {
            path.push(index);
            if let Some(step) = find_open_slot(child, path, ancestors) {
                return Some(step);
            }
            path.pop();
        }
    }
    ancestors.pop();
    None
}

fn find_refinable(partial: &PartialInstance, path: &mut Vec<usize>) -> Option<Step> {
    for parameter in partial.component.parameters() {
        let Some(domain) = partial.domains.get(parameter.name()) else {
            continue;
        };
        let policy = partial.policy_for(parameter);
        if !is_terminal(domain, &policy) {
            return Some(Step::Refine {
                path: path.clone(),
                component: Arc::clone(&partial.component),
                parameter: parameter.name().to_string(),
                domain: domain.clone(),
                policy,
            });
        }
    }
    for (index, binding) in partial.slots.iter().enumerate() {
        if let Slot::Resolved(child) = &binding.slot {
            path.push(index);
            if let Some(step) = find_refinable(child, path) {
                return Some(step);
            }
            path.pop();
        }
    }
    None
}

/// Deterministic stand-in value for a terminal domain
///
/// Integer intervals give their rounded midpoint, real intervals the default
/// when it lies inside and the midpoint otherwise.
pub fn representative_value(parameter: &Parameter, domain: &Domain) -> Option<ParameterValue> {
    if let Some(value) = domain.singleton_value() {
        return Some(value);
    }
    match domain {
        Domain::Numeric(d) if d.is_integer() => Some(ParameterValue::Integer(d.midpoint().round().clamp(d.min(), d.max()) as i64)),
        Domain::Numeric(d) => {
            let default = parameter.default_value().as_f64().filter(|v| d.contains(*v));
            Some(ParameterValue::Real(default.unwrap_or_else(|| d.midpoint())))
        }
        Domain::Categorical(c) => {
            let default = parameter.default_value().as_str().filter(|v| c.contains(v));
            default.or_else(|| c.values().first().map(String::as_str)).map(|v| ParameterValue::Category(v.to_string()))
        }
        Domain::Boolean(b) => {
            let default = parameter.default_value().as_bool().filter(|v| b.allows(*v));
            default.or_else(|| b.values().first().copied()).map(ParameterValue::Boolean)
        }
        Domain::Empty => None,
    }
}

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

//! Concrete, fully parameterised component trees.

use crate::component::Component;
use crate::domain::{Domain, ParameterValue};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A node of a resolved configuration tree
///
/// Each instance exclusively owns its children. Instances are never mutated
/// once handed out; the `with_*` methods consume and return a new value.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentInstance {
    #[serde(serialize_with = "serialize_component_name")]
    component: Arc<Component>,
    parameter_values: BTreeMap<String, ParameterValue>,
    satisfaction: BTreeMap<String, Vec<ComponentInstance>>,
}

fn serialize_component_name<S: Serializer>(component: &Arc<Component>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(component.name())
}

impl ComponentInstance {
    pub fn new(component: Arc<Component>, parameter_values: BTreeMap<String, ParameterValue>) -> Self {
        Self {
            component,
            parameter_values,
            satisfaction: BTreeMap::new(),
        }
    }

    /// Instance with every parameter at its declared default and no children
    pub fn default_of(component: Arc<Component>) -> Self {
        let values = component.parameters().iter().map(|p| (p.name().to_string(), p.default_value().clone())).collect();
        Self::new(component, values)
    }

    /// Numeric parameters at their lower bounds, the rest at their defaults
    pub fn min_of(component: Arc<Component>) -> Self {
        Self::extreme_of(component, |d| d.min())
    }

    /// Numeric parameters at their upper bounds, the rest at their defaults
    pub fn max_of(component: Arc<Component>) -> Self {
        Self::extreme_of(component, |d| d.max())
    }

    fn extreme_of(component: Arc<Component>, bound: impl Fn(&crate::domain::NumericDomain) -> f64) -> Self {
        let values = component
            .parameters()
            .iter()
            .map(|p| {
                let value = match p.domain() {
                    Domain::Numeric(d) if d.is_integer() => ParameterValue::Integer(bound(d) as i64),
                    Domain::Numeric(d) => ParameterValue::Real(bound(d)),
                    _ => p.default_value().clone(),
                };
                (p.name().to_string(), value)
            })
            .collect();
        Self::new(component, values)
    }

    pub fn with_parameter_value(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.parameter_values.insert(name.into(), value);
        self
    }

    pub fn with_child(mut self, required_interface_id: impl Into<String>, child: ComponentInstance) -> Self {
        self.satisfaction.entry(required_interface_id.into()).or_default().push(child);
        self
    }

    pub fn component(&self) -> &Arc<Component> {
        &self.component
    }

    pub fn component_name(&self) -> &str {
        self.component.name()
    }

    pub fn parameter_values(&self) -> &BTreeMap<String, ParameterValue> {
        &self.parameter_values
    }

    pub fn parameter_value(&self, name: &str) -> Option<&ParameterValue> {
        self.parameter_values.get(name)
    }

    pub fn satisfaction(&self) -> &BTreeMap<String, Vec<ComponentInstance>> {
        &self.satisfaction
    }

    pub fn children(&self, required_interface_id: &str) -> &[ComponentInstance] {
        self.satisfaction.get(required_interface_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of instances in this tree, including the root
    pub fn size(&self) -> usize {
        1 + self.satisfaction.values().flatten().map(ComponentInstance::size).sum::<usize>()
    }

    /// Every slot of every node in the tree has at least one child
    pub fn is_complete(&self) -> bool {
        self.component.required_interfaces().iter().all(|r| !self.children(&r.id).is_empty()) && self.satisfaction.values().flatten().all(ComponentInstance::is_complete)
    }

    /// Canonical text form; two instances are equal iff their signatures are
    pub fn signature(&self) -> String {
        let mut out = String::new();
        self.write_signature(&mut out);
        out
    }

    fn write_signature(&self, out: &mut String) {
        out.push_str(self.component.name());
        out.push('(');
        let values: Vec<String> = self.parameter_values.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        out.push_str(&values.join(","));
        out.push(')');
        if !self.satisfaction.is_empty() {
            out.push('{');
            for (i, (id, children)) in self.satisfaction.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(id);
                out.push_str(":[");
                for (j, child) in children.iter().enumerate() {
                    if j > 0 {
                        out.push(',');
                    }
                    child.write_signature(out);
                }
                out.push(']');
            }
            out.push('}');
        }
    }
}

impl PartialEq for ComponentInstance {
    fn eq(&self, other: &Self) -> bool {
        self.component.name() == other.component.name() && self.parameter_values == other.parameter_values && self.satisfaction == other.satisfaction
    }
}

impl fmt::Display for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

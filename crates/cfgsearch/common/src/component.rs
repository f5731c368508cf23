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

use crate::dependency::Dependency;
use crate::domain::{Domain, ParameterValue};
use crate::refinement::RefinementPolicy;
use serde::Serialize;

/// A named, typed parameter of a component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    name: String,
    domain: Domain,
    default: ParameterValue,
    refinement: Option<RefinementPolicy>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, domain: Domain, default: ParameterValue) -> Self {
        Self {
            name: name.into(),
            domain,
            default,
            refinement: None,
        }
    }

    pub fn with_refinement(mut self, policy: RefinementPolicy) -> Self {
        self.refinement = Some(policy);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn default_value(&self) -> &ParameterValue {
        &self.default
    }

    /// Refinement policy, falling back to the default for parameters declared without one
    pub fn refinement(&self) -> RefinementPolicy {
        self.refinement.unwrap_or_default()
    }

    pub fn is_numeric(&self) -> bool {
        self.domain.is_numeric()
    }

    pub fn is_categorical(&self) -> bool {
        self.domain.is_categorical()
    }

    pub fn is_boolean(&self) -> bool {
        self.domain.is_boolean()
    }
}

/// A local slot naming an interface the component needs from a child
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredInterface {
    pub id: String,
    pub interface: String,
}

/// A reusable configuration unit with parameters and interface obligations
///
/// Components are assembled once through the `with_*` methods and are
/// read-only after being handed to a repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    name: String,
    provided_interfaces: Vec<String>,
    required_interfaces: Vec<RequiredInterface>,
    parameters: Vec<Parameter>,
    dependencies: Vec<Dependency>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provided_interfaces: Vec::new(),
            required_interfaces: Vec::new(),
            parameters: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_provided_interface(mut self, interface: impl Into<String>) -> Self {
        let interface = interface.into();
        if !self.provided_interfaces.contains(&interface) {
            self.provided_interfaces.push(interface);
        }
        self
    }

    pub fn with_required_interface(mut self, id: impl Into<String>, interface: impl Into<String>) -> Self {
        self.required_interfaces.push(RequiredInterface {
            id: id.into(),
            interface: interface.into(),
        });
        self
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provided_interfaces(&self) -> &[String] {
        &self.provided_interfaces
    }

    pub fn provides(&self, interface: &str) -> bool {
        self.provided_interfaces.iter().any(|i| i == interface)
    }

    pub fn required_interfaces(&self) -> &[RequiredInterface] {
        &self.required_interfaces
    }

    pub fn required_interface(&self, id: &str) -> Option<&RequiredInterface> {
        self.required_interfaces.iter().find(|r| r.id == id)
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }
}

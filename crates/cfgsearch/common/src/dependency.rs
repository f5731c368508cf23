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

//! Conditional restrictions between the parameters of one component.

use crate::domain::Domain;
use serde::Serialize;
use std::fmt;

/// Binds a parameter to a restricting sub-domain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Literal {
    parameter: String,
    restriction: Domain,
}

impl Literal {
    pub fn new(parameter: impl Into<String>, restriction: Domain) -> Self {
        Self {
            parameter: parameter.into(),
            restriction,
        }
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    pub fn restriction(&self) -> &Domain {
        &self.restriction
    }

    /// True when everything `current` still allows is within the restriction
    pub fn is_entailed_by(&self, current: &Domain) -> bool {
        current.is_subset_of(&self.restriction)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.restriction.singleton_value() {
            Some(value) => write!(f, "{} = {}", self.parameter, value),
            None => write!(f, "{} in {}", self.parameter, self.restriction),
        }
    }
}

/// `premise -> conclusion`, where the premise is a disjunction of conjunctions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dependency {
    premise: Vec<Vec<Literal>>,
    conclusion: Vec<Literal>,
}

impl Dependency {
    pub fn new(premise: Vec<Vec<Literal>>, conclusion: Vec<Literal>) -> Self {
        Self { premise, conclusion }
    }

    pub fn premise(&self) -> &[Vec<Literal>] {
        &self.premise
    }

    pub fn conclusion(&self) -> &[Literal] {
        &self.conclusion
    }

    /// Every parameter named in the premise or the conclusion
    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.premise.iter().flatten().chain(self.conclusion.iter()).map(|l| l.parameter())
    }
}

fn join(literals: &[Literal]) -> String {
    literals.iter().map(|l| l.to_string()).collect::<Vec<_>>().join(" & ")
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let premise: Vec<String> = self.premise.iter().map(|m| join(m)).collect();
        write!(f, "{} -> {}", premise.join(" | "), join(&self.conclusion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entailment_is_subset() {
        let literal = Literal::new("p", Domain::integer(5.0, 10.0));
        assert!(literal.is_entailed_by(&Domain::integer(6.0, 8.0)));
        assert!(literal.is_entailed_by(&Domain::integer(5.0, 10.0)));
        assert!(!literal.is_entailed_by(&Domain::integer(0.0, 10.0)));
        assert!(!literal.is_entailed_by(&Domain::categorical(["a"])));
    }

    #[test]
    fn test_dependency_display() {
        let dependency = Dependency::new(
            vec![
                vec![Literal::new("kernel", Domain::categorical(["rbf"]))],
                vec![Literal::new("kernel", Domain::categorical(["poly"])), Literal::new("shrink", Domain::Boolean(crate::domain::BooleanDomain::only(true)))],
            ],
            vec![Literal::new("gamma", Domain::real(0.0, 1.0))],
        );
        assert_eq!(dependency.to_string(), "kernel = rbf | kernel = poly & shrink = true -> gamma in [0, 1]");
        assert_eq!(dependency.parameters().collect::<Vec<_>>(), vec!["kernel", "kernel", "shrink", "gamma"]);
    }
}

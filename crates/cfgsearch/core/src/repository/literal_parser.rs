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

//! Parser for the dependency literal grammar
//!
//! ```text
//! dependency := premise -> conclusion
//! premise    := monomial ('|' monomial)*
//! monomial   := literal ('&' literal)*
//! literal    := <param> '=' <value> | <param> 'in' (interval | set)
//! interval   := ('[' | '(') <min> ',' <max> (']' | ')')
//! set        := ('[' | '{') <value> (',' <value>)* (']' | '}')
//! ```
//!
//! Intervals are always read as closed. An empty premise always holds.

use cfgsearch_common::{BooleanDomain, CategoricalDomain, Component, Dependency, Domain, Literal, NumericDomain};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LiteralError {
    #[error("empty literal")]
    Empty,
    #[error("dependency has no conclusion")]
    EmptyConclusion,
    #[error("literal '{0}' has neither '=' nor 'in'")]
    MissingOperator(String),
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("cannot read '{target}' for parameter '{parameter}': {reason}")]
    InvalidTarget { parameter: String, target: String, reason: String },
    #[error("restriction {restriction} of parameter '{parameter}' is not within its domain {domain}")]
    OutsideDomain { parameter: String, restriction: String, domain: String },
}

enum Operator {
    Equals,
    In,
}

/// Parses a `pre -> post` pair against the parameters of `component`
pub fn parse_dependency(component: &Component, pre: &str, post: &str) -> Result<Dependency, LiteralError> {
    let mut premise = Vec::new();
    for monomial in pre.split('|') {
        if monomial.trim().is_empty() {
            continue;
        }
        premise.push(parse_conjunction(component, monomial)?);
    }
    if premise.is_empty() {
        premise.push(Vec::new());
    }

    let conclusion = parse_conjunction(component, post)?;
    if conclusion.is_empty() {
        return Err(LiteralError::EmptyConclusion);
    }
    Ok(Dependency::new(premise, conclusion))
}

fn parse_conjunction(component: &Component, text: &str) -> Result<Vec<Literal>, LiteralError> {
    text.split('&').filter(|l| !l.trim().is_empty()).map(|l| parse_literal(component, l)).collect()
}

/// Parses a single literal; the restriction must lie within the parameter's domain
pub fn parse_literal(component: &Component, text: &str) -> Result<Literal, LiteralError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(LiteralError::Empty);
    }
    let (name, operator, target) = split_literal(text)?;
    let parameter = component.parameter(name).ok_or_else(|| LiteralError::UnknownParameter(name.to_string()))?;
    let domain = parameter.domain();

    let invalid = |reason: &str| LiteralError::InvalidTarget {
        parameter: name.to_string(),
        target: target.to_string(),
        reason: reason.to_string(),
    };

    let restriction = match (domain, operator) {
        (Domain::Numeric(d), Operator::Equals) => {
            let value: f64 = target.parse().map_err(|_| invalid("not a number"))?;
            Domain::Numeric(NumericDomain::point(d.is_integer(), value))
        }
        (Domain::Numeric(d), Operator::In) => {
            let items = list_items(target).ok_or_else(|| invalid("expected an interval"))?;
            let [min, max] = items.as_slice() else {
                return Err(invalid("an interval needs exactly two bounds"));
            };
            let min: f64 = min.parse().map_err(|_| invalid("lower bound is not a number"))?;
            let max: f64 = max.parse().map_err(|_| invalid("upper bound is not a number"))?;
            Domain::Numeric(NumericDomain::new(d.is_integer(), min, max))
        }
        (Domain::Categorical(_), Operator::Equals) => Domain::Categorical(CategoricalDomain::singleton(target)),
        (Domain::Categorical(_), Operator::In) => {
            let items = list_items(target).ok_or_else(|| invalid("expected a set of values"))?;
            Domain::Categorical(CategoricalDomain::new(items))
        }
        (Domain::Boolean(_), Operator::Equals) => Domain::Boolean(BooleanDomain::only(parse_bool(target).ok_or_else(|| invalid("not a boolean"))?)),
        (Domain::Boolean(_), Operator::In) => {
            let items = list_items(target).ok_or_else(|| invalid("expected a set of values"))?;
            let values = items.into_iter().map(|item| parse_bool(item).ok_or_else(|| invalid("not a boolean"))).collect::<Result<Vec<bool>, _>>()?;
            match (values.contains(&true), values.contains(&false)) {
                (true, true) => Domain::boolean(),
                (true, false) => Domain::Boolean(BooleanDomain::only(true)),
                (false, true) => Domain::Boolean(BooleanDomain::only(false)),
                (false, false) => return Err(invalid("empty set")),
            }
        }
        (Domain::Empty, _) => return Err(invalid("parameter has an empty domain")),
    };

    if restriction.is_empty() || !restriction.is_subset_of(domain) {
        return Err(LiteralError::OutsideDomain {
            parameter: name.to_string(),
            restriction: restriction.to_string(),
            domain: domain.to_string(),
        });
    }
    Ok(Literal::new(name, restriction))
}

/// Membership is checked first, so `=` inside a set stays part of the target
fn split_literal(text: &str) -> Result<(&str, Operator, &str), LiteralError> {
    let mut parts = text.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default().trim_start();
    if let Some(target) = rest.strip_prefix("in")
        && target.starts_with(|c: char| c.is_whitespace() || "[({".contains(c))
    {
        return Ok((name, Operator::In, target.trim()));
    }
    match text.split_once('=') {
        Some((name, target)) => Ok((name.trim(), Operator::Equals, target.trim())),
        None => Err(LiteralError::MissingOperator(text.to_string())),
    }
}

/// Items of a bracketed, comma-separated list
fn list_items(target: &str) -> Option<Vec<&str>> {
    let inner = target.strip_prefix(['[', '(', '{'])?.strip_suffix([']', ')', '}'])?;
    Some(inner.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

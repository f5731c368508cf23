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

//! Parameter value domains and the operations every domain supports.
//!
//! A [`Domain`] is a closed sum over numeric intervals, ordered categorical sets
//! and the boolean domain. All operations are total: intersecting disjoint
//! domains yields [`Domain::Empty`], never an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised when a raw value cannot be interpreted within a domain
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("'{value}' is not a number")]
    NotANumber { value: String },
    #[error("'{value}' is not an integer")]
    NotAnInteger { value: String },
    #[error("'{value}' is not a boolean")]
    NotABoolean { value: String },
    #[error("'{value}' is not contained in domain {domain}")]
    OutsideDomain { value: String, domain: String },
}

/// A concrete value assigned to a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Category(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Integer(v) => Some(*v as f64),
            ParameterValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::Category(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Boolean(v) => write!(f, "{}", v),
            ParameterValue::Integer(v) => write!(f, "{}", v),
            ParameterValue::Real(v) => write!(f, "{}", v),
            ParameterValue::Category(v) => write!(f, "{}", v),
        }
    }
}

/// Closed numeric interval `[min, max]`
///
/// Integer intervals keep their bounds snapped inward to whole numbers, so two
/// integer domains covering the same integers always compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericDomain {
    is_integer: bool,
    min: f64,
    max: f64,
}

impl NumericDomain {
    pub fn new(is_integer: bool, min: f64, max: f64) -> Self {
        if is_integer {
            Self { is_integer, min: min.ceil(), max: max.floor() }
        } else {
            Self { is_integer, min, max }
        }
    }

    pub fn point(is_integer: bool, value: f64) -> Self {
        Self::new(is_integer, value, value)
    }

    pub fn is_integer(&self) -> bool {
        self.is_integer
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Midpoint that stays finite even when `width` overflows
    pub fn midpoint(&self) -> f64 {
        self.min / 2.0 + self.max / 2.0
    }

    /// Point at fraction `t` of the way from `min` to `max`, without overflow
    pub fn lerp(&self, t: f64) -> f64 {
        if t >= 1.0 { self.max } else { self.min * (1.0 - t) + self.max * t }
    }

    pub fn is_empty(&self) -> bool {
        // also true when a bound is NaN
        !(self.min <= self.max)
    }

    pub fn is_singleton(&self) -> bool {
        self.min == self.max
    }

    /// Number of whole numbers inside the interval
    pub fn integer_count(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        let lo = self.min.ceil();
        let hi = self.max.floor();
        if lo > hi { 0 } else { (hi - lo) as u64 + 1 }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max && (!self.is_integer || value.fract() == 0.0)
    }

    pub fn is_subset_of(&self, other: &NumericDomain) -> bool {
        if self.is_empty() {
            return true;
        }
        let within = self.min >= other.min && self.max <= other.max;
        // a real interval wider than a point holds non-integers
        let integral = !other.is_integer || self.is_integer || (self.is_singleton() && self.min.fract() == 0.0);
        within && integral
    }

    pub fn intersect(&self, other: &NumericDomain) -> Option<NumericDomain> {
        let result = NumericDomain::new(self.is_integer || other.is_integer, self.min.max(other.min), self.max.min(other.max));
        (!result.is_empty()).then_some(result)
    }
}

impl fmt::Display for NumericDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Ordered set of distinct category labels
///
/// Insertion order is the display and refinement order. Equality is set
/// equality, so intersection is commutative regardless of order.
#[derive(Debug, Clone, Serialize)]
pub struct CategoricalDomain {
    values: Vec<String>,
}

impl CategoricalDomain {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut distinct: Vec<String> = Vec::new();
        for value in values {
            let value = value.into();
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }
        Self { values: distinct }
    }

    pub fn singleton(value: impl Into<String>) -> Self {
        Self { values: vec![value.into()] }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    pub fn is_subset_of(&self, other: &CategoricalDomain) -> bool {
        self.values.iter().all(|v| other.contains(v))
    }

    pub fn intersect(&self, other: &CategoricalDomain) -> Option<CategoricalDomain> {
        let values: Vec<String> = self.values.iter().filter(|v| other.contains(v)).cloned().collect();
        (!values.is_empty()).then_some(CategoricalDomain { values })
    }
}

impl PartialEq for CategoricalDomain {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.is_subset_of(other)
    }
}

impl fmt::Display for CategoricalDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.values.join(", "))
    }
}

/// Subset of `{true, false}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BooleanDomain {
    allows_true: bool,
    allows_false: bool,
}

impl BooleanDomain {
    pub fn full() -> Self {
        Self { allows_true: true, allows_false: true }
    }

    pub fn only(value: bool) -> Self {
        Self {
            allows_true: value,
            allows_false: !value,
        }
    }

    pub fn allows(&self, value: bool) -> bool {
        if value { self.allows_true } else { self.allows_false }
    }

    /// Allowed values, `true` first
    pub fn values(&self) -> Vec<bool> {
        [true, false].into_iter().filter(|v| self.allows(*v)).collect()
    }

    pub fn is_empty(&self) -> bool {
        !self.allows_true && !self.allows_false
    }

    pub fn is_singleton(&self) -> bool {
        self.allows_true != self.allows_false
    }

    pub fn is_subset_of(&self, other: &BooleanDomain) -> bool {
        (!self.allows_true || other.allows_true) && (!self.allows_false || other.allows_false)
    }

    pub fn intersect(&self, other: &BooleanDomain) -> Option<BooleanDomain> {
        let result = BooleanDomain {
            allows_true: self.allows_true && other.allows_true,
            allows_false: self.allows_false && other.allows_false,
        };
        (!result.is_empty()).then_some(result)
    }
}

impl Default for BooleanDomain {
    fn default() -> Self {
        Self::full()
    }
}

impl fmt::Display for BooleanDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.values().iter().map(|v| v.to_string()).collect();
        write!(f, "{{{}}}", values.join(", "))
    }
}

/// The set of legal values for a parameter
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Domain {
    Numeric(NumericDomain),
    Categorical(CategoricalDomain),
    Boolean(BooleanDomain),
    /// Result of intersecting disjoint domains
    Empty,
}

impl Domain {
    /// Integer interval; `Empty` when no whole number lies inside
    pub fn integer(min: f64, max: f64) -> Self {
        Domain::numeric(NumericDomain::new(true, min, max))
    }

    pub fn real(min: f64, max: f64) -> Self {
        Domain::numeric(NumericDomain::new(false, min, max))
    }

    pub fn numeric(domain: NumericDomain) -> Self {
        if domain.is_empty() { Domain::Empty } else { Domain::Numeric(domain) }
    }

    pub fn categorical<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let domain = CategoricalDomain::new(values);
        if domain.is_empty() { Domain::Empty } else { Domain::Categorical(domain) }
    }

    pub fn boolean() -> Self {
        Domain::Boolean(BooleanDomain::full())
    }

    /// The point domain holding exactly `value`
    pub fn from_value(value: &ParameterValue) -> Self {
        match value {
            ParameterValue::Integer(v) => Domain::Numeric(NumericDomain::point(false, *v as f64)),
            ParameterValue::Real(v) => Domain::Numeric(NumericDomain::point(false, *v)),
            ParameterValue::Category(v) => Domain::Categorical(CategoricalDomain::singleton(v.clone())),
            ParameterValue::Boolean(v) => Domain::Boolean(BooleanDomain::only(*v)),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Domain::Numeric(d) => d.is_empty(),
            Domain::Categorical(d) => d.is_empty(),
            Domain::Boolean(d) => d.is_empty(),
            Domain::Empty => true,
        }
    }

    pub fn is_singleton(&self) -> bool {
        match self {
            Domain::Numeric(d) => d.is_singleton(),
            Domain::Categorical(d) => d.len() == 1,
            Domain::Boolean(d) => d.is_singleton(),
            Domain::Empty => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Domain::Numeric(_))
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, Domain::Categorical(_))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Domain::Boolean(_))
    }

    pub fn as_numeric(&self) -> Option<&NumericDomain> {
        match self {
            Domain::Numeric(d) => Some(d),
            _ => None,
        }
    }

    pub fn intersect(&self, other: &Domain) -> Domain {
        let result = match (self, other) {
            (Domain::Numeric(a), Domain::Numeric(b)) => a.intersect(b).map(Domain::Numeric),
            (Domain::Categorical(a), Domain::Categorical(b)) => a.intersect(b).map(Domain::Categorical),
            (Domain::Boolean(a), Domain::Boolean(b)) => a.intersect(b).map(Domain::Boolean),
            _ => None,
        };
        result.unwrap_or(Domain::Empty)
    }

    pub fn is_subset_of(&self, other: &Domain) -> bool {
        match (self, other) {
            (Domain::Empty, _) => true,
            (_, Domain::Empty) => self.is_empty(),
            (Domain::Numeric(a), Domain::Numeric(b)) => a.is_subset_of(b),
            (Domain::Categorical(a), Domain::Categorical(b)) => a.is_subset_of(b),
            (Domain::Boolean(a), Domain::Boolean(b)) => a.is_subset_of(b),
            _ => self.is_empty(),
        }
    }

    pub fn contains_value(&self, value: &ParameterValue) -> bool {
        match (self, value) {
            (Domain::Numeric(d), ParameterValue::Integer(v)) => d.contains(*v as f64),
            (Domain::Numeric(d), ParameterValue::Real(v)) => d.contains(*v),
            (Domain::Categorical(d), ParameterValue::Category(v)) => d.contains(v),
            (Domain::Boolean(d), ParameterValue::Boolean(v)) => d.allows(*v),
            _ => false,
        }
    }

    /// Narrows this domain to the single `value`, or `Empty` if it is not a member
    pub fn restrict_to(&self, value: &ParameterValue) -> Domain {
        self.intersect(&Domain::from_value(value))
    }

    /// The only member of a singleton domain
    pub fn singleton_value(&self) -> Option<ParameterValue> {
        if !self.is_singleton() {
            return None;
        }
        match self {
            Domain::Numeric(d) if d.is_integer() => Some(ParameterValue::Integer(d.min() as i64)),
            Domain::Numeric(d) => Some(ParameterValue::Real(d.min())),
            Domain::Categorical(d) => d.values().first().cloned().map(ParameterValue::Category),
            Domain::Boolean(d) => d.values().first().copied().map(ParameterValue::Boolean),
            Domain::Empty => None,
        }
    }

    /// Interprets `raw` as a member of this domain
    pub fn parse_value(&self, raw: &str) -> Result<ParameterValue, ValueError> {
        let raw = raw.trim();
        let value = match self {
            Domain::Numeric(d) => {
                let number: f64 = raw.parse().map_err(|_| ValueError::NotANumber { value: raw.to_string() })?;
                if d.is_integer() {
                    if number.fract() != 0.0 {
                        return Err(ValueError::NotAnInteger { value: raw.to_string() });
                    }
                    ParameterValue::Integer(number as i64)
                } else {
                    ParameterValue::Real(number)
                }
            }
            Domain::Categorical(_) => ParameterValue::Category(raw.to_string()),
            Domain::Boolean(_) => ParameterValue::Boolean(raw.parse().map_err(|_| ValueError::NotABoolean { value: raw.to_string() })?),
            Domain::Empty => ParameterValue::Category(raw.to_string()),
        };
        if !self.contains_value(&value) {
            return Err(ValueError::OutsideDomain {
                value: raw.to_string(),
                domain: self.to_string(),
            });
        }
        Ok(value)
    }
}

/// Every empty domain equals [`Domain::Empty`], whatever its variant
impl PartialEq for Domain {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Domain::Numeric(a), Domain::Numeric(b)) if !a.is_empty() && !b.is_empty() => a == b,
            (Domain::Categorical(a), Domain::Categorical(b)) if !a.is_empty() && !b.is_empty() => a == b,
            (Domain::Boolean(a), Domain::Boolean(b)) if !a.is_empty() && !b.is_empty() => a == b,
            _ => self.is_empty() && other.is_empty(),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Numeric(d) => write!(f, "{}", d),
            Domain::Categorical(d) => write!(f, "{}", d),
            Domain::Boolean(d) => write!(f, "{}", d),
            Domain::Empty => write!(f, "{{}}"),
        }
    }
}

/// Intersection of two domains; disjoint inputs give [`Domain::Empty`]
pub fn intersect(domain: &Domain, restriction: &Domain) -> Domain {
    domain.intersect(restriction)
}

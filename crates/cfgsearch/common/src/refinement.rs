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

//! Refinement of parameter domains into smaller sub-domains.
//!
//! Numeric intervals are cut into at most `splits` pieces per step, either on a
//! linear scale or geometrically concentrated around a focus point. Categorical
//! and boolean domains refine in a single step into their singleton values. A
//! domain whose refinement is empty is terminal.

use crate::domain::{BooleanDomain, CategoricalDomain, Domain, NumericDomain};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Geometric refinement parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogScale {
    /// Value the cuts concentrate around
    pub focus: f64,
    /// Growth rate of consecutive piece widths, strictly greater than 1
    pub basis: f64,
}

/// How a numeric domain is split at each refinement level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefinementPolicy {
    pub splits: usize,
    pub min_interval: f64,
    pub log_scale: Option<LogScale>,
    pub include_extremals: bool,
}

impl RefinementPolicy {
    pub fn linear(splits: usize, min_interval: f64) -> Self {
        Self {
            splits,
            min_interval,
            log_scale: None,
            include_extremals: false,
        }
    }

    pub fn logarithmic(splits: usize, min_interval: f64, focus: f64, basis: f64) -> Self {
        Self {
            splits,
            min_interval,
            log_scale: Some(LogScale { focus, basis }),
            include_extremals: false,
        }
    }

    pub fn with_extremals(mut self, include_extremals: bool) -> Self {
        self.include_extremals = include_extremals;
        self
    }

    /// Policy for every step after the first; extremal points are only offered once
    pub fn after_first_step(&self) -> Self {
        Self {
            include_extremals: false,
            ..*self
        }
    }

    fn effective_splits(&self) -> usize {
        self.splits.max(2)
    }
}

impl Default for RefinementPolicy {
    fn default() -> Self {
        Self::linear(2, 1.0)
    }
}

/// Whether `domain` has no further refinement under `policy`
pub fn is_terminal(domain: &Domain, policy: &RefinementPolicy) -> bool {
    match domain {
        Domain::Empty => true,
        Domain::Numeric(d) => d.is_empty() || d.is_singleton() || d.width() < policy.min_interval,
        Domain::Categorical(_) | Domain::Boolean(_) => domain.is_empty() || domain.is_singleton(),
    }
}

/// Next refinement level of `domain`, in ascending order for numeric domains
///
/// Terminal domains refine to an empty sequence. Every returned domain is a
/// strict subset of `domain` and together they cover it.
pub fn refine(domain: &Domain, policy: &RefinementPolicy) -> Vec<Domain> {
    if is_terminal(domain, policy) {
        return Vec::new();
    }
    match domain {
        Domain::Numeric(d) => refine_numeric(d, policy),
        Domain::Categorical(c) => c.values().iter().map(|v| Domain::Categorical(CategoricalDomain::singleton(v.clone()))).collect(),
        Domain::Boolean(b) => b.values().into_iter().map(|v| Domain::Boolean(BooleanDomain::only(v))).collect(),
        Domain::Empty => Vec::new(),
    }
}

fn refine_numeric(d: &NumericDomain, policy: &RefinementPolicy) -> Vec<Domain> {
    let splits = policy.effective_splits();
    if d.is_integer() && d.integer_count() <= splits as u64 {
        return integer_points(d);
    }

    let cuts = match policy.log_scale {
        Some(log) if log.basis > 1.0 => log_cuts(d.min(), d.max(), splits, log),
        _ => linear_cuts(d, splits, policy.min_interval),
    };
    let mut pieces = if d.is_integer() { integer_chunks(d, &cuts) } else { real_chunks(d, &cuts) };
    if pieces.len() < 2 {
        trace!(domain = %d, "Cuts collapsed, splitting at the midpoint");
        pieces = if d.is_integer() { integer_chunks(d, &[d.midpoint()]) } else { real_chunks(d, &[d.midpoint()]) };
    }

    if policy.include_extremals {
        let low = NumericDomain::point(d.is_integer(), d.min());
        let high = NumericDomain::point(d.is_integer(), d.max());
        if !pieces.contains(&low) {
            pieces.insert(0, low);
        }
        if !pieces.contains(&high) {
            pieces.push(high);
        }
    }
    pieces.into_iter().map(Domain::Numeric).collect()
}

fn integer_points(d: &NumericDomain) -> Vec<Domain> {
    let mut points = Vec::with_capacity(d.integer_count() as usize);
    let mut value = d.min();
    while value <= d.max() {
        points.push(Domain::Numeric(NumericDomain::point(true, value)));
        value += 1.0;
    }
    points
}

fn linear_cuts(d: &NumericDomain, splits: usize, min_interval: f64) -> Vec<f64> {
    let by_width = if min_interval > 0.0 { (d.width() / min_interval).ceil() as usize } else { splits };
    let pieces = by_width.min(splits).max(2);
    (1..pieces).map(|i| d.lerp(i as f64 / pieces as f64)).collect()
}

/// Cuts whose piece widths grow by `basis` moving away from the focus
fn log_cuts(min: f64, max: f64, pieces: usize, log: LogScale) -> Vec<f64> {
    let width = max - min;
    if log.focus <= min || log.focus >= max {
        let mut offsets = geometric_offsets(width, pieces, log.basis);
        if log.focus >= max {
            offsets = offsets.into_iter().rev().map(|o| width - o).collect();
        }
        return offsets.into_iter().map(|o| min + o).collect();
    }

    let left = ((pieces as f64 * (log.focus - min) / width).floor() as usize).clamp(1, pieces - 1);
    let right = pieces - left;
    let mut cuts: Vec<f64> = geometric_offsets(log.focus - min, left, log.basis).into_iter().rev().map(|o| log.focus - o).collect();
    cuts.push(log.focus);
    cuts.extend(geometric_offsets(max - log.focus, right, log.basis).into_iter().map(|o| log.focus + o));
    cuts
}

/// Interior offsets of `pieces` geometrically growing pieces filling `width`
fn geometric_offsets(width: f64, pieces: usize, basis: f64) -> Vec<f64> {
    if pieces < 2 {
        return Vec::new();
    }
    let shortest = width * (1.0 - basis) / (1.0 - basis.powi(pieces as i32));
    let mut offsets = Vec::with_capacity(pieces - 1);
    let mut end = 0.0;
    for i in 0..pieces - 1 {
        end += shortest * basis.powi(i as i32);
        offsets.push(end);
    }
    offsets
}

fn real_chunks(d: &NumericDomain, cuts: &[f64]) -> Vec<NumericDomain> {
    let mut chunks = Vec::with_capacity(cuts.len() + 1);
    let mut low = d.min();
    for &cut in cuts {
        if cut > low && cut < d.max() {
            chunks.push(NumericDomain::new(false, low, cut));
            low = cut;
        }
    }
    chunks.push(NumericDomain::new(false, low, d.max()));
    chunks
}

/// Disjoint integer chunks; each cut closes a chunk at its floor
fn integer_chunks(d: &NumericDomain, cuts: &[f64]) -> Vec<NumericDomain> {
    let mut chunks = Vec::with_capacity(cuts.len() + 1);
    let mut low = d.min();
    for &cut in cuts {
        let high = cut.floor();
        if high >= low && high < d.max() {
            chunks.push(NumericDomain::new(true, low, high));
            low = high + 1.0;
        }
    }
    chunks.push(NumericDomain::new(true, low, d.max()));
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(domains: &[Domain]) -> Vec<(f64, f64)> {
        domains
            .iter()
            .filter_map(|d| d.as_numeric())
            .map(|d| (d.min(), d.max()))
            .collect()
    }

    #[test]
    fn test_integer_linear_refinement() {
        let policy = RefinementPolicy::linear(2, 1.0);
        let level = refine(&Domain::integer(0.0, 10.0), &policy);
        assert_eq!(bounds(&level), vec![(0.0, 5.0), (6.0, 10.0)]);
        let level = refine(&level[0], &policy);
        assert_eq!(bounds(&level), vec![(0.0, 2.0), (3.0, 5.0)]);
        let level = refine(&level[0], &policy);
        assert_eq!(bounds(&level), vec![(0.0, 1.0), (2.0, 2.0)]);
        let level = refine(&level[0], &policy);
        assert_eq!(bounds(&level), vec![(0.0, 0.0), (1.0, 1.0)]);
    }

    #[test]
    fn test_small_integer_domain_enumerates_points() {
        let policy = RefinementPolicy::linear(4, 1.0);
        let level = refine(&Domain::integer(3.0, 6.0), &policy);
        assert_eq!(bounds(&level), vec![(3.0, 3.0), (4.0, 4.0), (5.0, 5.0), (6.0, 6.0)]);
    }

    #[test]
    fn test_real_linear_refinement() {
        let policy = RefinementPolicy::linear(4, 0.1);
        let level = refine(&Domain::real(0.0, 1.0), &policy);
        assert_eq!(bounds(&level), vec![(0.0, 0.25), (0.25, 0.5), (0.5, 0.75), (0.75, 1.0)]);
    }

    #[test]
    fn test_min_interval_limits_pieces() {
        let policy = RefinementPolicy::linear(10, 0.5);
        let level = refine(&Domain::real(0.0, 1.0), &policy);
        assert_eq!(level.len(), 2);
    }

    #[test]
    fn test_overflowing_width_still_splits() {
        let domain = Domain::real(-1e308, 1e308);
        for policy in [RefinementPolicy::linear(4, 1.0), RefinementPolicy::logarithmic(4, 1.0, 0.0, 2.0)] {
            let level = refine(&domain, &policy);
            assert!(level.len() >= 2);
            for piece in &level {
                assert!(piece.is_subset_of(&domain));
                assert_ne!(piece, &domain);
                let numeric = piece.as_numeric().unwrap();
                assert!(numeric.min().is_finite() && numeric.max().is_finite());
            }
        }
        let halves = refine(&domain, &RefinementPolicy::linear(2, 1.0));
        assert_eq!(bounds(&halves), vec![(-1e308, 0.0), (0.0, 1e308)]);
    }

    #[test]
    fn test_narrow_domain_is_terminal() {
        let policy = RefinementPolicy::linear(2, 1.0);
        let domain = Domain::real(0.0, 0.5);
        assert!(is_terminal(&domain, &policy));
        assert!(refine(&domain, &policy).is_empty());
        assert!(refine(&Domain::integer(4.0, 4.0), &policy).is_empty());
        assert!(refine(&Domain::Empty, &policy).is_empty());
    }

    #[test]
    fn test_extremals_are_offered() {
        let policy = RefinementPolicy::linear(2, 0.1).with_extremals(true);
        let level = refine(&Domain::real(0.0, 1.0), &policy);
        assert_eq!(bounds(&level), vec![(0.0, 0.0), (0.0, 0.5), (0.5, 1.0), (1.0, 1.0)]);
        let again = refine(&level[1], &policy.after_first_step());
        assert_eq!(bounds(&again), vec![(0.0, 0.25), (0.25, 0.5)]);
    }

    #[test]
    fn test_log_refinement_concentrates_at_focus() {
        let policy = RefinementPolicy::logarithmic(3, 0.01, 0.0, 2.0);
        let level = refine(&Domain::real(0.0, 7.0), &policy);
        assert_eq!(bounds(&level), vec![(0.0, 1.0), (1.0, 3.0), (3.0, 7.0)]);

        let policy = RefinementPolicy::logarithmic(3, 0.01, 7.0, 2.0);
        let level = refine(&Domain::real(0.0, 7.0), &policy);
        assert_eq!(bounds(&level), vec![(0.0, 4.0), (4.0, 6.0), (6.0, 7.0)]);
    }

    #[test]
    fn test_log_refinement_with_inner_focus() {
        let policy = RefinementPolicy::logarithmic(4, 0.01, 5.0, 2.0);
        let level = refine(&Domain::real(0.0, 10.0), &policy);
        let cuts = bounds(&level);
        assert_eq!(cuts.first().map(|c| c.0), Some(0.0));
        assert_eq!(cuts.last().map(|c| c.1), Some(10.0));
        assert!(cuts.iter().any(|c| c.1 == 5.0));
        for window in cuts.windows(2) {
            assert_eq!(window[0].1, window[1].0);
        }
    }

    #[test]
    fn test_categorical_and_boolean_refine_to_singletons() {
        let policy = RefinementPolicy::default();
        let level = refine(&Domain::categorical(["a", "b", "c"]), &policy);
        assert_eq!(level, vec![Domain::categorical(["a"]), Domain::categorical(["b"]), Domain::categorical(["c"])]);
        let level = refine(&Domain::boolean(), &policy);
        assert_eq!(level, vec![Domain::Boolean(BooleanDomain::only(true)), Domain::Boolean(BooleanDomain::only(false))]);
        assert!(refine(&level[0], &policy).is_empty());
    }
}

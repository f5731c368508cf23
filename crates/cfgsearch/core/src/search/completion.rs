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

use crate::resolution::{CompletionError, CompletionPicker, Resolver, SearchNode};
use cfgsearch_common::{Component, ComponentInstance, Domain, Parameter, ParameterValue};
use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::trace;

/// Draws a value uniformly from `domain`
pub fn sample_value<R: Rng + ?Sized>(rng: &mut R, domain: &Domain) -> Option<ParameterValue> {
    match domain {
        Domain::Numeric(numeric) if numeric.is_empty() => None,
        Domain::Numeric(numeric) if numeric.is_integer() => {
            let low = numeric.min() as i64;
            let high = numeric.max() as i64;
            Some(ParameterValue::Integer(rng.gen_range(low..=high)))
        }
        Domain::Numeric(numeric) if numeric.is_singleton() => Some(ParameterValue::Real(numeric.min())),
        Domain::Numeric(numeric) if numeric.width().is_finite() => Some(ParameterValue::Real(rng.gen_range(numeric.min()..=numeric.max()))),
        // the width overflows, so draw a fraction of it instead
        Domain::Numeric(numeric) => Some(ParameterValue::Real(numeric.lerp(rng.gen_range(0.0..=1.0)))),
        Domain::Categorical(categories) => categories.values().choose(rng).cloned().map(ParameterValue::Category),
        Domain::Boolean(booleans) => booleans.values().choose(rng).copied().map(ParameterValue::Boolean),
        Domain::Empty => None,
    }
}

/// Uniform random choices for a single completion
pub struct RandomPicker<'r, R: Rng + ?Sized> {
    rng: &'r mut R,
}

impl<'r, R: Rng + ?Sized> RandomPicker<'r, R> {
    pub fn new(rng: &'r mut R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + ?Sized> CompletionPicker for RandomPicker<'_, R> {
    fn pick_value(&mut self, _parameter: &Parameter, domain: &Domain) -> Option<ParameterValue> {
        sample_value(&mut *self.rng, domain)
    }

    fn pick_provider(&mut self, _interface: &str, candidates: &[Arc<Component>]) -> Option<Arc<Component>> {
        candidates.choose(&mut *self.rng).cloned()
    }
}

/// Completes partial nodes at random, retrying infeasible draws
#[derive(Debug, Clone)]
pub struct RandomCompleter {
    resolver: Resolver,
    max_attempts: usize,
    max_depth: usize,
}

impl RandomCompleter {
    pub fn new(resolver: Resolver, max_attempts: usize, max_depth: usize) -> Self {
        Self {
            resolver,
            max_attempts: max_attempts.max(1),
            max_depth,
        }
    }

    /// A random dependency-satisfying instance under `node`
    pub fn complete<R: Rng + ?Sized>(&self, node: &SearchNode, rng: &mut R) -> Result<ComponentInstance, CompletionError> {
        let mut attempt = 1;
        loop {
            let mut picker = RandomPicker::new(&mut *rng);
            match self.resolver.complete(node, &mut picker, self.max_depth) {
                Ok(instance) => return Ok(instance),
                Err(error) if attempt >= self.max_attempts => return Err(error),
                Err(error) => {
                    trace!(attempt, %error, "Random completion failed, retrying");
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Repository;
    use cfgsearch_common::Dependency;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_sample_value_stays_in_domain() {
        let mut rng = StdRng::seed_from_u64(7);
        let domains = [Domain::integer(-3.0, 4.0), Domain::real(0.5, 0.75), Domain::categorical(["a", "b", "c"]), Domain::boolean(), Domain::real(2.0, 2.0), Domain::real(-1e308, 1e308)];
        for domain in &domains {
            for _ in 0..50 {
                let value = sample_value(&mut rng, domain).unwrap();
                assert!(domain.contains_value(&value), "{} not in {}", value, domain);
            }
        }
        assert_eq!(sample_value(&mut rng, &Domain::Empty), None);
    }

    #[test]
    fn test_random_completion_satisfies_dependencies() {
        let flag = Parameter::new("flag", Domain::boolean(), ParameterValue::Boolean(false));
        let depth = Parameter::new("depth", Domain::integer(0.0, 10.0), ParameterValue::Integer(0));
        let dependency = Dependency::new(
            vec![vec![cfgsearch_common::Literal::new("flag", Domain::from_value(&ParameterValue::Boolean(true)))]],
            vec![cfgsearch_common::Literal::new("depth", Domain::integer(0.0, 2.0))],
        );
        let component = Component::new("tree").with_provided_interface("Model").with_parameter(flag).with_parameter(depth).with_dependency(dependency);
        let repository = Arc::new(Repository::from_components([component]).unwrap());
        let resolver = Resolver::new(Arc::clone(&repository));
        let node = resolver.roots("Model").unwrap().children.remove(0);
        let completer = RandomCompleter::new(resolver.clone(), 5, 8);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..40 {
            let instance = completer.complete(&node, &mut rng).unwrap();
            assert!(resolver.evaluator().is_valid_instance(&instance));
        }
    }
}

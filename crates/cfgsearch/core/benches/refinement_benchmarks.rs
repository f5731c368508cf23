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


//! Benchmarks for domain refinement, propagation and tree enumeration

use cfgsearch_core::model::{Component, Dependency, Domain, Literal, Parameter, ParameterValue, RefinementPolicy, refine};
use cfgsearch_core::{DependencyEvaluator, DomainOverrides, Repository, resolve};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;

fn bench_refinement(c: &mut Criterion) {
    let mut group = c.benchmark_group("refinement");

    let real = Domain::real(0.0, 1000.0);
    let integer = Domain::integer(0.0, 100_000.0);
    for splits in [2usize, 8, 32] {
        let linear = RefinementPolicy::linear(splits, 0.5);
        group.bench_with_input(BenchmarkId::new("linear_real", splits), &linear, |b, policy| b.iter(|| refine(black_box(&real), policy)));
        group.bench_with_input(BenchmarkId::new("linear_integer", splits), &linear, |b, policy| b.iter(|| refine(black_box(&integer), policy)));
        let log = RefinementPolicy::logarithmic(splits, 0.5, 1.0, 2.0);
        group.bench_with_input(BenchmarkId::new("log_real", splits), &log, |b, policy| b.iter(|| refine(black_box(&real), policy)));
    }

    group.finish();
}

fn chained_component(length: usize) -> Component {
    let mut component = Component::new("chain").with_provided_interface("I");
    for i in 0..length {
        component = component.with_parameter(Parameter::new(format!("p{i}"), Domain::integer(0.0, 100.0), ParameterValue::Integer(0)));
    }
    // p0 small forces p1 small, which forces p2 small, ...
    for i in 0..length.saturating_sub(1) {
        component = component.with_dependency(Dependency::new(
            vec![vec![Literal::new(format!("p{i}"), Domain::integer(0.0, 10.0))]],
            vec![Literal::new(format!("p{}", i + 1), Domain::integer(0.0, 10.0))],
        ));
    }
    component
}

fn bench_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation");
    let evaluator = DependencyEvaluator::new();

    for length in [4usize, 16, 64] {
        let component = chained_component(length);
        let mut domains = evaluator.initial_domains(&component);
        domains.insert("p0".to_string(), Domain::integer(0.0, 5.0));
        group.bench_with_input(BenchmarkId::new("chain", length), &domains, |b, domains| b.iter(|| evaluator.propagate(&component, black_box(domains))));
    }

    group.finish();
}

fn bench_enumeration(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumeration");
    group.sample_size(20);

    let component = Component::new("model")
        .with_provided_interface("model")
        .with_parameter(Parameter::new("depth", Domain::integer(1.0, 64.0), ParameterValue::Integer(4)))
        .with_parameter(Parameter::new("rate", Domain::real(0.0, 1.0), ParameterValue::Real(0.1)).with_refinement(RefinementPolicy::linear(2, 0.1)));
    let repository = Arc::new(Repository::from_components([component]).unwrap());

    group.bench_function("terminal_nodes", |b| b.iter(|| resolve(Arc::clone(&repository), "model", DomainOverrides::new()).unwrap().terminals().count()));

    group.finish();
}

criterion_group!(benches, bench_refinement, bench_propagation, bench_enumeration);
criterion_main!(benches);

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


//! Integration tests for loading declaration files from disk

use cfgsearch_core::model::Domain;
use cfgsearch_core::{LoadError, LoaderConfig, RepositoryLoader, load};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_includes_are_followed_relative_to_the_including_file() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("models")).unwrap();
    write(
        &dir.path().join("models"),
        "tree.json",
        r#"{ "components": [{ "name": "tree", "providedInterface": ["classifier"],
              "parameter": [{ "name": "depth", "type": "int", "default": 3, "min": 1, "max": 20, "refineSplits": 4, "minInterval": 1 }] }] }"#,
    );
    write(
        dir.path(),
        "main.json",
        r#"{ "include": ["models/tree.json"],
             "components": [{ "name": "pipeline", "providedInterface": ["pipeline"], "requiredInterface": [{ "id": "model", "name": "classifier" }] }] }"#,
    );

    let repository = load(dir.path().join("main.json")).unwrap();
    assert_eq!(repository.len(), 2, "included component should be loaded");
    assert_eq!(repository.component("tree").unwrap().parameter("depth").unwrap().domain(), &Domain::integer(1.0, 20.0));
    assert!(cfgsearch_core::get_unresolvable_required_interfaces(&repository).is_empty());
}

#[test]
fn test_diamond_include_parses_shared_file_once() {
    let dir = tempdir().unwrap();
    write(dir.path(), "base.json", r#"{ "components": [{ "name": "rbf", "providedInterface": ["kernel"] }] }"#);
    write(dir.path(), "left.json", r#"{ "include": ["base.json"], "components": [{ "name": "svm", "providedInterface": ["classifier"], "requiredInterface": [{ "id": "k", "name": "kernel" }] }] }"#);
    write(dir.path(), "right.json", r#"{ "include": ["base.json"], "components": [{ "name": "gp", "providedInterface": ["regressor"], "requiredInterface": [{ "id": "k", "name": "kernel" }] }] }"#);
    write(dir.path(), "root.json", r#"{ "include": ["left.json", "right.json"] }"#);

    let repository = load(dir.path().join("root.json")).expect("a diamond must not produce duplicate components");
    assert_eq!(repository.len(), 3);
    assert_eq!(repository.providers_of("kernel").len(), 1);
}

#[test]
fn test_include_cycle_terminates() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.json", r#"{ "include": ["b.json"], "components": [{ "name": "a", "providedInterface": ["A"] }] }"#);
    write(dir.path(), "b.json", r#"{ "include": ["a.json"], "components": [{ "name": "b", "providedInterface": ["B"] }] }"#);

    let repository = load(dir.path().join("a.json")).unwrap();
    let mut names: Vec<&str> = repository.components().iter().map(|c| c.name()).collect();
    names.sort();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_directory_include_reads_every_json_file() {
    let dir = tempdir().unwrap();
    let parts = dir.path().join("parts");
    fs::create_dir(&parts).unwrap();
    write(&parts, "one.json", r#"{ "components": [{ "name": "one", "providedInterface": ["I"] }] }"#);
    write(&parts, "two.json", r#"{ "components": [{ "name": "two", "providedInterface": ["I"] }] }"#);
    write(&parts, "notes.txt", "not a declaration");
    write(dir.path(), "main.json", r#"{ "include": ["parts"] }"#);

    let repository = load(dir.path().join("main.json")).unwrap();
    assert_eq!(repository.providers_of("I").len(), 2);

    let direct = load(&parts).unwrap();
    assert_eq!(direct.len(), 2, "a directory root loads like an include");
}

#[test]
fn test_later_template_overrides_earlier_one() {
    let dir = tempdir().unwrap();
    write(dir.path(), "shared.json", r#"{ "parameters": [{ "name": "C", "type": "double", "min": 0, "max": 10, "refineSplits": 2, "minInterval": 1 }] }"#);
    write(
        dir.path(),
        "main.json",
        r#"{
            /* narrows the shared template */
            "include": ["shared.json"],
            "parameters": [{ "name": "C", "type": "double", "min": 0, "max": 5, "refineSplits": 2, "minInterval": 1 }],
            "components": [{ "name": "svm", "providedInterface": ["classifier"], "parameter": [{ "name": "C", "default": 1 }] }]
        }"#,
    );

    let repository = load(dir.path().join("main.json")).unwrap();
    let c = repository.component("svm").unwrap().parameter("C").unwrap().clone();
    assert_eq!(c.domain(), &Domain::real(0.0, 5.0));
}

#[test]
fn test_missing_include_is_reported() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.json", r#"{ "include": ["absent.json"] }"#);

    match load(dir.path().join("main.json")) {
        Err(LoadError::MissingInclude { include, .. }) => assert_eq!(include, "absent.json"),
        other => panic!("expected a missing include error, got {other:?}"),
    }
}

#[test]
fn test_missing_refinement_field_names_the_parameter() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "bad.json",
        r#"{ "components": [{ "name": "tree", "parameter": [{ "name": "depth", "type": "int", "default": 3, "min": 1, "max": 20, "refineSplits": 4 }] }] }"#,
    );

    let error = load(dir.path().join("bad.json")).unwrap_err();
    let message = error.to_string();
    assert!(matches!(error, LoadError::MissingRefinementField { field: "minInterval", .. }));
    assert!(message.contains("tree") && message.contains("depth"), "error should identify the parameter: {message}");
}

#[test]
fn test_failed_load_is_not_partially_applied() {
    let dir = tempdir().unwrap();
    write(dir.path(), "good.json", r#"{ "components": [{ "name": "a", "providedInterface": ["A"] }] }"#);
    write(dir.path(), "main.json", r#"{ "include": ["good.json"], "components": [{ "name": "a" }] }"#);

    assert!(matches!(load(dir.path().join("main.json")), Err(LoadError::DuplicateComponent { .. })));
}

#[test]
fn test_strict_loader_rejects_unresolvable_repository() {
    let dir = tempdir().unwrap();
    write(dir.path(), "main.json", r#"{ "components": [{ "name": "b", "providedInterface": ["Z"], "requiredInterface": [{ "id": "y", "name": "Y" }] }] }"#);

    let loader = RepositoryLoader::new(LoaderConfig::default().with_resolvability_check(true));
    assert!(matches!(loader.load(dir.path().join("main.json")), Err(LoadError::UnresolvableRequiredInterfaces(_))));
    assert!(RepositoryLoader::default().load(dir.path().join("main.json")).is_ok());
}

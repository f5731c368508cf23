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

//! Loader for JSON component declaration files.
//!
//! A declaration unit holds `components`, shared parameter `parameters`
//! templates and `include` directives naming further files or directories.
//! Includes are resolved relative to the including file and de-duplicated by
//! canonical path, so include cycles and diamonds are read once.

use super::literal_parser::{LiteralError, parse_dependency};
use super::{LoadError, LoadResult, Repository};
use crate::config::LoaderConfig;
use cfgsearch_common::{Component, Dependency, Domain, Parameter, ParameterValue, RefinementPolicy};
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, instrument, warn};

/// JSON string literals or block comments; only the comments are stripped
static STRING_OR_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?s)("(?:[^"\\]|\\.)*")|/\*.*?\*/"#).expect("comment pattern is valid"));
const INLINE_SOURCE: &str = "<string>";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeclarationUnit {
    include: Vec<String>,
    parameters: Vec<ParameterDecl>,
    components: Vec<ComponentDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComponentDecl {
    name: String,
    #[serde(default)]
    provided_interface: Vec<String>,
    #[serde(default)]
    required_interface: Vec<RequiredInterfaceDecl>,
    #[serde(default)]
    parameter: Vec<ParameterDecl>,
    #[serde(default)]
    dependencies: Vec<DependencyDecl>,
}

#[derive(Debug, Deserialize)]
struct RequiredInterfaceDecl {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DependencyDecl {
    pre: String,
    post: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ValuesDecl {
    List(Vec<Value>),
    Text(String),
}

impl ValuesDecl {
    fn to_strings(&self) -> Vec<String> {
        match self {
            ValuesDecl::List(values) => values.iter().map(value_text).collect(),
            ValuesDecl::Text(text) => text.split(',').map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect(),
        }
    }
}

/// A parameter as written; every field may come from a shared template
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParameterDecl {
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    default: Option<Value>,
    min: Option<f64>,
    max: Option<f64>,
    values: Option<ValuesDecl>,
    refine_splits: Option<f64>,
    min_interval: Option<f64>,
    focus: Option<f64>,
    basis: Option<f64>,
    include_extremals: Option<bool>,
}

impl ParameterDecl {
    /// Fills every field left unset from `template`
    fn merged_with(self, template: &ParameterDecl) -> ParameterDecl {
        ParameterDecl {
            name: self.name,
            kind: self.kind.or_else(|| template.kind.clone()),
            default: self.default.or_else(|| template.default.clone()),
            min: self.min.or(template.min),
            max: self.max.or(template.max),
            values: self.values.or_else(|| template.values.clone()),
            refine_splits: self.refine_splits.or(template.refine_splits),
            min_interval: self.min_interval.or(template.min_interval),
            focus: self.focus.or(template.focus),
            basis: self.basis.or(template.basis),
            include_extremals: self.include_extremals.or(template.include_extremals),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A parsed unit together with the file it came from
struct SourceUnit {
    file: String,
    unit: DeclarationUnit,
}

/// Context for errors about one parameter
struct ParameterSite<'a> {
    file: &'a str,
    component: &'a str,
    parameter: &'a str,
}

impl ParameterSite<'_> {
    fn missing(&self, field: &'static str) -> LoadError {
        LoadError::MissingField {
            file: self.file.to_string(),
            component: self.component.to_string(),
            parameter: self.parameter.to_string(),
            field,
        }
    }

    fn missing_refinement(&self, field: &'static str) -> LoadError {
        LoadError::MissingRefinementField {
            file: self.file.to_string(),
            component: self.component.to_string(),
            parameter: self.parameter.to_string(),
            field,
        }
    }

    fn invalid_refinement(&self, field: &'static str, reason: impl Into<String>) -> LoadError {
        LoadError::InvalidRefinementField {
            file: self.file.to_string(),
            component: self.component.to_string(),
            parameter: self.parameter.to_string(),
            field,
            reason: reason.into(),
        }
    }

    fn invalid_domain(&self, reason: impl Into<String>) -> LoadError {
        LoadError::InvalidDomain {
            file: self.file.to_string(),
            component: self.component.to_string(),
            parameter: self.parameter.to_string(),
            reason: reason.into(),
        }
    }

    fn invalid_default(&self, reason: impl Into<String>) -> LoadError {
        LoadError::InvalidDefault {
            file: self.file.to_string(),
            component: self.component.to_string(),
            parameter: self.parameter.to_string(),
            reason: reason.into(),
        }
    }
}

/// Reads declaration files into a [`Repository`]
#[derive(Debug, Clone)]
pub struct RepositoryLoader {
    config: LoaderConfig,
}

impl Default for RepositoryLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl RepositoryLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Loads `root` (a file or a directory of `*.json` files) and everything it includes
    #[instrument(skip(self, root), fields(path = %root.as_ref().display()))]
    pub fn load(&self, root: impl AsRef<Path>) -> LoadResult<Repository> {
        let mut visited = HashSet::new();
        let mut units = Vec::new();
        self.collect(root.as_ref(), &mut visited, &mut units)?;
        self.build(units)
    }

    /// Loads a declaration held in memory; includes resolve against the working directory
    pub fn load_str(&self, json: &str) -> LoadResult<Repository> {
        let unit = self.parse_unit(INLINE_SOURCE, json)?;
        let base = std::env::current_dir().map_err(|source| LoadError::Io { path: PathBuf::from("."), source })?;
        let mut visited = HashSet::new();
        let mut units = Vec::new();
        self.collect_includes(INLINE_SOURCE, &base, &unit.include, &mut visited, &mut units)?;
        units.push(SourceUnit {
            file: INLINE_SOURCE.to_string(),
            unit,
        });
        self.build(units)
    }

    fn collect(&self, path: &Path, visited: &mut HashSet<PathBuf>, units: &mut Vec<SourceUnit>) -> LoadResult<()> {
        let canonical = path.canonicalize().map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
        if !visited.insert(canonical.clone()) {
            debug!(path = %canonical.display(), "Skipping already parsed declaration");
            return Ok(());
        }

        if canonical.is_dir() {
            let entries = fs::read_dir(&canonical).map_err(|source| LoadError::Io { path: canonical.clone(), source })?;
            let mut files = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|source| LoadError::Io { path: canonical.clone(), source })?;
                let file = entry.path();
                if file.is_file() && file.extension().is_some_and(|e| e == "json") {
                    files.push(file);
                }
            }
            files.sort();
            for file in files {
                self.collect(&file, visited, units)?;
            }
            return Ok(());
        }

        let text = fs::read_to_string(&canonical).map_err(|source| LoadError::Io { path: canonical.clone(), source })?;
        let file = canonical.display().to_string();
        let unit = self.parse_unit(&file, &text)?;
        let base = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
        self.collect_includes(&file, &base, &unit.include, visited, units)?;
        debug!(file = %file, components = unit.components.len(), templates = unit.parameters.len(), "Parsed declaration unit");
        units.push(SourceUnit { file, unit });
        Ok(())
    }

    fn collect_includes(&self, file: &str, base: &Path, includes: &[String], visited: &mut HashSet<PathBuf>, units: &mut Vec<SourceUnit>) -> LoadResult<()> {
        for include in includes {
            let target = base.join(include);
            if !target.exists() {
                return Err(LoadError::MissingInclude {
                    file: file.to_string(),
                    include: include.clone(),
                });
            }
            self.collect(&target, visited, units)?;
        }
        Ok(())
    }

    fn parse_unit(&self, file: &str, text: &str) -> LoadResult<DeclarationUnit> {
        let text = if self.config.strip_block_comments { strip_block_comments(text) } else { Cow::Borrowed(text) };
        serde_json::from_str(&text).map_err(|source| LoadError::Json { file: file.to_string(), source })
    }

    fn build(&self, units: Vec<SourceUnit>) -> LoadResult<Repository> {
        let mut templates: HashMap<String, ParameterDecl> = HashMap::new();
        for source in &units {
            for template in &source.unit.parameters {
                templates.insert(template.name.clone(), template.clone());
            }
        }

        let mut names = HashSet::new();
        let mut components = Vec::new();
        for source in units {
            for decl in source.unit.components {
                if !names.insert(decl.name.clone()) {
                    return Err(LoadError::DuplicateComponent {
                        file: source.file.clone(),
                        component: decl.name,
                    });
                }
                components.push(build_component(&source.file, decl, &templates)?);
            }
        }

        let repository = Repository::from_components(components)?;
        let unresolvable = repository.unresolvable_required_interfaces();
        if !unresolvable.is_empty() {
            if self.config.check_required_interfaces_resolvable {
                return Err(LoadError::UnresolvableRequiredInterfaces(unresolvable));
            }
            warn!(?unresolvable, "Repository has required interfaces without providers");
        }
        info!(components = repository.len(), templates = templates.len(), "Loaded component repository");
        Ok(repository)
    }
}

fn build_component(file: &str, decl: ComponentDecl, templates: &HashMap<String, ParameterDecl>) -> LoadResult<Component> {
    let mut component = Component::new(decl.name.clone());
    for interface in &decl.provided_interface {
        component = component.with_provided_interface(interface.clone());
    }

    let mut ids = HashSet::new();
    for required in decl.required_interface {
        if !ids.insert(required.id.clone()) {
            return Err(LoadError::DuplicateRequiredInterfaceId {
                file: file.to_string(),
                component: decl.name.clone(),
                id: required.id,
            });
        }
        component = component.with_required_interface(required.id, required.name);
    }

    let mut parameter_names = HashSet::new();
    for parameter in decl.parameter {
        if !parameter_names.insert(parameter.name.clone()) {
            return Err(LoadError::DuplicateParameter {
                file: file.to_string(),
                component: decl.name.clone(),
                parameter: parameter.name,
            });
        }
        let parameter = match templates.get(&parameter.name) {
            Some(template) => parameter.merged_with(template),
            None => parameter,
        };
        component = component.with_parameter(build_parameter(file, &decl.name, parameter)?);
    }

    let mut dependencies: Vec<Dependency> = Vec::with_capacity(decl.dependencies.len());
    for dependency in &decl.dependencies {
        let parsed = parse_dependency(&component, &dependency.pre, &dependency.post).map_err(|error| {
            let text = format!("{} -> {}", dependency.pre, dependency.post);
            match error {
                LiteralError::UnknownParameter(parameter) => LoadError::UnknownParameter {
                    file: file.to_string(),
                    component: decl.name.clone(),
                    dependency: text,
                    parameter,
                },
                other => LoadError::InvalidDependency {
                    file: file.to_string(),
                    component: decl.name.clone(),
                    dependency: text,
                    reason: other.to_string(),
                },
            }
        })?;
        dependencies.push(parsed);
    }
    Ok(dependencies.into_iter().fold(component, Component::with_dependency))
}

fn build_parameter(file: &str, component: &str, decl: ParameterDecl) -> LoadResult<Parameter> {
    let site = ParameterSite {
        file,
        component,
        parameter: &decl.name,
    };
    let kind = decl.kind.as_deref().ok_or_else(|| site.missing("type"))?;

    let (domain, refinement) = match kind {
        "int" | "int-log" | "double" | "double-log" => {
            let is_integer = kind.starts_with("int");
            let min = decl.min.ok_or_else(|| site.missing("min"))?;
            let max = decl.max.ok_or_else(|| site.missing("max"))?;
            if min > max {
                return Err(site.invalid_domain(format!("min {} exceeds max {}", min, max)));
            }
            if !(max - min).is_finite() {
                return Err(site.invalid_domain(format!("width of [{}, {}] is not finite", min, max)));
            }
            let domain = Domain::Numeric(cfgsearch_common::NumericDomain::new(is_integer, min, max));
            if domain.is_empty() {
                return Err(site.invalid_domain(format!("[{}, {}] contains no integer", min, max)));
            }
            (domain, Some(refinement_policy(&site, &decl, kind.ends_with("-log"))?))
        }
        "bool" | "boolean" => (Domain::boolean(), None),
        "cat" => {
            let values = decl.values.as_ref().ok_or_else(|| site.missing("values"))?.to_strings();
            if values.is_empty() {
                return Err(site.invalid_domain("categorical parameter without values"));
            }
            (Domain::categorical(values), None)
        }
        other => {
            return Err(LoadError::UnsupportedParameterType {
                file: file.to_string(),
                component: component.to_string(),
                parameter: decl.name.clone(),
                kind: other.to_string(),
            });
        }
    };

    let raw_default = decl.default.as_ref().ok_or_else(|| site.missing("default"))?;
    let default = parse_default(&site, &domain, raw_default)?;
    let parameter = Parameter::new(decl.name.clone(), domain, default);
    Ok(match refinement {
        Some(policy) => parameter.with_refinement(policy),
        None => parameter,
    })
}

fn refinement_policy(site: &ParameterSite<'_>, decl: &ParameterDecl, logarithmic: bool) -> LoadResult<RefinementPolicy> {
    let splits = decl.refine_splits.ok_or_else(|| site.missing_refinement("refineSplits"))?;
    if splits < 1.0 || splits.fract() != 0.0 {
        return Err(site.invalid_refinement("refineSplits", format!("{} is not a positive whole number", splits)));
    }
    let min_interval = decl.min_interval.ok_or_else(|| site.missing_refinement("minInterval"))?;
    if min_interval <= 0.0 {
        return Err(site.invalid_refinement("minInterval", format!("{} is not strictly positive", min_interval)));
    }

    let policy = if logarithmic {
        let focus = decl.focus.ok_or_else(|| site.missing_refinement("focus"))?;
        let basis = decl.basis.ok_or_else(|| site.missing_refinement("basis"))?;
        if basis <= 1.0 {
            return Err(site.invalid_refinement("basis", format!("{} is not greater than 1", basis)));
        }
        RefinementPolicy::logarithmic(splits as usize, min_interval, focus, basis)
    } else {
        RefinementPolicy::linear(splits as usize, min_interval)
    };
    Ok(policy.with_extremals(decl.include_extremals.unwrap_or(false)))
}

fn parse_default(site: &ParameterSite<'_>, domain: &Domain, raw: &Value) -> LoadResult<ParameterValue> {
    let text = match (domain, raw) {
        (Domain::Boolean(_), Value::Bool(b)) => b.to_string(),
        (Domain::Numeric(_), Value::Number(n)) => n.to_string(),
        (_, Value::String(s)) => s.clone(),
        (_, other) => other.to_string(),
    };
    domain.parse_value(&text).map_err(|error| site.invalid_default(error.to_string()))
}

fn strip_block_comments(text: &str) -> Cow<'_, str> {
    STRING_OR_COMMENT.replace_all(text, |caps: &Captures<'_>| caps.get(1).map_or(String::new(), |string| string.as_str().to_string()))
}

/// Loads a repository from `root` with the default loader configuration
pub fn load(root: impl AsRef<Path>) -> LoadResult<Repository> {
    RepositoryLoader::default().load(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVM: &str = r#"{
        /* shared parameter settings */
        "parameters": [
            { "name": "C", "type": "double", "min": 0.01, "max": 100, "refineSplits": 4, "minInterval": 0.5 }
        ],
        "components": [
            {
                "name": "svm",
                "providedInterface": ["classifier"],
                "requiredInterface": [{ "id": "kernel", "name": "kernel-fn" }],
                "parameter": [
                    { "name": "C", "default": 1.0, "max": 10 },
                    { "name": "degree", "type": "int", "default": 3, "min": 1, "max": 5, "refineSplits": 2, "minInterval": 1 },
                    { "name": "shrinking", "type": "boolean", "default": true },
                    { "name": "solver", "type": "cat", "default": "b", "values": "a, b, c" }
                ],
                "dependencies": [{ "pre": "shrinking = false", "post": "degree in [1, 2]" }]
            },
            { "name": "rbf", "providedInterface": ["kernel-fn"] }
        ]
    }"#;

    #[test]
    fn test_load_from_string() {
        let repository = RepositoryLoader::default().load_str(SVM).unwrap();
        assert_eq!(repository.len(), 2);
        let svm = repository.component("svm").unwrap();
        let c = svm.parameter("C").unwrap();
        assert_eq!(c.domain(), &Domain::real(0.01, 10.0));
        assert_eq!(c.refinement(), RefinementPolicy::linear(4, 0.5));
        assert_eq!(svm.parameter("solver").unwrap().domain(), &Domain::categorical(["a", "b", "c"]));
        assert_eq!(svm.parameter("degree").unwrap().default_value(), &ParameterValue::Integer(3));
        assert_eq!(svm.dependencies().len(), 1);
    }

    #[test]
    fn test_missing_refinement_field() {
        let json = r#"{"components": [{"name": "a", "parameter": [{"name": "p", "type": "int", "default": 1, "min": 0, "max": 5, "minInterval": 1}]}]}"#;
        let error = RepositoryLoader::default().load_str(json).unwrap_err();
        assert!(matches!(error, LoadError::MissingRefinementField { ref component, ref parameter, field: "refineSplits", .. } if component == "a" && parameter == "p"));
    }

    #[test]
    fn test_log_parameter_needs_basis_above_one() {
        let json = r#"{"components": [{"name": "a", "parameter": [{"name": "p", "type": "double-log", "default": 1, "min": 0.001, "max": 5, "refineSplits": 4, "minInterval": 0.1, "focus": 0.001, "basis": 1}]}]}"#;
        let error = RepositoryLoader::default().load_str(json).unwrap_err();
        assert!(matches!(error, LoadError::InvalidRefinementField { field: "basis", .. }));
    }

    #[test]
    fn test_invalid_declarations() {
        let loader = RepositoryLoader::default();
        let duplicate = r#"{"components": [{"name": "a"}, {"name": "a"}]}"#;
        assert!(matches!(loader.load_str(duplicate), Err(LoadError::DuplicateComponent { .. })));
        let unsupported = r#"{"components": [{"name": "a", "parameter": [{"name": "p", "type": "complex", "default": 1}]}]}"#;
        assert!(matches!(loader.load_str(unsupported), Err(LoadError::UnsupportedParameterType { .. })));
        let bad_default = r#"{"components": [{"name": "a", "parameter": [{"name": "p", "type": "cat", "values": ["x"], "default": "y"}]}]}"#;
        assert!(matches!(loader.load_str(bad_default), Err(LoadError::InvalidDefault { .. })));
        let unknown = r#"{"components": [{"name": "a", "parameter": [{"name": "p", "type": "bool", "default": true}], "dependencies": [{"pre": "q = true", "post": "p = false"}]}]}"#;
        assert!(matches!(loader.load_str(unknown), Err(LoadError::UnknownParameter { ref parameter, .. }) if parameter == "q"));
        let ids = r#"{"components": [{"name": "a", "requiredInterface": [{"id": "x", "name": "I"}, {"id": "x", "name": "J"}]}]}"#;
        assert!(matches!(loader.load_str(ids), Err(LoadError::DuplicateRequiredInterfaceId { .. })));
        assert!(matches!(loader.load_str("{ nope"), Err(LoadError::Json { .. })));
    }

    #[test]
    fn test_comments_inside_strings_survive() {
        let text = r#"{ /* a */ "name": "x /* not a comment */ y", "escaped": "q\" /* still a string */" /* b */ }"#;
        let stripped = strip_block_comments(text);
        let value: Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["name"], "x /* not a comment */ y");
        assert_eq!(value["escaped"], "q\" /* still a string */");
        assert!(!stripped.contains("/* a */"));
        assert!(!stripped.contains("/* b */"));

        let json = r#"{"components": [{"name": "a", "parameter": [{"name": "p", "type": "cat", "values": ["/*x*/", "y"], "default": "/*x*/"}]}]}"#;
        let repository = RepositoryLoader::default().load_str(json).unwrap();
        assert_eq!(repository.component("a").unwrap().parameter("p").unwrap().domain(), &Domain::categorical(["/*x*/", "y"]));
    }

    #[test]
    fn test_unbounded_width_is_rejected() {
        let json = r#"{"components": [{"name": "a", "parameter": [{"name": "p", "type": "double", "default": 0, "min": -1e308, "max": 1e308, "refineSplits": 2, "minInterval": 1}]}]}"#;
        let error = RepositoryLoader::default().load_str(json).unwrap_err();
        assert!(matches!(error, LoadError::InvalidDomain { ref parameter, ref reason, .. } if parameter == "p" && reason.contains("not finite")));
    }

    #[test]
    fn test_resolvability_check() {
        let json = r#"{"components": [{"name": "b", "providedInterface": ["Z"], "requiredInterface": [{"id": "y", "name": "Y"}]}]}"#;
        assert!(RepositoryLoader::default().load_str(json).is_ok());
        let strict = RepositoryLoader::new(LoaderConfig::new().with_resolvability_check(true));
        match strict.load_str(json) {
            Err(LoadError::UnresolvableRequiredInterfaces(names)) => assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["Y".to_string()]),
            other => panic!("unexpected result {other:?}"),
        }
    }
}

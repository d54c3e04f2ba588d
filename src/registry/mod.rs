//! 端点描述符注册表：每个操作都是一份声明式契约，由同一条通用管线消费。
//!
//! Endpoint descriptor registry.
//!
//! Every operation is described by an [`EndpointDescriptor`]: its parameter
//! contract, completion mode and cost formula. Adding an endpoint means adding
//! a descriptor (in code or YAML), never new request code.
//!
//! The built-in catalog is process-wide and immutable; custom registries are
//! explicit values passed to the client builder.

mod catalog;
pub mod descriptor;

pub use descriptor::{
    ArtifactKind, AttachmentSlot, CompletionMode, Dependency, EndpointDescriptor, Geometry,
    HttpMethod, ParamKind, ParameterSpec, RatioBound, Scalar,
};

use crate::pricing::CostFormula;
use crate::types::FieldValue;
use crate::validation::check_scalar;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

static BUILTIN: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::empty();
    for d in catalog::builtin_descriptors() {
        registry.insert(d);
    }
    registry
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid descriptor '{id}': {}", .problems.join("; "))]
    InvalidDescriptor { id: String, problems: Vec<String> },

    #[error("endpoint id '{0}' declared more than once")]
    DuplicateEndpoint(String),

    #[error("cannot parse descriptor document: {0}")]
    Parse(String),
}

/// On-disk shape of a descriptor file.
#[derive(Debug, Serialize, Deserialize)]
struct DescriptorDocument {
    endpoints: Vec<EndpointDescriptor>,
}

/// Lookup table from endpoint id to descriptor.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    descriptors: BTreeMap<String, Arc<EndpointDescriptor>>,
}

impl Registry {
    /// The built-in catalog, initialised on first use.
    pub fn builtin() -> &'static Registry {
        &BUILTIN
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn insert(&mut self, descriptor: EndpointDescriptor) {
        self.descriptors
            .insert(descriptor.id.clone(), Arc::new(descriptor));
    }

    /// Returns the descriptor for `id`, or [`crate::Error::UnknownEndpoint`].
    pub fn get(&self, id: &str) -> crate::Result<Arc<EndpointDescriptor>> {
        self.descriptors
            .get(id)
            .cloned()
            .ok_or_else(|| crate::Error::UnknownEndpoint(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.descriptors.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(|k| k.as_str())
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &EndpointDescriptor> {
        self.descriptors.values().map(|d| d.as_ref())
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Adds (or replaces) one descriptor after checking it.
    pub fn with_descriptor(mut self, descriptor: EndpointDescriptor) -> Result<Self, RegistryError> {
        validate_descriptor(&descriptor)?;
        self.insert(descriptor);
        Ok(self)
    }

    /// Parses a YAML document of the form `endpoints: [ ... ]`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RegistryError> {
        let doc: DescriptorDocument =
            serde_yaml::from_str(yaml).map_err(|e| RegistryError::Parse(e.to_string()))?;
        let mut seen = HashSet::new();
        let mut registry = Registry::empty();
        for descriptor in doc.endpoints {
            if !seen.insert(descriptor.id.clone()) {
                return Err(RegistryError::DuplicateEndpoint(descriptor.id));
            }
            registry = registry.with_descriptor(descriptor)?;
        }
        Ok(registry)
    }

    /// Serialises every descriptor into the same YAML shape `from_yaml_str` reads.
    pub fn to_yaml_string(&self) -> Result<String, RegistryError> {
        let doc = DescriptorDocument {
            endpoints: self.descriptors().cloned().collect(),
        };
        serde_yaml::to_string(&doc).map_err(|e| RegistryError::Parse(e.to_string()))
    }

    /// Combines two registries; entries of `other` replace same-id entries.
    pub fn merge(mut self, other: Registry) -> Self {
        for (id, descriptor) in other.descriptors {
            if self.descriptors.insert(id.clone(), descriptor).is_some() {
                tracing::debug!(endpoint = id.as_str(), "descriptor replaced during merge");
            }
        }
        self
    }
}

/// Structural checks run on every descriptor before it enters a registry.
///
/// Dependency targets must exist, defaults must satisfy their own
/// constraints, ranges must be ordered and cost formulas must read a field
/// that always has a value.
pub fn validate_descriptor(d: &EndpointDescriptor) -> Result<(), RegistryError> {
    let mut problems = Vec::new();

    if d.id.trim().is_empty() {
        problems.push("id is empty".to_string());
    }
    if !d.path.starts_with('/') {
        problems.push(format!("path '{}' must start with '/'", d.path));
    }

    let mut names = HashSet::new();
    for p in &d.params {
        if p.name.trim().is_empty() {
            problems.push("parameter with empty name".to_string());
        }
        if !names.insert(p.name.as_str()) {
            problems.push(format!("parameter '{}' declared twice", p.name));
        }
        check_kind(p, &mut problems);
        check_default(p, &mut problems);
        for dep in &p.dependencies {
            check_dependency(d, p, dep, &mut problems);
        }
    }

    check_cost(d, &mut problems);

    if problems.is_empty() {
        Ok(())
    } else {
        Err(RegistryError::InvalidDescriptor {
            id: d.id.clone(),
            problems,
        })
    }
}

fn check_kind(p: &ParameterSpec, problems: &mut Vec<String>) {
    match &p.kind {
        ParamKind::Text { max_len: Some(0), .. } => {
            problems.push(format!("'{}': max_len must be positive", p.name))
        }
        ParamKind::Integer { min, max } if min > max => {
            problems.push(format!("'{}': range {}..{} is inverted", p.name, min, max))
        }
        ParamKind::Float { min, max } if !(min.is_finite() && max.is_finite() && min <= max) => {
            problems.push(format!("'{}': range {}..{} is invalid", p.name, min, max))
        }
        ParamKind::Enum { choices } => {
            let unique: HashSet<_> = choices.iter().collect();
            if choices.is_empty() || unique.len() != choices.len() {
                problems.push(format!("'{}': enum choices must be non-empty and unique", p.name));
            }
        }
        ParamKind::Binary(slot) => {
            if slot.media_types.is_empty() {
                problems.push(format!("'{}': no media types allowed", p.name));
            }
            if slot.min_count == 0 || slot.min_count > slot.max_count {
                problems.push(format!(
                    "'{}': attachment count {}..{} is invalid",
                    p.name, slot.min_count, slot.max_count
                ));
            }
            if let Some(g) = &slot.geometry {
                if g.min_side == 0 || !g.min_aspect.le(&g.max_aspect) {
                    problems.push(format!("'{}': geometry bounds are invalid", p.name));
                }
            }
        }
        _ => {}
    }
}

fn check_default(p: &ParameterSpec, problems: &mut Vec<String>) {
    let Some(default) = &p.default else {
        return;
    };
    if p.is_binary() {
        problems.push(format!("'{}': binary parameters cannot have defaults", p.name));
        return;
    }
    let value = FieldValue::from(default.clone());
    if let Some(violation) = check_scalar(&p.kind, &value) {
        problems.push(format!("'{}': default {}", p.name, violation));
    }
}

fn check_dependency(
    d: &EndpointDescriptor,
    p: &ParameterSpec,
    dep: &Dependency,
    problems: &mut Vec<String>,
) {
    let target_name = dep.target();
    if target_name == p.name {
        problems.push(format!("'{}': dependency refers to itself", p.name));
        return;
    }
    let Some(target) = d.param(target_name) else {
        problems.push(format!(
            "'{}': dependency target '{}' is not declared",
            p.name, target_name
        ));
        return;
    };
    let one_of = match dep {
        Dependency::Requires { .. } => return,
        Dependency::ForbiddenUnless { one_of, .. } | Dependency::RequiredWhen { one_of, .. } => {
            one_of
        }
    };
    if one_of.is_empty() {
        problems.push(format!("'{}': dependency value set is empty", p.name));
    }
    if target.is_binary() {
        problems.push(format!(
            "'{}': dependency cannot compare values of binary '{}'",
            p.name, target_name
        ));
    }
    if let ParamKind::Enum { choices } = &target.kind {
        for v in one_of {
            if !choices.contains(v) {
                problems.push(format!(
                    "'{}': '{}' is not a choice of '{}'",
                    p.name, v, target_name
                ));
            }
        }
    }
}

fn check_cost(d: &EndpointDescriptor, problems: &mut Vec<String>) {
    let Some(field) = d.cost.field() else {
        return;
    };
    let Some(p) = d.param(field) else {
        problems.push(format!("cost formula reads undeclared field '{}'", field));
        return;
    };
    if !p.required && p.default.is_none() {
        problems.push(format!(
            "cost formula field '{}' needs a default or must be required",
            field
        ));
    }
    match (&d.cost, &p.kind) {
        (CostFormula::Linear { .. }, ParamKind::Integer { min, .. }) if *min >= 0 => {}
        (CostFormula::Linear { .. }, ParamKind::Float { min, .. }) if *min >= 0.0 => {}
        (CostFormula::Linear { .. }, _) => problems.push(format!(
            "linear cost field '{}' must be a non-negative number",
            field
        )),
        (CostFormula::ByChoice { prices, .. }, ParamKind::Enum { choices }) => {
            for c in choices {
                if !prices.contains_key(c) {
                    problems.push(format!("no price for choice '{}' of '{}'", c, field));
                }
            }
        }
        (CostFormula::ByChoice { .. }, _) => {
            problems.push(format!("per-choice cost field '{}' must be an enum", field))
        }
        (CostFormula::Fixed { .. }, _) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::Credits;

    #[test]
    fn builtin_catalog_is_complete_and_valid() {
        let registry = Registry::builtin();
        let ids: Vec<_> = registry.ids().collect();
        for expected in [
            "stable-image-core",
            "sd3.5",
            "stable-image-ultra",
            "sketch",
            "structure",
            "style-guide",
            "style-transfer",
            "text-to-audio",
            "audio-to-audio",
            "stable-fast-3d",
            "stable-point-aware-3d",
        ] {
            assert!(ids.contains(&expected), "missing {}", expected);
        }
        for d in registry.descriptors() {
            validate_descriptor(d).unwrap();
        }
    }

    #[test]
    fn unknown_endpoint() {
        let err = Registry::builtin().get("dall-e").unwrap_err();
        assert_eq!(err.kind(), crate::error_code::ErrorKind::UnknownEndpoint);
    }

    #[test]
    fn rejects_dangling_dependency_and_bad_default() {
        let d = EndpointDescriptor {
            id: "broken".into(),
            title: String::new(),
            method: HttpMethod::Post,
            path: "/v2beta/broken".into(),
            mode: CompletionMode::Sync,
            artifact: ArtifactKind::Image,
            params: vec![
                ParameterSpec::integer("steps", 30, 100).default_value(10i64),
                ParameterSpec::float("strength", 0.0, 1.0)
                    .depends(Dependency::requires("image")),
            ],
            cost: CostFormula::fixed(Credits::whole(1)),
        };
        let RegistryError::InvalidDescriptor { problems, .. } = validate_descriptor(&d).unwrap_err()
        else {
            panic!("expected InvalidDescriptor");
        };
        assert_eq!(problems.len(), 2, "{:?}", problems);
    }

    #[test]
    fn yaml_round_trip_of_builtin_catalog() {
        let yaml = Registry::builtin().to_yaml_string().unwrap();
        let reloaded = Registry::from_yaml_str(&yaml).unwrap();
        assert_eq!(reloaded.len(), Registry::builtin().len());
        for d in Registry::builtin().descriptors() {
            assert_eq!(reloaded.get(&d.id).unwrap().as_ref(), d);
        }
    }

    #[test]
    fn merge_replaces_same_id() {
        let yaml = r#"
endpoints:
  - id: stable-image-core
    path: /v2beta/stable-image/generate/core
    mode: sync
    artifact: image
    params:
      - name: prompt
        kind: { type: text, max_len: 100, non_blank: true }
        required: true
    cost: { shape: fixed, credits: 2.5 }
"#;
        let custom = Registry::from_yaml_str(yaml).unwrap();
        let merged = Registry::builtin().clone().merge(custom);
        assert_eq!(merged.len(), Registry::builtin().len());
        let core = merged.get("stable-image-core").unwrap();
        assert_eq!(core.params.len(), 1);
        assert_eq!(core.cost, CostFormula::fixed(Credits::from_milli(2_500)));
    }

    #[test]
    fn duplicate_ids_in_one_document() {
        let yaml = r#"
endpoints:
  - { id: a, path: /a, mode: sync, artifact: image, params: [], cost: { shape: fixed, credits: 1 } }
  - { id: a, path: /a, mode: sync, artifact: image, params: [], cost: { shape: fixed, credits: 1 } }
"#;
        assert_eq!(
            Registry::from_yaml_str(yaml).unwrap_err(),
            RegistryError::DuplicateEndpoint("a".into())
        );
    }
}

//! 请求校验引擎：在任何网络调用之前，按描述符一次性收集全部违规项。
//!
//! Validation engine.
//!
//! Checks a [`RequestDraft`] against its [`EndpointDescriptor`] and either
//! produces a [`ValidatedRequest`] or fails with every violation found:
//!
//! 1. fields the descriptor does not declare;
//! 2. per declared field: presence/default, type, range or enum domain, length;
//! 3. cross-field dependencies, evaluated on effective values (defaults included);
//! 4. attachments: media type, count, size and image geometry.
//!
//! Validation is synchronous and performs no I/O.

mod geometry;
mod violation;

pub use violation::{Constraint, ValidationError};

use crate::registry::{AttachmentSlot, Dependency, EndpointDescriptor, ParamKind, ParameterSpec};
use crate::types::{FieldValue, RequestDraft, ValidatedRequest};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Validates `draft` against `descriptor`.
///
/// The draft's endpoint id is not consulted; callers resolve the descriptor.
pub fn validate(
    descriptor: &Arc<EndpointDescriptor>,
    draft: &RequestDraft,
) -> Result<ValidatedRequest> {
    let mut errors = Vec::new();
    let supplied = draft.fields();

    for (name, value) in supplied {
        if descriptor.param(name).is_none() {
            errors.push(ValidationError::new(
                name.as_str(),
                Constraint::UnknownField,
                Some(value.describe()),
            ));
        }
    }

    let mut effective: BTreeMap<String, FieldValue> = BTreeMap::new();
    for p in &descriptor.params {
        match supplied.get(&p.name) {
            Some(value) => {
                if let Some(c) = check_scalar(&p.kind, value) {
                    errors.push(ValidationError::new(
                        p.name.as_str(),
                        c,
                        Some(value.describe()),
                    ));
                }
                effective.insert(p.name.clone(), normalize(&p.kind, value));
            }
            None if p.default.is_none() && p.required => {
                errors.push(ValidationError::new(p.name.as_str(), Constraint::Missing, None));
            }
            None => {}
        }
    }

    apply_defaults(descriptor, supplied, &mut effective);

    for p in &descriptor.params {
        for dep in &p.dependencies {
            if let Some(e) = check_dependency(p, dep, &effective) {
                errors.push(e);
            }
        }
    }

    for (name, slot) in descriptor.attachment_slots() {
        if let Some(FieldValue::Binary(list)) = supplied.get(name) {
            check_attachments(name, slot, list, &mut errors);
        }
    }

    if errors.is_empty() {
        Ok(ValidatedRequest::new(descriptor.clone(), effective))
    } else {
        tracing::debug!(
            endpoint = descriptor.id.as_str(),
            violations = errors.len(),
            "request rejected by validation"
        );
        Err(Error::ValidationFailed(errors))
    }
}

/// Fills defaults for absent fields.
///
/// Defaults without a `forbidden_unless` rule go first; gated defaults are
/// applied only when their rules hold against the values resolved so far.
fn apply_defaults(
    descriptor: &EndpointDescriptor,
    supplied: &BTreeMap<String, FieldValue>,
    effective: &mut BTreeMap<String, FieldValue>,
) {
    let absent_with_default = || {
        descriptor
            .params
            .iter()
            .filter(|p| !supplied.contains_key(&p.name))
            .filter_map(|p| p.default.as_ref().map(|d| (p, d)))
    };

    for (p, default) in absent_with_default() {
        if !has_gate(p) {
            effective.insert(p.name.clone(), normalize(&p.kind, &default.clone().into()));
        }
    }
    for (p, default) in absent_with_default() {
        if has_gate(p) && gates_open(p, effective) {
            effective.insert(p.name.clone(), normalize(&p.kind, &default.clone().into()));
        }
    }
}

fn has_gate(p: &ParameterSpec) -> bool {
    p.dependencies
        .iter()
        .any(|d| matches!(d, Dependency::ForbiddenUnless { .. }))
}

fn gates_open(p: &ParameterSpec, effective: &BTreeMap<String, FieldValue>) -> bool {
    p.dependencies.iter().all(|d| match d {
        Dependency::ForbiddenUnless { field, one_of } => value_in(effective.get(field), one_of),
        _ => true,
    })
}

fn value_in(value: Option<&FieldValue>, one_of: &[String]) -> bool {
    value
        .and_then(|v| v.to_wire_text())
        .map(|text| one_of.iter().any(|o| *o == text))
        .unwrap_or(false)
}

fn check_dependency(
    p: &ParameterSpec,
    dep: &Dependency,
    effective: &BTreeMap<String, FieldValue>,
) -> Option<ValidationError> {
    let present = effective.get(&p.name);
    let (violated, constraint) = match dep {
        Dependency::Requires { field } => (
            present.is_some() && !effective.contains_key(field),
            Constraint::Requires {
                field: field.clone(),
            },
        ),
        Dependency::ForbiddenUnless { field, one_of } => (
            present.is_some() && !value_in(effective.get(field), one_of),
            Constraint::ForbiddenUnless {
                field: field.clone(),
                one_of: one_of.clone(),
            },
        ),
        Dependency::RequiredWhen { field, one_of } => (
            present.is_none() && value_in(effective.get(field), one_of),
            Constraint::RequiredWhen {
                field: field.clone(),
                one_of: one_of.clone(),
            },
        ),
    };
    violated.then(|| ValidationError::new(p.name.as_str(), constraint, present.map(|v| v.describe())))
}

/// Checks one value against a parameter kind, returning the first violation.
///
/// Attachment contents are checked separately; for binary kinds only the
/// value's shape is checked here.
pub(crate) fn check_scalar(kind: &ParamKind, value: &FieldValue) -> Option<Constraint> {
    let mismatch = || {
        Some(Constraint::TypeMismatch {
            expected: kind.name(),
            found: value.type_name(),
        })
    };
    match (kind, value) {
        (ParamKind::Text { max_len, non_blank }, FieldValue::Text(s)) => {
            if let Some(max) = max_len {
                if s.chars().count() > *max {
                    return Some(Constraint::TooLong { max_len: *max });
                }
            }
            (*non_blank && s.trim().is_empty()).then_some(Constraint::Blank)
        }
        (ParamKind::Integer { min, max }, FieldValue::Integer(v)) => {
            (v < min || v > max).then_some(Constraint::IntegerRange {
                min: *min,
                max: *max,
            })
        }
        (ParamKind::Float { min, max }, FieldValue::Float(v)) => {
            (!(*v >= *min && *v <= *max)).then_some(Constraint::FloatRange {
                min: *min,
                max: *max,
            })
        }
        (ParamKind::Float { min, max }, FieldValue::Integer(v)) => {
            let v = *v as f64;
            (!(v >= *min && v <= *max)).then_some(Constraint::FloatRange {
                min: *min,
                max: *max,
            })
        }
        (ParamKind::Enum { choices }, FieldValue::Text(s)) => {
            (!choices.contains(s)).then(|| Constraint::NotInEnum {
                choices: choices.clone(),
            })
        }
        (ParamKind::Flag, FieldValue::Flag(_)) => None,
        (ParamKind::Binary(_), FieldValue::Binary(_)) => None,
        _ => mismatch(),
    }
}

/// Integer literals are accepted for float parameters and stored as floats.
fn normalize(kind: &ParamKind, value: &FieldValue) -> FieldValue {
    match (kind, value) {
        (ParamKind::Float { .. }, FieldValue::Integer(v)) => FieldValue::Float(*v as f64),
        (ParamKind::Text { non_blank: true, .. }, FieldValue::Text(s)) => {
            FieldValue::Text(s.trim().to_string())
        }
        _ => value.clone(),
    }
}

fn check_attachments(
    name: &str,
    slot: &AttachmentSlot,
    list: &[crate::types::Attachment],
    errors: &mut Vec<ValidationError>,
) {
    if list.len() < slot.min_count || list.len() > slot.max_count {
        errors.push(ValidationError::new(
            name,
            Constraint::AttachmentCount {
                min: slot.min_count,
                max: slot.max_count,
            },
            Some(list.len().to_string()),
        ));
    }

    for a in list {
        if !slot.accepts(a.media_type()) {
            errors.push(ValidationError::new(
                name,
                Constraint::MediaType {
                    allowed: slot.media_types.clone(),
                },
                Some(a.media_type().to_string()),
            ));
            continue;
        }
        if let Some(max_bytes) = slot.max_bytes {
            if a.len() as u64 > max_bytes {
                errors.push(ValidationError::new(
                    name,
                    Constraint::TooLarge { max_bytes },
                    Some(format!("{} bytes", a.len())),
                ));
            }
        }
        if let Some(g) = &slot.geometry {
            let dims = a
                .dimensions()
                .or_else(|| geometry::probe_dimensions(a.bytes()));
            match dims {
                Some((w, h)) => geometry::check(name, g, w, h, errors),
                None => errors.push(ValidationError::new(
                    name,
                    Constraint::UnreadableImage,
                    Some(a.media_type().to_string()),
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::types::Attachment;

    fn png(w: u32, h: u32) -> Attachment {
        Attachment::new(vec![0u8; 32], "image/png").with_dimensions(w, h)
    }

    fn sd35() -> Arc<EndpointDescriptor> {
        Registry::builtin().get("sd3.5").unwrap()
    }

    #[test]
    fn defaults_are_applied() {
        let req = validate(&sd35(), &RequestDraft::new("sd3.5").text("prompt", "a fox")).unwrap();
        assert_eq!(req.get("mode"), Some(&FieldValue::Text("text-to-image".into())));
        assert_eq!(req.get("aspect_ratio"), Some(&FieldValue::Text("1:1".into())));
        assert_eq!(req.get("output_format"), Some(&FieldValue::Text("png".into())));
        assert!(req.get("seed").is_none());
    }

    #[test]
    fn gated_default_is_not_applied() {
        let draft = RequestDraft::new("sd3.5")
            .text("prompt", "a fox")
            .text("mode", "image-to-image")
            .float("strength", 0.5)
            .attachment("image", png(512, 512));
        let req = validate(&sd35(), &draft).unwrap();
        assert!(req.get("aspect_ratio").is_none());
    }

    #[test]
    fn explicit_forbidden_field_is_rejected() {
        let draft = RequestDraft::new("sd3.5")
            .text("prompt", "a fox")
            .text("mode", "image-to-image")
            .float("strength", 0.5)
            .text("aspect_ratio", "16:9")
            .attachment("image", png(512, 512));
        let err = validate(&sd35(), &draft).unwrap_err();
        let v = err.violations();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].field, "aspect_ratio");
        assert!(v[0].constraint.is_dependency());
    }

    #[test]
    fn collects_every_violation() {
        let descriptor = Registry::builtin().get("text-to-audio").unwrap();
        let draft = RequestDraft::new("text-to-audio")
            .text("prompt", "   ")
            .integer("steps", 10)
            .float("cfg_scale", 30.0)
            .text("output_format", "flac")
            .integer("tempo", 120);
        let err = validate(&descriptor, &draft).unwrap_err();
        let fields: Vec<_> = err.violations().iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["tempo", "prompt", "steps", "cfg_scale", "output_format"]);
        assert_eq!(err.kind(), crate::error_code::ErrorKind::UnknownField);
    }

    #[test]
    fn integer_accepted_for_float() {
        let descriptor = Registry::builtin().get("text-to-audio").unwrap();
        let draft = RequestDraft::new("text-to-audio")
            .text("prompt", "rain on a tin roof")
            .integer("cfg_scale", 9);
        let req = validate(&descriptor, &draft).unwrap();
        assert_eq!(req.get("cfg_scale"), Some(&FieldValue::Float(9.0)));
    }

    #[test]
    fn prompts_are_trimmed() {
        let descriptor = Registry::builtin().get("stable-image-core").unwrap();
        let draft = RequestDraft::new("stable-image-core")
            .text("prompt", "  a fox in the snow \n")
            .text("negative_prompt", " blurry ");
        let req = validate(&descriptor, &draft).unwrap();
        assert_eq!(req.get("prompt"), Some(&FieldValue::Text("a fox in the snow".into())));
        assert_eq!(req.get("negative_prompt"), Some(&FieldValue::Text(" blurry ".into())));
    }

    #[test]
    fn text_for_integer_is_a_type_mismatch() {
        let descriptor = Registry::builtin().get("text-to-audio").unwrap();
        let draft = RequestDraft::new("text-to-audio")
            .text("prompt", "rain")
            .text("steps", "50");
        let err = validate(&descriptor, &draft).unwrap_err();
        assert_eq!(
            err.violations()[0].constraint,
            Constraint::TypeMismatch {
                expected: "integer",
                found: "text"
            }
        );
    }

    #[test]
    fn binary_never_coerced_to_text() {
        let descriptor = Registry::builtin().get("sketch").unwrap();
        let draft = RequestDraft::new("sketch")
            .text("prompt", "castle")
            .text("image", "castle.png");
        let err = validate(&descriptor, &draft).unwrap_err();
        assert_eq!(err.violations()[0].field, "image");
        assert!(matches!(
            err.violations()[0].constraint,
            Constraint::TypeMismatch { expected: "binary", .. }
        ));

        let draft = RequestDraft::new("sketch")
            .attachment("prompt", png(512, 512))
            .attachment("image", png(512, 512));
        let err = validate(&descriptor, &draft).unwrap_err();
        assert_eq!(err.violations()[0].field, "prompt");
    }

    #[test]
    fn target_count_gated_by_target_type() {
        let descriptor = Registry::builtin().get("stable-point-aware-3d").unwrap();
        let base = RequestDraft::new("stable-point-aware-3d").attachment("image", png(1024, 1024));

        let req = validate(&descriptor, &base).unwrap();
        assert!(req.get("target_count").is_none());

        let req = validate(&descriptor, &base.clone().text("target_type", "face")).unwrap();
        assert_eq!(req.get("target_count"), Some(&FieldValue::Integer(1000)));

        let err = validate(&descriptor, &base.integer("target_count", 500)).unwrap_err();
        assert_eq!(err.violations()[0].field, "target_count");
    }

    #[test]
    fn attachment_rules() {
        let descriptor = Registry::builtin().get("sketch").unwrap();
        let draft = RequestDraft::new("sketch")
            .text("prompt", "castle")
            .attachment("image", Attachment::new(vec![0u8; 8], "image/gif"))
            .attachment("image", png(32, 32));
        let err = validate(&descriptor, &draft).unwrap_err();
        let constraints: Vec<_> = err.violations().iter().map(|v| &v.constraint).collect();
        assert!(matches!(constraints[0], Constraint::AttachmentCount { min: 1, max: 1 }));
        assert!(matches!(constraints[1], Constraint::MediaType { .. }));
        assert!(matches!(constraints[2], Constraint::SideTooShort { min_side: 64 }));
        assert_eq!(constraints.len(), 3);
    }
}

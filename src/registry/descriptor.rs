//! Declarative endpoint contracts.
//!
//! Everything here is plain data with serde derives, so the built-in
//! catalog and YAML descriptor files share one model.

use crate::pricing::CostFormula;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the provider completes a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionMode {
    /// The HTTP response carries the finished artifact.
    Sync,
    /// Submission returns 202 plus a generation id; the artifact is polled later.
    Async,
}

/// Shape of the artifact an endpoint produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Audio,
    Model,
}

impl ArtifactKind {
    /// `Accept` value selecting the raw-binary response encoding.
    pub fn raw_accept(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image/*",
            ArtifactKind::Audio => "audio/*",
            ArtifactKind::Model => "model/gltf-binary",
        }
    }

    /// Media type for an artifact decoded from a JSON body.
    pub fn media_type_for(&self, output_format: Option<&str>) -> String {
        match (self, output_format) {
            (ArtifactKind::Image, Some(fmt)) => format!("image/{}", fmt),
            (ArtifactKind::Image, None) => "image/png".to_string(),
            (ArtifactKind::Audio, Some("mp3")) | (ArtifactKind::Audio, None) => {
                "audio/mpeg".to_string()
            }
            (ArtifactKind::Audio, Some(fmt)) => format!("audio/{}", fmt),
            (ArtifactKind::Model, _) => "model/gltf-binary".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl Default for HttpMethod {
    fn default() -> Self {
        HttpMethod::Post
    }
}

/// Static contract for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub path: String,
    pub mode: CompletionMode,
    pub artifact: ArtifactKind,
    /// Ordered, closed parameter set.
    pub params: Vec<ParameterSpec>,
    pub cost: CostFormula,
}

impl EndpointDescriptor {
    pub fn param(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn is_async(&self) -> bool {
        self.mode == CompletionMode::Async
    }

    /// Binary attachment slots, in declaration order.
    pub fn attachment_slots(&self) -> impl Iterator<Item = (&str, &AttachmentSlot)> {
        self.params.iter().filter_map(|p| match &p.kind {
            ParamKind::Binary(slot) => Some((p.name.as_str(), slot)),
            _ => None,
        })
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

impl ParameterSpec {
    fn with_kind(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            default: None,
            dependencies: Vec::new(),
        }
    }

    pub fn text(name: &str, max_len: usize) -> Self {
        Self::with_kind(
            name,
            ParamKind::Text {
                max_len: Some(max_len),
                non_blank: false,
            },
        )
    }

    /// Text that must contain at least one non-whitespace character.
    pub fn prompt(name: &str, max_len: usize) -> Self {
        Self::with_kind(
            name,
            ParamKind::Text {
                max_len: Some(max_len),
                non_blank: true,
            },
        )
    }

    pub fn integer(name: &str, min: i64, max: i64) -> Self {
        Self::with_kind(name, ParamKind::Integer { min, max })
    }

    pub fn float(name: &str, min: f64, max: f64) -> Self {
        Self::with_kind(name, ParamKind::Float { min, max })
    }

    pub fn choice(name: &str, choices: &[&str]) -> Self {
        Self::with_kind(
            name,
            ParamKind::Enum {
                choices: choices.iter().map(|c| c.to_string()).collect(),
            },
        )
    }

    pub fn binary(name: &str, slot: AttachmentSlot) -> Self {
        Self::with_kind(name, ParamKind::Binary(slot))
    }

    pub fn flag(name: &str) -> Self {
        Self::with_kind(name, ParamKind::Flag)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Scalar>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn depends(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.kind, ParamKind::Binary(_))
    }
}

/// Tagged parameter kind; replaces dynamic type checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_len: Option<usize>,
        #[serde(default)]
        non_blank: bool,
    },
    Integer {
        min: i64,
        max: i64,
    },
    Float {
        min: f64,
        max: f64,
    },
    Enum {
        choices: Vec<String>,
    },
    Binary(AttachmentSlot),
    Flag,
}

impl ParamKind {
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Text { .. } => "text",
            ParamKind::Integer { .. } => "integer",
            ParamKind::Float { .. } => "float",
            ParamKind::Enum { .. } => "enum",
            ParamKind::Binary(_) => "binary",
            ParamKind::Flag => "flag",
        }
    }
}

/// Scalar literal used for defaults and decoded fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Integer(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Flag(v)
    }
}

/// Cross-field rule attached to the parameter that declares it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Dependency {
    /// If this field is present, `field` must be present too.
    Requires { field: String },
    /// This field is only allowed when `field`'s value is one of `one_of`.
    ForbiddenUnless { field: String, one_of: Vec<String> },
    /// This field is required when `field`'s value is one of `one_of`.
    RequiredWhen { field: String, one_of: Vec<String> },
}

impl Dependency {
    pub fn requires(field: &str) -> Self {
        Dependency::Requires {
            field: field.to_string(),
        }
    }

    pub fn forbidden_unless(field: &str, one_of: &[&str]) -> Self {
        Dependency::ForbiddenUnless {
            field: field.to_string(),
            one_of: one_of.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn required_when(field: &str, one_of: &[&str]) -> Self {
        Dependency::RequiredWhen {
            field: field.to_string(),
            one_of: one_of.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// The other field this rule refers to.
    pub fn target(&self) -> &str {
        match self {
            Dependency::Requires { field }
            | Dependency::ForbiddenUnless { field, .. }
            | Dependency::RequiredWhen { field, .. } => field,
        }
    }
}

/// Binary attachment slot constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentSlot {
    pub media_types: Vec<String>,
    #[serde(default = "one")]
    pub min_count: usize,
    #[serde(default = "one")]
    pub max_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
}

fn one() -> usize {
    1
}

impl AttachmentSlot {
    pub fn new(media_types: &[&str]) -> Self {
        Self {
            media_types: media_types.iter().map(|m| m.to_string()).collect(),
            min_count: 1,
            max_count: 1,
            max_bytes: None,
            geometry: None,
        }
    }

    pub fn max_bytes(mut self, max: u64) -> Self {
        self.max_bytes = Some(max);
        self
    }

    pub fn geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn accepts(&self, media_type: &str) -> bool {
        self.media_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(media_type))
    }
}

/// Pixel constraints for image attachments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub min_side: u32,
    pub max_pixels: u64,
    /// Narrowest allowed width:height (e.g. `1:2.5`).
    pub min_aspect: RatioBound,
    /// Widest allowed width:height (e.g. `2.5:1`).
    pub max_aspect: RatioBound,
}

impl Geometry {
    /// Whether `width/height` lies within the bounds, inclusive.
    pub fn aspect_within(&self, width: u32, height: u32) -> bool {
        self.min_aspect.at_most(width, height) && self.max_aspect.at_least(width, height)
    }
}

/// A `w:h` ratio held in thousandths so bounds compare exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RatioBound {
    width_milli: u64,
    height_milli: u64,
}

impl RatioBound {
    /// Both parts in thousandths; callers pass non-zero values.
    pub(crate) const fn from_milli(width_milli: u64, height_milli: u64) -> Self {
        Self {
            width_milli,
            height_milli,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.split_once(':')?;
        let width_milli = parse_milli(w.trim())?;
        let height_milli = parse_milli(h.trim())?;
        if width_milli == 0 || height_milli == 0 {
            return None;
        }
        Some(Self {
            width_milli,
            height_milli,
        })
    }

    /// bound <= width/height
    fn at_most(&self, width: u32, height: u32) -> bool {
        (self.width_milli as u128) * (height as u128) <= (width as u128) * (self.height_milli as u128)
    }

    /// width/height <= bound
    fn at_least(&self, width: u32, height: u32) -> bool {
        (width as u128) * (self.height_milli as u128) <= (self.width_milli as u128) * (height as u128)
    }

    /// True when this bound is not wider than `other`.
    pub fn le(&self, other: &RatioBound) -> bool {
        (self.width_milli as u128) * (other.height_milli as u128)
            <= (other.width_milli as u128) * (self.height_milli as u128)
    }
}

fn parse_milli(s: &str) -> Option<u64> {
    let (int, frac) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int.is_empty() || frac.len() > 3 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let int: u64 = int.parse().ok()?;
    let mut frac_milli = 0u64;
    for (i, c) in frac.chars().enumerate() {
        let digit = c.to_digit(10)? as u64;
        frac_milli += digit * 10u64.pow(2 - i as u32);
    }
    int.checked_mul(1000)?.checked_add(frac_milli)
}

fn format_milli(v: u64) -> String {
    let int = v / 1000;
    let frac = v % 1000;
    if frac == 0 {
        int.to_string()
    } else {
        let s = format!("{}.{:03}", int, frac);
        s.trim_end_matches('0').to_string()
    }
}

impl fmt::Display for RatioBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            format_milli(self.width_milli),
            format_milli(self.height_milli)
        )
    }
}

impl TryFrom<String> for RatioBound {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        RatioBound::parse(&s).ok_or_else(|| format!("invalid ratio '{}', expected w:h", s))
    }
}

impl From<RatioBound> for String {
    fn from(r: RatioBound) -> Self {
        r.to_string()
    }
}

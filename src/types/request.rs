//! Request-side values: field values, attachments, drafts and validated requests.

use crate::registry::{EndpointDescriptor, ParameterSpec, Scalar};
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A single field value supplied by the caller.
///
/// Binary values are never coerced to text and vice versa.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
    Binary(Vec<Attachment>),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Flag(_) => "flag",
            FieldValue::Binary(_) => "binary",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn attachments(&self) -> Option<&[Attachment]> {
        match self {
            FieldValue::Binary(a) => Some(a),
            _ => None,
        }
    }

    /// Text form sent as a multipart text part. `None` for binary values.
    pub fn to_wire_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Integer(v) => Some(v.to_string()),
            FieldValue::Float(v) => Some(v.to_string()),
            FieldValue::Flag(v) => Some(v.to_string()),
            FieldValue::Binary(_) => None,
        }
    }

    /// Short rendering for error reports; attachment bytes are never included.
    pub fn describe(&self) -> String {
        match self {
            FieldValue::Text(s) if s.chars().count() > 64 => {
                let head: String = s.chars().take(64).collect();
                format!("{:?}…", head)
            }
            FieldValue::Text(s) => format!("{:?}", s),
            FieldValue::Binary(a) => format!("<{} attachment(s)>", a.len()),
            other => other.to_wire_text().unwrap_or_default(),
        }
    }
}

impl From<Scalar> for FieldValue {
    fn from(s: Scalar) -> Self {
        match s {
            Scalar::Flag(v) => FieldValue::Flag(v),
            Scalar::Integer(v) => FieldValue::Integer(v),
            Scalar::Float(v) => FieldValue::Float(v),
            Scalar::Text(v) => FieldValue::Text(v),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Flag(v)
    }
}

impl From<Attachment> for FieldValue {
    fn from(v: Attachment) -> Self {
        FieldValue::Binary(vec![v])
    }
}

impl From<Vec<Attachment>> for FieldValue {
    fn from(v: Vec<Attachment>) -> Self {
        FieldValue::Binary(v)
    }
}

/// Binary payload plus its declared media type.
///
/// The bytes are reference-counted; encoding shares them instead of copying.
#[derive(Clone, PartialEq)]
pub struct Attachment {
    bytes: Bytes,
    media_type: String,
    file_name: Option<String>,
    dimensions: Option<(u32, u32)>,
}

impl Attachment {
    pub fn new(bytes: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
            file_name: None,
            dimensions: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Declares pixel dimensions, skipping header probing during validation.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }

    /// Reads a file and infers its media type from the extension.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let media_type = media_type_for_extension(ext).ok_or_else(|| {
            Error::runtime_with_context(
                format!("cannot infer media type from extension '{}'", ext),
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_source("attachment_loader"),
            )
        })?;
        let bytes = tokio::fs::read(path).await?;
        let mut attachment = Attachment::new(bytes, media_type);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            attachment = attachment.with_file_name(name);
        }
        Ok(attachment)
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .field("file_name", &self.file_name)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

/// Media type for a file extension (case-insensitive).
pub fn media_type_for_extension(ext: &str) -> Option<&'static str> {
    let media_type = match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "glb" => "model/gltf-binary",
        _ => return None,
    };
    Some(media_type)
}

/// Raw candidate request: endpoint id plus a field map, not yet validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestDraft {
    endpoint: String,
    fields: BTreeMap<String, FieldValue>,
}

impl RequestDraft {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.field(name, FieldValue::Text(value.into()))
    }

    pub fn integer(self, name: impl Into<String>, value: i64) -> Self {
        self.field(name, FieldValue::Integer(value))
    }

    pub fn float(self, name: impl Into<String>, value: f64) -> Self {
        self.field(name, FieldValue::Float(value))
    }

    pub fn flag(self, name: impl Into<String>, value: bool) -> Self {
        self.field(name, FieldValue::Flag(value))
    }

    /// Adds an attachment, appending when the field already holds some.
    pub fn attachment(mut self, name: impl Into<String>, attachment: Attachment) -> Self {
        let name = name.into();
        match self.fields.get_mut(&name) {
            Some(FieldValue::Binary(list)) => list.push(attachment),
            _ => {
                self.fields.insert(name, FieldValue::Binary(vec![attachment]));
            }
        }
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }
}

/// A request that passed validation. Only the validation engine builds one.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    descriptor: Arc<EndpointDescriptor>,
    fields: BTreeMap<String, FieldValue>,
}

impl ValidatedRequest {
    pub(crate) fn new(
        descriptor: Arc<EndpointDescriptor>,
        fields: BTreeMap<String, FieldValue>,
    ) -> Self {
        Self { descriptor, fields }
    }

    pub fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    pub fn endpoint_id(&self) -> &str {
        &self.descriptor.id
    }

    /// Effective value of a field, defaults included.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Present fields in descriptor declaration order.
    pub fn ordered(&self) -> impl Iterator<Item = (&ParameterSpec, &FieldValue)> {
        self.descriptor
            .params
            .iter()
            .filter_map(|p| self.fields.get(&p.name).map(|v| (p, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_appends() {
        let draft = RequestDraft::new("style-transfer")
            .attachment("image", Attachment::new(vec![1u8], "image/png"))
            .attachment("image", Attachment::new(vec![2u8], "image/png"));
        let value = draft.fields().get("image").unwrap();
        assert_eq!(value.attachments().unwrap().len(), 2);
    }

    #[test]
    fn wire_text_for_scalars() {
        assert_eq!(FieldValue::Float(0.7).to_wire_text().unwrap(), "0.7");
        assert_eq!(FieldValue::Float(1.0).to_wire_text().unwrap(), "1");
        assert_eq!(FieldValue::Flag(true).to_wire_text().unwrap(), "true");
        assert!(FieldValue::Binary(vec![]).to_wire_text().is_none());
    }

    #[test]
    fn debug_hides_bytes() {
        let a = Attachment::new(vec![0u8; 4096], "image/png");
        let dbg = format!("{:?}", a);
        assert!(dbg.contains("len: 4096"));
        assert!(dbg.len() < 200);
    }

    #[test]
    fn extension_lookup() {
        assert_eq!(media_type_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(media_type_for_extension("gif"), None);
    }

    #[tokio::test]
    async fn from_file_infers_media_type() {
        let path = std::env::temp_dir().join(format!("stability-rs-{}.png", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"not really a png").await.unwrap();
        let a = Attachment::from_file(&path).await.unwrap();
        assert_eq!(a.media_type(), "image/png");
        assert_eq!(a.len(), 16);
        assert!(a.file_name().unwrap().ends_with(".png"));
        tokio::fs::remove_file(&path).await.unwrap();
    }
}

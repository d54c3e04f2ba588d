//! 载荷编码：把已校验请求转换为 multipart 表单与请求头。
//!
//! Payload encoder.
//!
//! Turns a [`ValidatedRequest`] into an [`EncodedRequest`]: method, path,
//! headers and ordered multipart parts. Scalars become text parts, attachments
//! become binary parts sharing the caller's buffers. Absent optional fields
//! are omitted entirely. No I/O happens here.

use crate::registry::{ArtifactKind, EndpointDescriptor, HttpMethod, ParamKind};
use crate::types::{Attachment, Credential, FieldValue, ValidatedRequest};
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;

pub const HEADER_CLIENT_ID: &str = "stability-client-id";
pub const HEADER_CLIENT_USER_ID: &str = "stability-client-user-id";
pub const HEADER_CLIENT_VERSION: &str = "stability-client-version";

/// Which response body the provider should send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseEncoding {
    /// Raw artifact bytes (`image/*`, `audio/*`, `model/gltf-binary`).
    #[default]
    Raw,
    /// JSON with a base64 artifact plus metadata.
    Json,
}

/// Optional caller identification headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client_id: Option<String>,
    pub user_id: Option<String>,
    pub version: Option<String>,
}

/// Content of one multipart part.
#[derive(Clone, PartialEq)]
pub enum PartContent {
    Text(String),
    Binary {
        bytes: Bytes,
        media_type: String,
        file_name: String,
    },
}

impl fmt::Debug for PartContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartContent::Text(s) => f.debug_tuple("Text").field(s).finish(),
            PartContent::Binary {
                bytes,
                media_type,
                file_name,
            } => f
                .debug_struct("Binary")
                .field("len", &bytes.len())
                .field("media_type", media_type)
                .field("file_name", file_name)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub content: PartContent,
}

/// Transport-ready request artifact.
#[derive(Clone)]
pub struct EncodedRequest {
    pub endpoint_id: String,
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub parts: Vec<FormPart>,
}

impl fmt::Debug for EncodedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                if k.eq_ignore_ascii_case("authorization") {
                    (k.as_str(), "<redacted>")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("EncodedRequest")
            .field("endpoint_id", &self.endpoint_id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &headers)
            .field("parts", &self.parts)
            .finish()
    }
}

impl EncodedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    /// Rebuilds the field map from the parts, typed by `descriptor`.
    ///
    /// Attachments come back with their media type and file name; declared
    /// dimensions are not part of the wire form.
    pub fn decode_fields(
        &self,
        descriptor: &EndpointDescriptor,
    ) -> Result<BTreeMap<String, FieldValue>> {
        let mut out: BTreeMap<String, FieldValue> = BTreeMap::new();
        for part in &self.parts {
            let spec = descriptor.param(&part.name).ok_or_else(|| {
                decode_error(&part.name, "part is not declared by the descriptor")
            })?;
            match (&spec.kind, &part.content) {
                (ParamKind::Binary(_), PartContent::Binary { bytes, media_type, file_name }) => {
                    let a = Attachment::new(bytes.clone(), media_type.as_str())
                        .with_file_name(file_name.as_str());
                    match out.get_mut(&part.name) {
                        Some(FieldValue::Binary(list)) => list.push(a),
                        _ => {
                            out.insert(part.name.clone(), FieldValue::Binary(vec![a]));
                        }
                    }
                }
                (ParamKind::Binary(_), PartContent::Text(_)) => {
                    return Err(decode_error(&part.name, "text part for a binary parameter"));
                }
                (_, PartContent::Binary { .. }) => {
                    return Err(decode_error(&part.name, "binary part for a scalar parameter"));
                }
                (kind, PartContent::Text(raw)) => {
                    let value = parse_scalar(kind, raw)
                        .ok_or_else(|| decode_error(&part.name, format!("cannot parse '{}'", raw)))?;
                    out.insert(part.name.clone(), value);
                }
            }
        }
        Ok(out)
    }
}

fn parse_scalar(kind: &ParamKind, raw: &str) -> Option<FieldValue> {
    match kind {
        ParamKind::Text { .. } | ParamKind::Enum { .. } => Some(FieldValue::Text(raw.to_string())),
        ParamKind::Integer { .. } => raw.parse().ok().map(FieldValue::Integer),
        ParamKind::Float { .. } => raw.parse().ok().map(FieldValue::Float),
        ParamKind::Flag => raw.parse().ok().map(FieldValue::Flag),
        ParamKind::Binary(_) => None,
    }
}

fn decode_error(field: &str, msg: impl Into<String>) -> Error {
    Error::runtime_with_context(
        msg,
        ErrorContext::new()
            .with_field_path(field)
            .with_source("payload_decoder"),
    )
}

pub(crate) fn accept_for(artifact: ArtifactKind, encoding: ResponseEncoding) -> &'static str {
    match encoding {
        ResponseEncoding::Raw => artifact.raw_accept(),
        ResponseEncoding::Json => "application/json",
    }
}

/// Authorization, `Accept` and client identification headers.
pub(crate) fn base_headers(
    credential: &Credential,
    identity: &ClientIdentity,
    accept: &str,
) -> Vec<(String, String)> {
    let mut headers = vec![
        (
            "authorization".to_string(),
            format!("Bearer {}", credential.expose()),
        ),
        ("accept".to_string(), accept.to_string()),
    ];
    for (name, value) in [
        (HEADER_CLIENT_ID, &identity.client_id),
        (HEADER_CLIENT_USER_ID, &identity.user_id),
        (HEADER_CLIENT_VERSION, &identity.version),
    ] {
        if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            headers.push((name.to_string(), v.to_string()));
        }
    }
    headers
}

/// Encodes a validated request.
pub fn encode(
    request: &ValidatedRequest,
    credential: &Credential,
    identity: &ClientIdentity,
    encoding: ResponseEncoding,
) -> EncodedRequest {
    let descriptor = request.descriptor();

    let headers = base_headers(
        credential,
        identity,
        accept_for(descriptor.artifact, encoding),
    );

    let mut parts = Vec::with_capacity(request.fields().len());
    for (spec, value) in request.ordered() {
        match value {
            FieldValue::Binary(list) => {
                for (i, a) in list.iter().enumerate() {
                    parts.push(FormPart {
                        name: spec.name.clone(),
                        content: PartContent::Binary {
                            bytes: a.bytes().clone(),
                            media_type: a.media_type().to_string(),
                            file_name: a
                                .file_name()
                                .map(str::to_string)
                                .unwrap_or_else(|| default_file_name(&spec.name, i, a.media_type())),
                        },
                    });
                }
            }
            scalar => {
                if let Some(text) = scalar.to_wire_text() {
                    parts.push(FormPart {
                        name: spec.name.clone(),
                        content: PartContent::Text(text),
                    });
                }
            }
        }
    }

    EncodedRequest {
        endpoint_id: descriptor.id.clone(),
        method: descriptor.method,
        path: descriptor.path.clone(),
        headers,
        parts,
    }
}

fn default_file_name(field: &str, index: usize, media_type: &str) -> String {
    let ext = match media_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" => "wav",
        _ => "bin",
    };
    if index == 0 {
        format!("{}.{}", field, ext)
    } else {
        format!("{}-{}.{}", field, index, ext)
    }
}

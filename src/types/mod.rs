//! 类型系统模块：请求、附件、异步任务与生成结果的核心数据类型。
//!
//! # Types Module
//!
//! Core values that flow through the generation pipeline.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RequestDraft`] | Caller-built candidate request (endpoint id + field map) |
//! | [`FieldValue`] | Tagged field value: text, integer, float, flag or attachments |
//! | [`Attachment`] | Shared binary payload plus declared media type |
//! | [`ValidatedRequest`] | Immutable request produced only by the validation engine |
//! | [`AsyncJob`] | Handle for a pending async generation |
//! | [`GenerationResult`] | Finished artifact with echoed seed and ids |
//!
//! ## Example
//!
//! ```rust
//! use stability_rs::types::{Attachment, RequestDraft};
//!
//! let draft = RequestDraft::new("sd3.5")
//!     .text("prompt", "a lighthouse at dusk")
//!     .text("mode", "image-to-image")
//!     .float("strength", 0.6)
//!     .attachment(
//!         "image",
//!         Attachment::new(vec![0u8; 16], "image/png").with_dimensions(1024, 768),
//!     );
//! assert_eq!(draft.fields().len(), 4);
//! ```

pub mod credential;
pub mod job;
pub mod request;
pub mod result;

pub use credential::{Credential, CredentialFingerprint};
pub use job::{AsyncJob, JobStatus, Submission, GENERATION_ID_LEN, RETENTION_WINDOW};
pub use request::{media_type_for_extension, Attachment, FieldValue, RequestDraft, ValidatedRequest};
pub use result::{FinishReason, GenerationResult};

//! # stability-rs
//!
//! 面向 Stability 生成式媒体接口（图像、控制、音频、3D）的描述符驱动运行时。
//!
//! Descriptor-driven runtime for the Stability family of generative-media
//! endpoints: image generation, structural and style control, audio and 3D
//! assets, under one authentication and billing model.
//!
//! ## Overview
//!
//! Every operation is a declarative [`registry::EndpointDescriptor`] consumed
//! by one generic pipeline:
//!
//! ```text
//! RequestDraft -> validate -> ValidatedRequest -> encode -> submit
//!                                                         |-> 200: GenerationResult
//!                                                         `-> 202: AsyncJob -> poll -> GenerationResult
//! ```
//!
//! - **Registry**: the immutable built-in catalog, extensible from YAML
//! - **Validation**: all violations collected in one pass, before any I/O
//! - **Pricing**: informational credit estimates
//! - **Encoding**: multipart parts and headers, attachments shared not copied
//! - **Client**: one call per submission, explicit poll state machine with an
//!   injected clock and cancellation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stability_rs::{PollOptions, RequestDraft, StabilityClient};
//!
//! #[tokio::main]
//! async fn main() -> stability_rs::Result<()> {
//!     let client = StabilityClient::builder().api_key("sk-...").build()?;
//!
//!     let draft = RequestDraft::new("stable-image-core")
//!         .text("prompt", "a lighthouse at dusk, oil painting")
//!         .text("aspect_ratio", "16:9");
//!     println!("estimated cost: {}", client.estimate_cost(&draft)?.format());
//!
//!     let image = client.generate(&draft, PollOptions::default()).await?;
//!     tokio::fs::write(format!("out.{}", image.file_extension()), &image.artifact).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`registry`] | Endpoint descriptors and the built-in catalog |
//! | [`validation`] | Request validation engine and violation types |
//! | [`pricing`] | Credit formulas and cost estimation |
//! | [`encoding`] | Multipart payload encoder |
//! | [`client`] | Submission, polling, builder and policies |
//! | [`transport`] | HTTP seam and the reqwest implementation |
//! | [`types`] | Drafts, attachments, jobs and results |
//! | [`error_code`] | Closed error taxonomy |

pub mod client;
pub mod encoding;
pub mod error_code;
pub mod pricing;
pub mod registry;
pub mod transport;
pub mod types;
pub mod validation;

// Re-export main types for convenience
pub use client::{
    CallStats, CancelHandle, PollOptions, PollPolicy, StabilityClient, StabilityClientBuilder,
};
pub use encoding::{ClientIdentity, EncodedRequest, ResponseEncoding};
pub use error_code::ErrorKind;
pub use pricing::{CostEstimate, Credits};
pub use registry::{EndpointDescriptor, Registry};
pub use types::{
    AsyncJob, Attachment, Credential, FieldValue, GenerationResult, JobStatus, RequestDraft,
    Submission, ValidatedRequest,
};
pub use validation::{validate, ValidationError};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{ApiError, Error, ErrorContext};

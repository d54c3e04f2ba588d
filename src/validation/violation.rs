use crate::registry::RatioBound;
use std::fmt;

/// The rule a field broke.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Field is not declared by the endpoint.
    UnknownField,
    /// Required field absent, with no default.
    Missing,
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    IntegerRange {
        min: i64,
        max: i64,
    },
    FloatRange {
        min: f64,
        max: f64,
    },
    NotInEnum {
        choices: Vec<String>,
    },
    TooLong {
        max_len: usize,
    },
    Blank,
    Requires {
        field: String,
    },
    ForbiddenUnless {
        field: String,
        one_of: Vec<String>,
    },
    RequiredWhen {
        field: String,
        one_of: Vec<String>,
    },
    MediaType {
        allowed: Vec<String>,
    },
    AttachmentCount {
        min: usize,
        max: usize,
    },
    TooLarge {
        max_bytes: u64,
    },
    SideTooShort {
        min_side: u32,
    },
    TooManyPixels {
        max_pixels: u64,
    },
    AspectRatio {
        min: RatioBound,
        max: RatioBound,
    },
    /// Pixel dimensions were neither declared nor readable from the image header.
    UnreadableImage,
}

impl Constraint {
    /// True for cross-field rules.
    pub fn is_dependency(&self) -> bool {
        matches!(
            self,
            Constraint::Requires { .. }
                | Constraint::ForbiddenUnless { .. }
                | Constraint::RequiredWhen { .. }
        )
    }

    /// True for attachment media type, size and geometry rules.
    pub fn is_attachment(&self) -> bool {
        matches!(
            self,
            Constraint::MediaType { .. }
                | Constraint::AttachmentCount { .. }
                | Constraint::TooLarge { .. }
                | Constraint::SideTooShort { .. }
                | Constraint::TooManyPixels { .. }
                | Constraint::AspectRatio { .. }
                | Constraint::UnreadableImage
        )
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::UnknownField => f.write_str("is not a parameter of this endpoint"),
            Constraint::Missing => f.write_str("is required"),
            Constraint::TypeMismatch { expected, found } => {
                write!(f, "expected {}, got {}", expected, found)
            }
            Constraint::IntegerRange { min, max } => write!(f, "must be in [{}, {}]", min, max),
            Constraint::FloatRange { min, max } => write!(f, "must be in [{}, {}]", min, max),
            Constraint::NotInEnum { choices } => write!(f, "must be one of {}", choices.join(", ")),
            Constraint::TooLong { max_len } => write!(f, "exceeds {} characters", max_len),
            Constraint::Blank => f.write_str("must not be blank"),
            Constraint::Requires { field } => write!(f, "requires '{}'", field),
            Constraint::ForbiddenUnless { field, one_of } => {
                write!(f, "only allowed when '{}' is {}", field, one_of.join(" or "))
            }
            Constraint::RequiredWhen { field, one_of } => {
                write!(f, "required when '{}' is {}", field, one_of.join(" or "))
            }
            Constraint::MediaType { allowed } => {
                write!(f, "media type must be one of {}", allowed.join(", "))
            }
            Constraint::AttachmentCount { min, max } if min == max => {
                write!(f, "expects exactly {} attachment(s)", min)
            }
            Constraint::AttachmentCount { min, max } => {
                write!(f, "expects {} to {} attachments", min, max)
            }
            Constraint::TooLarge { max_bytes } => write!(f, "exceeds {} bytes", max_bytes),
            Constraint::SideTooShort { min_side } => {
                write!(f, "each side must be at least {} px", min_side)
            }
            Constraint::TooManyPixels { max_pixels } => {
                write!(f, "exceeds {} total pixels", max_pixels)
            }
            Constraint::AspectRatio { min, max } => {
                write!(f, "aspect ratio must be within {} and {}", min, max)
            }
            Constraint::UnreadableImage => f.write_str("image dimensions could not be determined"),
        }
    }
}

/// One violation: the field, the broken rule and the offending value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub constraint: Constraint,
    pub value: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, constraint: Constraint, value: Option<String>) -> Self {
        Self {
            field: field.into(),
            constraint,
            value,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.constraint)?;
        if let Some(ref v) = self.value {
            write!(f, " (got {})", v)?;
        }
        Ok(())
    }
}

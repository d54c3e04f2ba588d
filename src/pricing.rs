//! Credit pricing and cost estimation.
//!
//! Estimates are informational. The provider decides the actual charge, and
//! only a successful terminal result is billed.

use crate::types::{FieldValue, ValidatedRequest};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Add;

/// Exact credit amount, stored in thousandths of a credit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Credits(u64);

impl Credits {
    pub const ZERO: Credits = Credits(0);

    pub const fn from_milli(milli: u64) -> Self {
        Credits(milli)
    }

    pub const fn whole(credits: u64) -> Self {
        Credits(credits * 1000)
    }

    /// Rounds to the nearest thousandth; negative or non-finite input is zero.
    pub fn from_f64(credits: f64) -> Self {
        if !credits.is_finite() || credits <= 0.0 {
            return Credits::ZERO;
        }
        Credits((credits * 1000.0).round() as u64)
    }

    pub fn milli(&self) -> u64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    fn scale(&self, factor: f64) -> Credits {
        Credits::from_f64(self.as_f64() * factor)
    }
}

impl Add for Credits {
    type Output = Credits;

    fn add(self, rhs: Credits) -> Credits {
        Credits(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 1000;
        let frac = self.0 % 1000;
        if frac == 0 {
            write!(f, "{}", whole)
        } else {
            let s = format!("{}.{:03}", whole, frac);
            f.write_str(s.trim_end_matches('0'))
        }
    }
}

impl Serialize for Credits {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Credits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let v = f64::deserialize(deserializer)?;
        if !v.is_finite() || v < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "credit amount must be a non-negative number, got {}",
                v
            )));
        }
        Ok(Credits::from_f64(v))
    }
}

/// Declarative price formula attached to a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum CostFormula {
    Fixed {
        credits: Credits,
    },
    /// `base + rate × field`
    Linear {
        base: Credits,
        rate: Credits,
        field: String,
    },
    /// Price looked up by the value of an enum field.
    ByChoice {
        field: String,
        prices: BTreeMap<String, Credits>,
    },
}

impl CostFormula {
    pub fn fixed(credits: Credits) -> Self {
        CostFormula::Fixed { credits }
    }

    pub fn linear(base: Credits, rate: Credits, field: &str) -> Self {
        CostFormula::Linear {
            base,
            rate,
            field: field.to_string(),
        }
    }

    pub fn by_choice(field: &str, prices: &[(&str, Credits)]) -> Self {
        CostFormula::ByChoice {
            field: field.to_string(),
            prices: prices
                .iter()
                .map(|(choice, credits)| (choice.to_string(), *credits))
                .collect(),
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            CostFormula::Fixed { .. } => "fixed",
            CostFormula::Linear { .. } => "linear",
            CostFormula::ByChoice { .. } => "by_choice",
        }
    }

    /// Field the formula reads, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            CostFormula::Fixed { .. } => None,
            CostFormula::Linear { field, .. } | CostFormula::ByChoice { field, .. } => Some(field),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub endpoint_id: String,
    pub credits: Credits,
    pub formula: String,
}

impl CostEstimate {
    pub fn format(&self) -> String {
        format!("{} credits", self.credits)
    }
}

/// Computes the estimated price of a validated request.
///
/// Field values are the effective ones (defaults included).
pub fn estimate(request: &ValidatedRequest) -> Result<CostEstimate> {
    let descriptor = request.descriptor();
    let credits = match &descriptor.cost {
        CostFormula::Fixed { credits } => *credits,
        CostFormula::Linear { base, rate, field } => match request.get(field) {
            // integer fields stay in exact milli-credit arithmetic
            Some(FieldValue::Integer(v)) if *v >= 0 => {
                *base + Credits::from_milli(rate.milli().saturating_mul(*v as u64))
            }
            Some(FieldValue::Float(v)) if *v >= 0.0 => *base + rate.scale(*v),
            _ => return Err(missing_cost_input(&descriptor.id, field)),
        },
        CostFormula::ByChoice { field, prices } => match request.get(field) {
            Some(FieldValue::Text(choice)) => *prices
                .get(choice)
                .ok_or_else(|| missing_cost_input(&descriptor.id, field))?,
            _ => return Err(missing_cost_input(&descriptor.id, field)),
        },
    };
    Ok(CostEstimate {
        endpoint_id: descriptor.id.clone(),
        credits,
        formula: descriptor.cost.shape().to_string(),
    })
}

fn missing_cost_input(endpoint: &str, field: &str) -> Error {
    Error::runtime_with_context(
        format!("cost formula of '{}' has no usable value", endpoint),
        ErrorContext::new()
            .with_field_path(field)
            .with_source("cost_estimator"),
    )
}

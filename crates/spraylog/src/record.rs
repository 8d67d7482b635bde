//! Spraying log records and payload validation.
//!
//! A [`NewRecord`] is the validated, normalized form of an untrusted request
//! payload. Storage turns it into a [`Record`] by assigning an id.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A persisted spraying event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier assigned by storage on creation.
    pub id: i64,
    /// Day the product was applied.
    pub date: NaiveDate,
    /// Treated area.
    pub field: String,
    /// Applied substance.
    pub product: String,
    /// Applied amount, never negative.
    pub dose: f64,
    /// Free-form remarks, empty when none were given.
    pub notes: String,
}

/// A validated record that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRecord {
    /// Day the product was applied.
    pub date: NaiveDate,
    /// Treated area, trimmed and non-empty.
    pub field: String,
    /// Applied substance, trimmed and non-empty.
    pub product: String,
    /// Applied amount, finite and non-negative.
    pub dose: f64,
    /// Trimmed remarks.
    pub notes: String,
}

/// One rejected field in a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    /// Name of the offending field (`body` when the payload itself is unusable).
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

/// A payload was rejected; lists every offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    issues: Vec<FieldIssue>,
}

impl ValidationError {
    /// Create an error for a single field.
    #[must_use]
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue {
                field,
                message: message.into(),
            }],
        }
    }

    /// The rejected fields, in payload field order.
    #[must_use]
    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    /// Consume the error, returning the rejected fields.
    #[must_use]
    pub fn into_issues(self) -> Vec<FieldIssue> {
        self.issues
    }

    /// Check whether the given field was rejected.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid record")?;
        for (i, issue) in self.issues.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{}: {}", issue.field, issue.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collects issues while a payload is being checked.
#[derive(Debug, Default)]
struct Issues(Vec<FieldIssue>);

impl Issues {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldIssue {
            field,
            message: message.into(),
        });
    }
}

impl NewRecord {
    /// Validate and normalize raw request bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the bytes are not JSON or the payload
    /// does not describe a valid record.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
        let payload: Value = serde_json::from_slice(bytes)
            .map_err(|e| ValidationError::single("body", format!("invalid JSON: {e}")))?;
        Self::from_payload(&payload)
    }

    /// Validate and normalize a decoded JSON payload.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming every missing, mistyped or
    /// out-of-range field.
    pub fn from_payload(payload: &Value) -> Result<Self, ValidationError> {
        let Some(object) = payload.as_object() else {
            return Err(ValidationError::single("body", "expected a JSON object"));
        };

        let mut issues = Issues::default();
        let date = parse_date(object, &mut issues);
        let field = parse_text(object, "field", &mut issues);
        let product = parse_text(object, "product", &mut issues);
        let dose = parse_dose(object, &mut issues);
        let notes = normalize_notes(object.get("notes"));

        match (date, field, product, dose) {
            (Some(date), Some(field), Some(product), Some(dose)) if issues.0.is_empty() => {
                Ok(Self {
                    date,
                    field,
                    product,
                    dose,
                    notes,
                })
            }
            _ => Err(ValidationError { issues: issues.0 }),
        }
    }

    /// Attach a storage-assigned id.
    #[must_use]
    pub fn into_record(self, id: i64) -> Record {
        Record {
            id,
            date: self.date,
            field: self.field,
            product: self.product,
            dose: self.dose,
            notes: self.notes,
        }
    }
}

fn parse_date(object: &Map<String, Value>, issues: &mut Issues) -> Option<NaiveDate> {
    match object.get("date") {
        None | Some(Value::Null) => {
            issues.push("date", "field required");
            None
        }
        Some(Value::String(s)) => match s.trim().parse::<NaiveDate>() {
            Ok(date) => Some(date),
            Err(_) => {
                issues.push("date", format!("invalid date '{s}', expected YYYY-MM-DD"));
                None
            }
        },
        Some(_) => {
            issues.push("date", "expected a date string");
            None
        }
    }
}

fn parse_text(
    object: &Map<String, Value>,
    name: &'static str,
    issues: &mut Issues,
) -> Option<String> {
    match object.get(name) {
        None | Some(Value::Null) => {
            issues.push(name, "field required");
            None
        }
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                issues.push(name, "must not be empty");
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(_) => {
            issues.push(name, "expected a string");
            None
        }
    }
}

fn parse_dose(object: &Map<String, Value>, issues: &mut Issues) -> Option<f64> {
    let dose = match object.get("dose") {
        None | Some(Value::Null) => {
            issues.push("dose", "field required");
            return None;
        }
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match dose {
        Some(d) if !d.is_finite() => {
            issues.push("dose", "must be a finite number");
            None
        }
        Some(d) if d < 0.0 => {
            issues.push("dose", "must be greater than or equal to 0");
            None
        }
        Some(d) => Some(d),
        None => {
            issues.push("dose", "expected a number");
            None
        }
    }
}

/// Trim string notes; anything else becomes empty.
fn normalize_notes(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    }
}

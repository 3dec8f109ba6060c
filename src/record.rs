//! Raw input rows and upsert candidate validation.
//!
//! The ingestion layer (file parsing, column labeling) lives outside this
//! crate; it hands over a sequence of [`RawRecord`]s keyed by column label.
//! [`validate`] turns one raw row into an upsert [`Candidate`] against a
//! target's field mapping, or rejects it with a [`RejectReason`]. Rejections
//! are ordinary values, not errors: the caller records them as failed
//! outcomes and moves on.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::config::FieldMapping;

// ─────────────────────────────────────────────────────────────────────────────
// Raw Records
// ─────────────────────────────────────────────────────────────────────────────

/// One row of input data: column label → raw cell value.
///
/// Immutable once produced by the ingestion layer. Missing columns and empty
/// cells are indistinguishable to the validator.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    values: HashMap<String, String>,
}

impl RawRecord {
    /// Builds a record from (column label, cell value) pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the raw cell value for a column label, if present.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Candidates
// ─────────────────────────────────────────────────────────────────────────────

/// A validated record ready for upsert against one target.
///
/// Invariant: `email` is non-empty and contains `@`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Trimmed email address.
    pub email: String,
    /// Logical merge field name → trimmed, normalized value.
    pub fields: BTreeMap<String, String>,
}

/// Why a raw record was rejected before submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The mapped email cell was empty, missing, or not address-shaped.
    InvalidEmail {
        /// The offending raw value, trimmed.
        value: String,
    },
}

impl RejectReason {
    /// The raw email value the rejection was derived from. Used for outcome
    /// and audit attribution.
    pub fn email_value(&self) -> &str {
        match self {
            RejectReason::InvalidEmail { value } => value,
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::InvalidEmail { value } => {
                write!(f, "invalid email '{}'", value)
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Validates one raw record against a target's field mapping.
///
/// Extracts and trims the email from the mapped column, then copies every
/// mapped merge field from its source column, trimmed and normalized.
/// ZIP-kind fields that are all digits and shorter than five characters are
/// left-padded with zeros.
///
/// Emits one `tracing` rejection notice per invalid record; validation
/// failures are returned, never raised.
pub fn validate(raw: &RawRecord, mapping: &FieldMapping) -> Result<Candidate, RejectReason> {
    let email = raw.get(&mapping.email).unwrap_or("").trim();

    if email.is_empty() || !email.contains('@') {
        warn!("[VALIDATE] Skipping record: invalid email '{}'", email);
        return Err(RejectReason::InvalidEmail {
            value: email.to_string(),
        });
    }

    let mut fields = BTreeMap::new();
    for (logical, column) in &mapping.merge {
        let value = raw.get(column).unwrap_or("").trim();
        let value = if mapping.is_zip_field(logical) {
            normalize_zip(value)
        } else {
            value.to_string()
        };
        fields.insert(logical.clone(), value);
    }

    Ok(Candidate {
        email: email.to_string(),
        fields,
    })
}

/// Left-pads all-digit ZIP values shorter than five characters with zeros.
/// Anything else passes through unchanged.
fn normalize_zip(value: &str) -> String {
    if !value.is_empty() && value.len() < 5 && value.bytes().all(|b| b.is_ascii_digit()) {
        format!("{:0>5}", value)
    } else {
        value.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn mapping() -> FieldMapping {
        FieldMapping {
            email: "C".to_string(),
            merge: BTreeMap::from([
                ("FNAME".to_string(), "D".to_string()),
                ("LNAME".to_string(), "E".to_string()),
                ("ZIPCODE".to_string(), "J".to_string()),
            ]),
            zip_fields: BTreeSet::new(),
        }
    }

    fn record(email: &str) -> RawRecord {
        RawRecord::from_pairs([
            ("C", email),
            ("D", "  Alice "),
            ("E", "Smith"),
            ("J", "7001"),
        ])
    }

    #[test]
    fn valid_record_produces_candidate() {
        let candidate =
            validate(&record("alice@example.com"), &mapping()).expect("record should validate");
        assert_eq!(candidate.email, "alice@example.com");
        assert_eq!(candidate.fields["FNAME"], "Alice");
        assert_eq!(candidate.fields["LNAME"], "Smith");
    }

    #[test]
    fn email_is_trimmed() {
        let candidate =
            validate(&record("  bob@example.com  "), &mapping()).expect("record should validate");
        assert_eq!(candidate.email, "bob@example.com");
    }

    #[test]
    fn empty_email_rejected() {
        let reject = validate(&record("   "), &mapping()).unwrap_err();
        assert_eq!(
            reject,
            RejectReason::InvalidEmail {
                value: String::new()
            }
        );
    }

    #[test]
    fn missing_email_column_rejected() {
        let raw = RawRecord::from_pairs([("D", "Alice")]);
        assert!(validate(&raw, &mapping()).is_err());
    }

    #[test]
    fn email_without_at_rejected() {
        let reject = validate(&record("not-an-email"), &mapping()).unwrap_err();
        assert_eq!(reject.email_value(), "not-an-email");
        assert!(reject.to_string().contains("not-an-email"));
    }

    #[test]
    fn missing_merge_column_becomes_empty_value() {
        let raw = RawRecord::from_pairs([("C", "carol@example.com")]);
        let candidate = validate(&raw, &mapping()).expect("record should validate");
        assert_eq!(candidate.fields["FNAME"], "");
    }

    #[test]
    fn short_numeric_zip_is_padded() {
        let candidate =
            validate(&record("dan@example.com"), &mapping()).expect("record should validate");
        assert_eq!(candidate.fields["ZIPCODE"], "07001");
    }

    #[test]
    fn zip_padding_applies_to_configured_zip_fields() {
        let mut m = mapping();
        m.merge.insert("MMERGE10".to_string(), "J".to_string());
        m.zip_fields.insert("MMERGE10".to_string());

        let candidate =
            validate(&record("erin@example.com"), &m).expect("record should validate");
        assert_eq!(candidate.fields["MMERGE10"], "07001");
    }

    #[test]
    fn normalize_zip_leaves_other_values_alone() {
        assert_eq!(normalize_zip("123"), "00123");
        assert_eq!(normalize_zip("00123"), "00123");
        assert_eq!(normalize_zip("123456"), "123456");
        assert_eq!(normalize_zip("1A3"), "1A3");
        assert_eq!(normalize_zip(""), "");
    }
}

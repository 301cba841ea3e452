//! Core data types shared across the pull pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Working credential pair produced by a completed handshake.
///
/// The refresh token is optional because the redeem endpoint is not
/// guaranteed to issue one; refreshing then requires a new handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Server-issued nonce pair for the authentication handshake.
///
/// `timestamp_ms` falls back to the caller's wall clock when the challenge
/// response carries no timestamp field.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub id: String,
    pub timestamp_ms: i64,
}

/// Intermediate bearer issued after submitting the encrypted token.
///
/// Only good for polling handshake status and redeeming the final token
/// pair; it has no invoice-query privileges.
#[derive(Debug, Clone)]
pub struct PendingAuth {
    pub reference_number: String,
    pub auth_token: String,
}

/// Logical invoice category queried from the bulk metadata endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectType {
    /// Invoices issued by the configured entity (sales).
    Issued,
    /// Invoices received by the configured entity (purchases, costs).
    Received,
}

impl SubjectType {
    /// Value expected by the `subjectType` field of the query endpoint.
    #[must_use]
    pub fn wire_value(self) -> &'static str {
        match self {
            Self::Issued => "Subject1",
            Self::Received => "Subject2",
        }
    }

    /// Human-readable label used to tag fetched records and report sheets.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Issued => "Issued (sales)",
            Self::Received => "Received (purchases)",
        }
    }
}

/// Closed, inclusive interval of calendar dates.
///
/// Produced by `ksef_core::windowing::partition`; a valid window never spans
/// more than three calendar months minus one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Opaque server-defined invoice record tagged with the category it was
/// fetched under. The server schema is not modelled beyond the fields the
/// report flattens; everything else rides along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub category: String,
    pub fields: Value,
}

impl InvoiceRecord {
    #[must_use]
    pub fn new(category: impl Into<String>, fields: Value) -> Self {
        Self { category: category.into(), fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_type_wire_values() {
        assert_eq!(SubjectType::Issued.wire_value(), "Subject1");
        assert_eq!(SubjectType::Received.wire_value(), "Subject2");
    }

    #[test]
    fn subject_labels_are_distinct() {
        assert_ne!(SubjectType::Issued.label(), SubjectType::Received.label());
    }
}

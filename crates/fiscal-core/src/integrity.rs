//! # Integrity Stamp
//!
//! One-way digest over the key fields of an emitted document, stored for
//! tamper evidence. It is not a MAC and carries no per-document key.
//!
//! ```text
//! SHA-256( number | emitted_at (RFC 3339, seconds) | net_total_cents | client_id | secret )
//!   → 64 lowercase hex characters
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::money::Money;
use crate::types::FiscalDocument;

/// Computes the stamp from its individual fields.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use fiscal_core::integrity::compute_hash;
/// use fiscal_core::money::Money;
///
/// let at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
/// let hash = compute_hash("FT2025-000001", at, Money::from_cents(114_000), Some("c-1"), "secret");
/// assert_eq!(hash.len(), 64);
/// ```
pub fn compute_hash(
    number: &str,
    emitted_at: DateTime<Utc>,
    net_total: Money,
    client_id: Option<&str>,
    secret: &str,
) -> String {
    let payload = format!(
        "{}|{}|{}|{}|{}",
        number,
        emitted_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        net_total.cents(),
        client_id.unwrap_or(""),
        secret
    );
    hex::encode(Sha256::digest(payload.as_bytes()))
}

/// Recomputes the stamp of a stored document.
pub fn document_hash(document: &FiscalDocument, secret: &str) -> String {
    compute_hash(
        &document.number,
        document.emitted_at,
        document.net_total(),
        document.client_id.as_deref(),
        secret,
    )
}

/// True when the stored stamp matches the document's current fields.
pub fn verify(document: &FiscalDocument, secret: &str) -> bool {
    document_hash(document, secret) == document.integrity_hash
}

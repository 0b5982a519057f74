//! # Submitter Identity
//!
//! Normalizes the certificate bytes the host asserts as the transaction
//! submitter's identity and derives a stable public-key hash from them.
//!
//! This module parses and normalizes only — trust-chain validation against a
//! certificate authority happens outside the shim.

use crate::errors::ContractError;
use once_cell::sync::Lazy;
use regex::Regex;
use sha3::{Digest, Sha3_256};
use tracing::debug;

/// Matches exactly one `BEGIN…/body/END…` triple inside a PEM blob.
static PEM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(-----\s*BEGIN ?[^-]+?-----)([\s\S]*)(-----\s*END ?[^-]+?-----)")
        .expect("pem pattern")
});

/// Parsed submitter certificate, in owned form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorCertificate {
    /// The certificate in canonical PEM form.
    pub pem: String,
    /// Distinguished name of the certificate subject.
    pub subject: String,
    /// Hexadecimal encoding of the subjectPublicKeyInfo field.
    pub public_key_hex: String,
}

/// Normalizes a certificate's textual encoding into canonical PEM.
///
/// Hosts hand certificates over with inconsistent whitespace; this locates
/// the `BEGIN…/body/END…` triple, trims each segment, and rejoins them with
/// single newlines plus a trailing newline. Input that does not yield exactly
/// that triple fails with `INVALID_CERTIFICATE`.
pub fn normalize_x509_pem(raw: &str) -> Result<String, ContractError> {
    debug!(cert = %raw, "normalizing certificate");

    let captures = PEM_PATTERN
        .captures(raw)
        .ok_or_else(|| ContractError::invalid_certificate(raw))?;

    let begin = captures[1].trim();
    let body = captures[2].trim();
    let end = captures[3].trim();
    if body.is_empty() {
        return Err(ContractError::invalid_certificate(raw));
    }

    Ok(format!("{begin}\n{body}\n{end}\n"))
}

/// Parses a (possibly messy) PEM blob into an owned certificate view.
pub fn certificate_from_pem(raw: &str) -> Result<CreatorCertificate, ContractError> {
    let pem = normalize_x509_pem(raw)?;

    let (_, parsed_pem) = x509_parser::pem::parse_x509_pem(pem.as_bytes())
        .map_err(|_| ContractError::invalid_certificate(raw))?;
    let certificate = parsed_pem
        .parse_x509()
        .map_err(|_| ContractError::invalid_certificate(raw))?;

    let subject = certificate.subject().to_string();
    let public_key_hex = hex::encode(certificate.public_key().raw);

    Ok(CreatorCertificate {
        pem,
        subject,
        public_key_hex,
    })
}

/// SHA3-256 hash (lower-case hex) of the certificate public key's
/// hexadecimal encoding.
pub fn public_key_hash_from_pem(raw: &str) -> Result<String, ContractError> {
    let certificate = certificate_from_pem(raw)?;
    let hash = sha3_256_hex(certificate.public_key_hex.as_bytes());

    debug!(public_key = %certificate.public_key_hex, %hash, "derived public key hash");
    Ok(hash)
}

/// True iff `hash` has the shape produced by [`public_key_hash_from_pem`]:
/// 64 hexadecimal characters (SHA3-256 is 32 bytes).
pub fn validate_public_key_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

fn sha3_256_hex(data: &[u8]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ============================
// crates/backend-lib/src/auth/credential.rs
// ============================
//! Stored credential representation.
//!
//! A credential is either the hashed verifier produced by the
//! [`CredentialManager`](super::CredentialManager) or a legacy plaintext value
//! that predates enforced hashing. The variant is always serialized with an
//! explicit `format` tag, so the stored form never has to be guessed by
//! probing a verifier.

use std::fmt;

use argon2::password_hash::PasswordHash;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors raised while producing a new credential.
///
/// Malformed *stored* data is never an error; see [`VerificationOutcome`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("secret must not be empty")]
    EmptySecret,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("invalid hashing parameters: {0}")]
    InvalidParams(String),
}

/// PHC-format hash string: `$<alg>$v=<version>$<params>$<salt>$<digest>`.
///
/// Holds the raw encoding as stored; it may be unparseable if the record was
/// corrupted or written by a foreign system.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedHash(String);

impl EncodedHash {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the PHC encoding, requiring both salt and digest to be present.
    pub fn parse(&self) -> Option<PasswordHash<'_>> {
        let parsed = PasswordHash::new(&self.0).ok()?;
        if parsed.salt.is_none() || parsed.hash.is_none() {
            return None;
        }
        Some(parsed)
    }

    /// Algorithm identifier, if the encoding parses.
    pub fn algorithm(&self) -> Option<&str> {
        self.parse().map(|h| h.algorithm.as_str())
    }
}

impl fmt::Debug for EncodedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncodedHash").field(&self.0).finish()
    }
}

/// The stored representation of a user's secret.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "format", content = "value", rename_all = "snake_case")]
pub enum Credential {
    /// Plaintext stored before hashing was enforced. Only ever read, never written
    /// by this crate.
    Legacy(String),
    /// Salted one-way verifier.
    Hashed(EncodedHash),
}

impl Credential {
    /// Classify a raw, untagged stored string once, at import time.
    ///
    /// A complete PHC string (salt and digest present) or a `$<alg>$` prefix
    /// naming a known hash family is treated as hashed, and may still turn out
    /// malformed. Everything else is legacy plaintext, including passwords that
    /// merely start with `$`. A corrupted hash whose algorithm tag was itself
    /// damaged is therefore read as plaintext.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if looks_hashed(&raw) {
            Credential::Hashed(EncodedHash(raw))
        } else {
            Credential::Legacy(raw)
        }
    }

    pub fn format(&self) -> CredentialFormat {
        match self {
            Credential::Legacy(_) => CredentialFormat::Legacy,
            Credential::Hashed(_) => CredentialFormat::Hashed,
        }
    }

    pub fn is_hashed(&self) -> bool {
        matches!(self, Credential::Hashed(_))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Legacy(_) => f.write_str("Legacy([REDACTED])"),
            Credential::Hashed(h) => f.debug_tuple("Hashed").field(h).finish(),
        }
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(tag = "format", content = "value", rename_all = "snake_case")]
        enum Tagged {
            Legacy(String),
            Hashed(EncodedHash),
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Tagged(Tagged),
            Raw(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Tagged(Tagged::Legacy(plain)) => Credential::Legacy(plain),
            Repr::Tagged(Tagged::Hashed(hash)) => Credential::Hashed(hash),
            Repr::Raw(raw) => Credential::from_stored(raw),
        })
    }
}

/// Algorithm tags of hash families found in imported data
const KNOWN_ALGORITHMS: [&str; 12] = [
    "argon2id", "argon2i", "argon2d", "scrypt", "pbkdf2", "pbkdf2-sha256", "pbkdf2-sha512",
    "2a", "2b", "2y", "5", "6",
];

fn looks_hashed(raw: &str) -> bool {
    let Some(rest) = raw.strip_prefix('$') else {
        return false;
    };
    if PasswordHash::new(raw).is_ok_and(|h| h.salt.is_some() && h.hash.is_some()) {
        return true;
    }
    rest.split_once('$')
        .is_some_and(|(algorithm, _)| KNOWN_ALGORITHMS.contains(&algorithm))
}

/// Storage format tag of a [`Credential`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFormat {
    Legacy,
    Hashed,
}

impl fmt::Display for CredentialFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialFormat::Legacy => f.write_str("legacy"),
            CredentialFormat::Hashed => f.write_str("hashed"),
        }
    }
}

/// Result of checking a candidate secret against a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Match,
    NoMatch,
    /// The stored value cannot be interpreted. Distinct from a wrong password.
    MalformedStoredValue,
}

/// Classification of a stored credential against the current hashing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    /// argon2id with the configured parameters.
    Current,
    /// A recognized hash produced with another algorithm or cost.
    Outdated,
    /// Plaintext from before hashing was enforced.
    Legacy,
    /// Unparseable, truncated, or produced by an unknown algorithm.
    Malformed,
}

impl CredentialStatus {
    pub fn needs_rehash(self) -> bool {
        matches!(self, CredentialStatus::Legacy | CredentialStatus::Outdated)
    }
}

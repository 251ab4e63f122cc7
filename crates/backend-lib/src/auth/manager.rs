// ============================
// crates/backend-lib/src/auth/manager.rs
// ============================
//! Credential hashing, verification, format inspection and migration.
//!
//! Every operation here is synchronous, CPU-bound and free of shared mutable
//! state, so one manager can be cloned into as many blocking workers as needed.
use argon2::{
    password_hash::{
        rand_core::OsRng, Error as HashError, PasswordHash, PasswordHasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use scrypt::Scrypt;
use tracing::{debug, warn};

use super::credential::{
    Credential, CredentialError, CredentialStatus, EncodedHash, VerificationOutcome,
};
use crate::config::HashingSettings;

/// Turns plaintext secrets into stored verifiers and checks candidates against them.
#[derive(Clone)]
pub struct CredentialManager {
    argon2: Argon2<'static>,
    params: Params,
}

impl Default for CredentialManager {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
            params: Params::DEFAULT,
        }
    }
}

impl CredentialManager {
    /// Build a manager hashing with argon2id and the given cost parameters.
    pub fn new(settings: &HashingSettings) -> Result<Self, CredentialError> {
        let params = Params::new(
            settings.memory_kib,
            settings.iterations,
            settings.parallelism,
            None,
        )
        .map_err(|e| CredentialError::InvalidParams(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone()),
            params,
        })
    }

    /// Hash a plaintext secret with a fresh random salt.
    pub fn hash(&self, plaintext: &str) -> Result<Credential, CredentialError> {
        if plaintext.is_empty() {
            return Err(CredentialError::EmptySecret);
        }

        let salt = SaltString::generate(&mut OsRng);
        let encoded = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?
            .to_string();

        Ok(Credential::Hashed(EncodedHash::new(encoded)))
    }

    /// Check `candidate` against a stored credential.
    pub fn verify(&self, stored: &Credential, candidate: &str) -> VerificationOutcome {
        match stored {
            Credential::Legacy(plain) if plain.is_empty() => {
                VerificationOutcome::MalformedStoredValue
            },
            Credential::Legacy(plain) => {
                if super::constant_time_eq(plain.as_bytes(), candidate.as_bytes()) {
                    VerificationOutcome::Match
                } else {
                    VerificationOutcome::NoMatch
                }
            },
            Credential::Hashed(encoded) => self.verify_hashed(encoded, candidate),
        }
    }

    fn verify_hashed(&self, encoded: &EncodedHash, candidate: &str) -> VerificationOutcome {
        let Some(parsed) = encoded.parse() else {
            debug!("stored hash does not parse as a PHC string");
            return VerificationOutcome::MalformedStoredValue;
        };

        let result = match parsed.algorithm.as_str() {
            "argon2id" | "argon2i" | "argon2d" => {
                self.argon2.verify_password(candidate.as_bytes(), &parsed)
            },
            "scrypt" => Scrypt.verify_password(candidate.as_bytes(), &parsed),
            other => {
                warn!(algorithm = other, "stored hash uses an unknown algorithm");
                return VerificationOutcome::MalformedStoredValue;
            },
        };

        match result {
            Ok(()) => VerificationOutcome::Match,
            Err(HashError::Password) => VerificationOutcome::NoMatch,
            Err(e) => {
                debug!(error = %e, "stored hash could not be recomputed");
                VerificationOutcome::MalformedStoredValue
            },
        }
    }

    /// Produce a fresh credential for a secret the caller has already verified.
    ///
    /// Does not check `verified` against `stored`.
    pub fn rehash(&self, stored: &Credential, verified: &str) -> Result<Credential, CredentialError> {
        debug!(from = %stored.format(), "rehashing credential");
        self.hash(verified)
    }

    /// Classify a stored credential against the current hashing policy.
    pub fn inspect(&self, stored: &Credential) -> CredentialStatus {
        let encoded = match stored {
            Credential::Legacy(plain) if plain.is_empty() => return CredentialStatus::Malformed,
            Credential::Legacy(_) => return CredentialStatus::Legacy,
            Credential::Hashed(encoded) => encoded,
        };

        let Some(parsed) = encoded.parse() else {
            return CredentialStatus::Malformed;
        };

        match parsed.algorithm.as_str() {
            "argon2id" => match Params::try_from(&parsed) {
                Ok(params) if self.is_current(&parsed, &params) => CredentialStatus::Current,
                Ok(_) => CredentialStatus::Outdated,
                Err(_) => CredentialStatus::Malformed,
            },
            "argon2i" | "argon2d" => match Params::try_from(&parsed) {
                Ok(_) => CredentialStatus::Outdated,
                Err(_) => CredentialStatus::Malformed,
            },
            "scrypt" => match scrypt::Params::try_from(&parsed) {
                Ok(_) => CredentialStatus::Outdated,
                Err(_) => CredentialStatus::Malformed,
            },
            _ => CredentialStatus::Malformed,
        }
    }

    fn is_current(&self, parsed: &PasswordHash<'_>, params: &Params) -> bool {
        parsed.version == Some(Version::V0x13 as u32)
            && params.m_cost() == self.params.m_cost()
            && params.t_cost() == self.params.t_cost()
            && params.p_cost() == self.params.p_cost()
    }

    /// Plan the migration of a batch of stored credentials.
    ///
    /// Legacy plaintext is hashed in place. Values that cannot be recovered are
    /// reported for a forced reset rather than wrapped in a hash. A failure on
    /// one record never stops the batch.
    pub fn migrate_all<'a, K, I>(&self, records: I) -> MigrationPlan<K>
    where
        I: IntoIterator<Item = (K, &'a Credential)>,
    {
        let mut plan = MigrationPlan::default();

        for (key, stored) in records {
            match (self.inspect(stored), stored) {
                (CredentialStatus::Legacy, Credential::Legacy(plain)) => match self.hash(plain) {
                    Ok(hashed) => plan.upgrades.push((key, hashed)),
                    Err(e) => plan.failed.push((key, e)),
                },
                (CredentialStatus::Current, _) => plan.already_current.push(key),
                (CredentialStatus::Outdated, _) => plan.pending_upgrade.push(key),
                _ => plan.reset_required.push(key),
            }
        }

        plan
    }
}

/// Outcome of [`CredentialManager::migrate_all`], keyed by the caller's record ids.
#[derive(Debug)]
pub struct MigrationPlan<K> {
    /// Records whose legacy plaintext was hashed, with the replacement credential
    pub upgrades: Vec<(K, Credential)>,
    pub already_current: Vec<K>,
    /// Recognized hashes with an older algorithm or cost
    pub pending_upgrade: Vec<K>,
    /// Stored values that cannot be recovered; the owner must reset
    pub reset_required: Vec<K>,
    pub failed: Vec<(K, CredentialError)>,
}

impl<K> Default for MigrationPlan<K> {
    fn default() -> Self {
        Self {
            upgrades: Vec::new(),
            already_current: Vec::new(),
            pending_upgrade: Vec::new(),
            reset_required: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<K> MigrationPlan<K> {
    /// Number of credentials rehashed by this plan
    pub fn rehashed(&self) -> usize {
        self.upgrades.len()
    }

    pub fn total(&self) -> usize {
        self.upgrades.len()
            + self.already_current.len()
            + self.pending_upgrade.len()
            + self.reset_required.len()
            + self.failed.len()
    }
}

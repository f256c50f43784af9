use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::config::OtpSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("no code has been issued for this address")]
    NotFound,
    #[error("code has expired")]
    Expired,
    #[error("code does not match")]
    Mismatch,
    #[error("too many failed attempts")]
    TooManyAttempts,
}

#[derive(Debug, Clone)]
struct OtpEntry {
    code_hash: String,
    expires_at: DateTime<Utc>,
    failed_attempts: u32,
}

/// OtpStore
///
/// In-memory one-time-password store keyed by normalized email. Codes are
/// six digits, kept only as SHA-256 hashes, expire after the configured TTL
/// and are consumed by the first successful verification.
pub struct OtpStore {
    entries: DashMap<String, OtpEntry>,
    ttl: Duration,
    max_attempts: u32,
}

impl OtpStore {
    pub fn new(settings: &OtpSettings) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::seconds(settings.ttl_secs),
            max_attempts: settings.max_attempts,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a fresh code for `email`, replacing any outstanding one.
    ///
    /// Failed attempts carry over to the replacement while the previous code
    /// is still live, and an address locked out by too many failures gets no
    /// new code until the lock expires.
    pub fn issue(&self, email: &str) -> Result<String, OtpError> {
        self.issue_at(email, Utc::now())
    }

    pub fn issue_at(&self, email: &str, now: DateTime<Utc>) -> Result<String, OtpError> {
        self.purge_expired_at(now);

        let code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));
        let code_hash = hash_code(&code);
        let expires_at = now + self.ttl;

        match self.entries.entry(normalize_email(email)) {
            Entry::Occupied(mut slot) => {
                let previous = slot.get_mut();
                if previous.failed_attempts >= self.max_attempts {
                    return Err(OtpError::TooManyAttempts);
                }
                previous.code_hash = code_hash;
                previous.expires_at = expires_at;
            }
            Entry::Vacant(slot) => {
                slot.insert(OtpEntry {
                    code_hash,
                    expires_at,
                    failed_attempts: 0,
                });
            }
        }
        Ok(code)
    }

    /// Verifies and consumes the code for `email`.
    pub fn verify(&self, email: &str, code: &str) -> Result<(), OtpError> {
        self.verify_at(email, code, Utc::now())
    }

    pub fn verify_at(&self, email: &str, code: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        let code_hash = hash_code(code.trim());

        // The entry guard holds the shard lock from the check through the removal.
        let mut slot = match self.entries.entry(normalize_email(email)) {
            Entry::Occupied(slot) => slot,
            Entry::Vacant(_) => return Err(OtpError::NotFound),
        };

        if now >= slot.get().expires_at {
            slot.remove();
            return Err(OtpError::Expired);
        }

        let entry = slot.get_mut();
        if entry.failed_attempts >= self.max_attempts {
            return Err(OtpError::TooManyAttempts);
        }

        if entry.code_hash == code_hash {
            slot.remove();
            return Ok(());
        }

        // A locked entry stays until it expires so a re-issue cannot reset the count.
        entry.failed_attempts += 1;
        if entry.failed_attempts >= self.max_attempts {
            Err(OtpError::TooManyAttempts)
        } else {
            Err(OtpError::Mismatch)
        }
    }

    /// Drops every expired entry.
    pub fn purge_expired(&self) {
        self.purge_expired_at(Utc::now());
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) {
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> OtpStore {
        OtpStore::new(&OtpSettings {
            ttl_secs: 600,
            max_attempts: 3,
        })
    }

    #[test]
    fn code_is_six_digits() {
        let code = store().issue("a@example.org").unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn verify_succeeds_once() {
        let store = store();
        let code = store.issue("speaker@example.org").unwrap();
        assert_eq!(store.verify("speaker@example.org", &code), Ok(()));
        assert_eq!(
            store.verify("speaker@example.org", &code),
            Err(OtpError::NotFound)
        );
    }

    #[test]
    fn email_is_normalized() {
        let store = store();
        let code = store.issue("  Speaker@Example.org ").unwrap();
        assert_eq!(store.verify("speaker@example.org", &code), Ok(()));
    }

    #[test]
    fn expired_code_is_rejected_and_removed() {
        let store = store();
        let issued = Utc::now();
        let code = store.issue_at("late@example.org", issued).unwrap();

        let after_expiry = issued + Duration::seconds(600);
        assert_eq!(
            store.verify_at("late@example.org", &code, after_expiry),
            Err(OtpError::Expired)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn code_is_valid_just_before_expiry() {
        let store = store();
        let issued = Utc::now();
        let code = store.issue_at("early@example.org", issued).unwrap();
        let almost = issued + Duration::seconds(599);
        assert_eq!(store.verify_at("early@example.org", &code, almost), Ok(()));
    }

    #[test]
    fn repeated_mismatches_invalidate_the_code() {
        let store = store();
        let code = store.issue("guess@example.org").unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        assert_eq!(store.verify("guess@example.org", wrong), Err(OtpError::Mismatch));
        assert_eq!(store.verify("guess@example.org", wrong), Err(OtpError::Mismatch));
        assert_eq!(
            store.verify("guess@example.org", wrong),
            Err(OtpError::TooManyAttempts)
        );
        assert_eq!(
            store.verify("guess@example.org", &code),
            Err(OtpError::TooManyAttempts)
        );
    }

    #[test]
    fn failed_attempts_survive_reissue() {
        let store = store();
        let first = store.issue("guess@example.org").unwrap();
        let wrong = if first == "000000" { "111111" } else { "000000" };
        assert_eq!(store.verify("guess@example.org", wrong), Err(OtpError::Mismatch));
        assert_eq!(store.verify("guess@example.org", wrong), Err(OtpError::Mismatch));

        let second = store.issue("guess@example.org").unwrap();
        let wrong = if second == "000000" { "111111" } else { "000000" };
        assert_eq!(
            store.verify("guess@example.org", wrong),
            Err(OtpError::TooManyAttempts)
        );
        assert_eq!(
            store.issue("guess@example.org"),
            Err(OtpError::TooManyAttempts)
        );
    }

    #[test]
    fn lockout_ends_when_the_code_expires() {
        let store = store();
        let issued = Utc::now();
        let code = store.issue_at("locked@example.org", issued).unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };
        for _ in 0..3 {
            let _ = store.verify_at("locked@example.org", wrong, issued);
        }
        assert!(store.issue_at("locked@example.org", issued).is_err());

        let later = issued + Duration::seconds(601);
        assert!(store.issue_at("locked@example.org", later).is_ok());
    }

    #[test]
    fn concurrent_verification_succeeds_once() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        const THREADS: usize = 8;

        for _ in 0..200 {
            let store = Arc::new(store());
            let code = store.issue("race@example.org").unwrap();
            let barrier = Arc::new(Barrier::new(THREADS));

            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let store = Arc::clone(&store);
                    let barrier = Arc::clone(&barrier);
                    let code = code.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        store.verify("race@example.org", &code).is_ok()
                    })
                })
                .collect();

            let successes = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count();
            assert_eq!(successes, 1);
            assert!(store.is_empty());
        }
    }

    #[test]
    fn reissue_replaces_previous_code() {
        let store = store();
        let first = store.issue("twice@example.org").unwrap();
        let second = store.issue("twice@example.org").unwrap();
        if first != second {
            assert_eq!(
                store.verify("twice@example.org", &first),
                Err(OtpError::Mismatch)
            );
        }
        assert_eq!(store.verify("twice@example.org", &second), Ok(()));
    }

    #[test]
    fn issuing_purges_expired_entries() {
        let store = store();
        let long_ago = Utc::now() - Duration::hours(1);
        store.issue_at("stale@example.org", long_ago).unwrap();
        store.issue("fresh@example.org").unwrap();
        assert_eq!(store.len(), 1);
    }
}

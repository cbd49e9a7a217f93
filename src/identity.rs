//! Pseudonymous visitor identity.
//!
//! Votes must be deduplicated without accounts, so the identity of a
//! visitor is a salted SHA-256 digest of their network origin and agent
//! string. Stable per (origin, agent) pair — multiple people behind the
//! same NAT and browser build collide. That is the documented
//! privacy/accuracy trade-off, not a bug.

use sha2::{Digest, Sha256};

/// Fixed namespace salt mixed into every digest so the hashes cannot be
/// compared against digests produced by other deployments of the same
/// scheme.
const HASH_NAMESPACE: &str = "7a37826f-0628-4fcd-a084-3990c8427745";

/// Derive the hex-encoded identity hash for a visitor.
///
/// Deterministic, no I/O: the same (origin, agent) pair always yields the
/// same 64-char digest.
pub fn identity_hash(origin: &str, agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(HASH_NAMESPACE.as_bytes());
    hasher.update(b":");
    hasher.update(origin.as_bytes());
    hasher.update(b":");
    hasher.update(agent.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_hash() {
        let a = identity_hash("203.0.113.7", "Mozilla/5.0");
        let b = identity_hash("203.0.113.7", "Mozilla/5.0");
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_different_hash() {
        let a = identity_hash("203.0.113.7", "Mozilla/5.0");
        let b = identity_hash("203.0.113.8", "Mozilla/5.0");
        let c = identity_hash("203.0.113.7", "curl/8.0");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn hash_is_hex_sha256() {
        let h = identity_hash("ip", "agent");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn namespace_salt_is_included() {
        // An unsalted digest of "ip:agent" must not equal ours.
        let unsalted = hex::encode(Sha256::digest(b"ip:agent"));
        assert_ne!(identity_hash("ip", "agent"), unsalted);
    }
}

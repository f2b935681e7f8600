use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

// RFC 7636 unreserved set: ALPHA / DIGIT / "-" / "." / "_" / "~".
const UNRESERVED: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Default verifier length; RFC 7636 permits 43-128 characters.
pub const DEFAULT_VERIFIER_LENGTH: usize = 64;

/// PKCE code verifier and challenge pair (S256 method).
///
/// The verifier stays secret until the token exchange; the challenge is
/// public and travels with the authorization request.
#[derive(Debug, Clone)]
pub struct PkcePair {
    verifier: String,
    challenge: String,
}

impl PkcePair {
    /// Create a random verifier/challenge pair of the default length.
    pub fn generate() -> Self {
        Self::with_verifier_length(DEFAULT_VERIFIER_LENGTH)
    }

    pub fn with_verifier_length(length: usize) -> Self {
        let verifier = generate_verifier(length);
        let challenge = generate_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }
}

/// Draw `length` characters from the unreserved set using the thread-local
/// CSPRNG.
pub fn generate_verifier(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| UNRESERVED[rng.gen_range(0..UNRESERVED.len())] as char)
        .collect()
}

/// `base64url(SHA-256(verifier))` without padding.
pub fn generate_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn verifier_length_and_charset() {
        let pair = PkcePair::generate();
        assert_eq!(pair.verifier().len(), DEFAULT_VERIFIER_LENGTH);
        assert!(pair.verifier().len() >= 43 && pair.verifier().len() <= 128);
        assert!(pair
            .verifier()
            .bytes()
            .all(|b| UNRESERVED.contains(&b)));
    }

    #[test]
    fn custom_verifier_length() {
        assert_eq!(generate_verifier(43).len(), 43);
        assert_eq!(generate_verifier(128).len(), 128);
    }

    #[test]
    fn challenge_matches_rfc7636_vector() {
        // Appendix B of RFC 7636.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            generate_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn challenge_is_unpadded_base64url() {
        let pair = PkcePair::generate();
        assert_eq!(pair.challenge().len(), 43);
        assert!(!pair.challenge().contains('='));
        assert!(!pair.challenge().contains('+'));
        assert!(!pair.challenge().contains('/'));
    }

    #[test]
    fn pairs_are_unique_across_generations() {
        let mut verifiers = HashSet::new();
        for _ in 0..100 {
            assert!(verifiers.insert(PkcePair::generate().verifier().to_owned()));
        }
    }

    #[test]
    fn pair_is_stable_across_reads() {
        let pair = PkcePair::generate();
        let verifier = pair.verifier().to_owned();
        let challenge = pair.challenge().to_owned();
        assert_eq!(pair.verifier(), verifier);
        assert_eq!(pair.challenge(), challenge);
        assert_eq!(generate_challenge(pair.verifier()), challenge);
    }
}

//! Polling token generation.
//!
//! Tokens are short alphanumeric strings handed to clients at submission
//! time and used for all subsequent polling. Uniqueness is NOT guaranteed
//! here; the status repository enforces it atomically on insert and asks
//! for a fresh token on collision.

use rand::Rng;

use crate::defaults::{TOKEN_ALPHABET, TOKEN_LENGTH};

/// Generate a random polling token (`[A-Za-z0-9]{6}`).
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..TOKEN_ALPHABET.len());
            TOKEN_ALPHABET[idx] as char
        })
        .collect()
}

/// Check that a string has the shape of a polling token.
///
/// Used by the API to reject malformed tokens before hitting the store.
pub fn is_valid_token(s: &str) -> bool {
    s.len() == TOKEN_LENGTH && s.bytes().all(|b| TOKEN_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_length() {
        assert_eq!(generate_token().len(), TOKEN_LENGTH);
    }

    #[test]
    fn test_token_charset() {
        for _ in 0..100 {
            let token = generate_token();
            assert!(
                token.bytes().all(|b| b.is_ascii_alphanumeric()),
                "non-alphanumeric token: {}",
                token
            );
        }
    }

    #[test]
    fn test_tokens_vary() {
        // 62^6 possible tokens; 50 draws colliding would indicate a
        // broken RNG, not bad luck.
        let tokens: std::collections::HashSet<String> =
            (0..50).map(|_| generate_token()).collect();
        assert!(tokens.len() > 45);
    }

    #[test]
    fn test_is_valid_token() {
        assert!(is_valid_token(&generate_token()));
        assert!(is_valid_token("aB3xY9"));
        assert!(!is_valid_token("short"));
        assert!(!is_valid_token("toolong1"));
        assert!(!is_valid_token("aB3xY!"));
        assert!(!is_valid_token(""));
    }
}

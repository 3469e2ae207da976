//! Secret tokens and the topics derived from them.
//!
//! A doorbell is identified by a random token shared in its link. Peers
//! never rendezvous on the token itself; they use a topic derived by hashing
//! it, so relays and discovery infrastructure never see the secret.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use doorbell_proto::SessionTopic;
use sha2::{Digest, Sha256};

use crate::env::Environment;

/// Random bytes in a token.
pub const TOKEN_BYTES: usize = 32;

/// Length of a base64url-encoded token.
pub const TOKEN_LENGTH: usize = 43;

/// Hash bytes kept in a topic id (128 bits).
pub const TOPIC_ID_BYTES: usize = 16;

/// Prefix of every derived topic.
pub const TOPIC_ID_PREFIX: &str = "doorbell";

/// Path prefix of a shareable ring link.
pub const RING_PATH_PREFIX: &str = "/ring/";

/// Generate a fresh secret token.
pub fn generate_token<E: Environment>(env: &E) -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    env.random_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Whether `token` has the shape of a generated token.
pub fn is_valid_token(token: &str) -> bool {
    if token.len() != TOKEN_LENGTH {
        return false;
    }
    if !token.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
        return false;
    }
    URL_SAFE_NO_PAD.decode(token).is_ok_and(|bytes| bytes.len() == TOKEN_BYTES)
}

/// Derive the rendezvous topic for `token`.
pub fn derive_topic(token: &str) -> SessionTopic {
    let digest = Sha256::digest(token.as_bytes());
    SessionTopic::new(format!("{TOPIC_ID_PREFIX}-{}", hex::encode(&digest[..TOPIC_ID_BYTES])))
}

/// Shareable link path for `token` (`/ring/<token>`).
pub fn ring_path(token: &str) -> String {
    format!("{RING_PATH_PREFIX}{token}")
}

/// Extract the token from a ring link path (`/ring/<token>`).
pub fn token_from_ring_path(path: &str) -> Option<&str> {
    path.strip_prefix(RING_PATH_PREFIX).filter(|token| is_valid_token(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::test_env::TestEnv;

    #[test]
    fn generated_tokens_are_valid() {
        let env = TestEnv::new();
        let token = generate_token(&env);
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(is_valid_token(&token));
        assert_ne!(generate_token(&env), token);
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        assert!(!is_valid_token(""));
        assert!(!is_valid_token(&"a".repeat(TOKEN_LENGTH - 1)));
        assert!(!is_valid_token(&format!("{}+", "a".repeat(TOKEN_LENGTH - 1))));
    }

    #[test]
    fn topic_is_stable_and_prefixed() {
        let topic = derive_topic("secret");
        assert_eq!(topic, derive_topic("secret"));
        assert_ne!(topic, derive_topic("other"));

        let hex_part = topic.as_str().strip_prefix("doorbell-").unwrap();
        assert_eq!(hex_part.len(), TOPIC_ID_BYTES * 2);
        // sha256("secret") begins 2bb80d53
        assert!(hex_part.starts_with("2bb80d53"));
    }

    #[test]
    fn ring_path_extraction() {
        let token = generate_token(&TestEnv::new());
        assert_eq!(ring_path(&token), format!("/ring/{token}"));
        assert_eq!(token_from_ring_path(&ring_path(&token)), Some(token.as_str()));
        assert_eq!(token_from_ring_path(&format!("/doorbell/{token}")), None);
        assert_eq!(token_from_ring_path("/ring/short"), None);
    }
}

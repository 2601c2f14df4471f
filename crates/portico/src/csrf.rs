//! One-time form tokens kept in the session.
//!
//! Each form name has its own list of live tokens under `csrf_tokens/<form>`.
//! A token is accepted once; at most [`MAX_TOKENS_PER_FORM`] stay live.

use crate::session::Session;
use rand::RngCore;

pub const MAX_TOKENS_PER_FORM: usize = 10;

const TOKEN_BYTES: usize = 32;

fn session_key(form: &str) -> String {
    format!("csrf_tokens/{}", form)
}

/// Issue a token for `form` and remember it in the session
pub fn generate_token(session: &mut Session, form: &str) -> String {
    let key = session_key(form);
    let mut tokens: Vec<String> = session.get_or(&key, Vec::new());

    while tokens.len() >= MAX_TOKENS_PER_FORM {
        tokens.remove(0);
    }

    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);

    tokens.push(token.clone());
    session.set(key, tokens);

    token
}

/// Accept `token` for `form` once, consuming it
pub fn check_token(session: &mut Session, form: &str, token: &str) -> bool {
    let key = session_key(form);
    let mut tokens: Vec<String> = session.get_or(&key, Vec::new());

    match tokens.iter().position(|t| t == token) {
        Some(pos) => {
            tokens.remove(pos);
            session.set(key, tokens);
            true
        }
        None => {
            tracing::warn!(form = %form, "Rejected CSRF token");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_tokens(session: &Session, form: &str) -> Vec<String> {
        session.get_or(&session_key(form), Vec::new())
    }

    #[tokio::test]
    async fn test_tokens_are_distinct_and_stored() {
        let mut session = Session::detached().await;
        let first = generate_token(&mut session, "status/post");
        let second = generate_token(&mut session, "status/post");

        assert_ne!(first, second);
        assert_eq!(first.len(), TOKEN_BYTES * 2);
        assert_eq!(live_tokens(&session, "status/post"), vec![first, second]);
    }

    #[tokio::test]
    async fn test_check_consumes_only_matching_token() {
        let mut session = Session::detached().await;
        let first = generate_token(&mut session, "status/post");
        let second = generate_token(&mut session, "status/post");

        assert!(check_token(&mut session, "status/post", &second));
        assert_eq!(live_tokens(&session, "status/post"), vec![first.clone()]);

        assert!(!check_token(&mut session, "status/post", &second));
        assert!(check_token(&mut session, "status/post", &first));
    }

    #[tokio::test]
    async fn test_tokens_are_scoped_by_form() {
        let mut session = Session::detached().await;
        let token = generate_token(&mut session, "account/signin");

        assert!(!check_token(&mut session, "account/signup", &token));
        assert!(check_token(&mut session, "account/signin", &token));
    }

    #[tokio::test]
    async fn test_oldest_token_is_evicted() {
        let mut session = Session::detached().await;
        let tokens: Vec<String> = (0..MAX_TOKENS_PER_FORM + 1)
            .map(|_| generate_token(&mut session, "f"))
            .collect();

        let live = live_tokens(&session, "f");
        assert_eq!(live.len(), MAX_TOKENS_PER_FORM);
        assert_eq!(live[..], tokens[1..]);

        assert!(!check_token(&mut session, "f", &tokens[0]));
        assert!(check_token(&mut session, "f", &tokens[MAX_TOKENS_PER_FORM]));
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let mut session = Session::detached().await;
        assert!(!check_token(&mut session, "f", ""));
        assert!(!check_token(&mut session, "f", "deadbeef"));
    }
}

// CSRF protection
// One random token per session, echoed back by every POST form

use tower_sessions::Session;
use uuid::Uuid;

use crate::error::AppError;

pub const CSRF_SESSION_KEY: &str = "csrf_token";

/// Returns the session's token, minting one on first use.
pub async fn csrf_token(session: &Session) -> Result<String, AppError> {
    if let Some(token) = session.get::<String>(CSRF_SESSION_KEY).await? {
        return Ok(token);
    }

    let token = Uuid::new_v4().simple().to_string();
    session.insert(CSRF_SESSION_KEY, &token).await?;
    Ok(token)
}

pub async fn verify_csrf(session: &Session, submitted: &str) -> Result<(), AppError> {
    let expected = session.get::<String>(CSRF_SESSION_KEY).await?;

    match expected {
        Some(expected) if !submitted.is_empty() && tokens_match(&expected, submitted) => Ok(()),
        _ => Err(AppError::Csrf),
    }
}

// Compares every byte so timing does not reveal the matching prefix length.
fn tokens_match(expected: &str, submitted: &str) -> bool {
    expected.len() == submitted.len()
        && expected
            .bytes()
            .zip(submitted.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc123", "abc123"));
        assert!(!tokens_match("abc123", "abc124"));
        assert!(!tokens_match("abc123", "abc12"));
        assert!(!tokens_match("abc123", ""));
    }
}

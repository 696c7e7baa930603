//! API handlers and shared validation helpers.

pub mod auth;
pub mod health;
pub mod types;

use regex::Regex;

/// Lightweight email sanity check used by auth handlers before hitting
/// the store.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[cfg(test)]
mod tests {
    use super::valid_email;

    #[test]
    fn valid_email_accepts_simple() {
        assert!(valid_email("user@example.com"));
    }

    #[test]
    fn valid_email_rejects_missing_at() {
        assert!(!valid_email("user.example.com"));
    }

    #[test]
    fn valid_email_rejects_whitespace() {
        assert!(!valid_email("user @example.com"));
    }

    #[test]
    fn valid_email_rejects_missing_tld() {
        assert!(!valid_email("user@example"));
    }
}

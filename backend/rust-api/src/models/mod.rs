use lazy_static::lazy_static;
use regex::Regex;

pub mod completion;
pub mod joined;
pub mod quiz;
pub mod stats;

pub use completion::{Completion, CompletionPayload, NewCompletion};
pub use joined::{JoinedRow, QuizColumns};
pub use quiz::{NewQuizSubmission, QuizAnswers, QuizPayload, QuizSubmission};
pub use stats::CompletionStats;

lazy_static! {
    /// Two-part `local@domain.tld` shape accepted for participant emails.
    pub static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shape() {
        assert!(EMAIL_RE.is_match("a@b.com"));
        assert!(EMAIL_RE.is_match("first.last@sub.example.org"));

        assert!(!EMAIL_RE.is_match("plainaddress"));
        assert!(!EMAIL_RE.is_match("missing@tld"));
        assert!(!EMAIL_RE.is_match("two@@example.com"));
        assert!(!EMAIL_RE.is_match("spaces in@example.com"));
        assert!(!EMAIL_RE.is_match(""));
    }
}

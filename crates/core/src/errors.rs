use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid conversation identity: {0}")]
    InvalidIdentity(String),
}

/// A rejected inbound request as reported to the caller. The detail is for logs; callers
/// only ever see [`InterfaceError::user_message`] and the correlation id.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("rejected request {correlation_id}: {detail}")]
pub struct InterfaceError {
    detail: String,
    correlation_id: String,
}

impl InterfaceError {
    pub fn rejected(error: &DomainError, correlation_id: impl Into<String>) -> Self {
        Self { detail: error.to_string(), correlation_id: correlation_id.into() }
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn user_message(&self) -> &'static str {
        "The request could not be processed. Check inputs and try again."
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::conversation::ConversationId;
    use crate::errors::{DomainError, InterfaceError};

    #[test]
    fn blank_identity_is_rejected_with_the_request_correlation_id() {
        let error = ConversationId::parse(" \t ").expect_err("blank identity");
        let interface = InterfaceError::rejected(&error, "req-1");

        assert_eq!(interface.correlation_id(), "req-1");
        assert_eq!(interface.detail(), "invalid conversation identity: conversation identity is blank");
    }

    #[test]
    fn user_message_never_echoes_the_detail() {
        let interface =
            InterfaceError::rejected(&DomainError::InvalidIdentity("+57 300 111 2233".to_owned()), "req-2");

        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
        assert!(!interface.user_message().contains("2233"));
        assert!(interface.to_string().contains("req-2"));
    }
}

use reqwest::StatusCode;
use thiserror::Error;

/// Failure taxonomy for chat-completion calls.
///
/// Every variant has a fixed, user-facing text available through
/// [`ChatError::user_message`]; the `Display` impl carries the technical
/// detail meant for logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Azure OpenAI configuration is incomplete (missing: {})", .0.join(", "))]
    ConfigurationMissing(Vec<&'static str>),

    #[error("Authentication failed (HTTP 401)")]
    AuthenticationFailed,

    #[error("Deployment not found (HTTP 404)")]
    EndpointNotFound,

    #[error("Bad request (HTTP 400): {0}")]
    BadRequest(String),

    #[error("Rate limited (HTTP 429)")]
    RateLimited,

    #[error("Service unavailable (HTTP {0})")]
    ServiceUnavailable(u16),

    #[error("No response received: {0}")]
    NoResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;

impl ChatError {
    /// Map a non-success HTTP status to its taxonomy entry.
    pub fn from_status(status: StatusCode, body: impl Into<String>) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(body.into()),
            401 => Self::AuthenticationFailed,
            404 => Self::EndpointNotFound,
            429 => Self::RateLimited,
            code if code >= 500 => Self::ServiceUnavailable(code),
            _ => Self::Transport(format!("unexpected status {}: {}", status, body.into())),
        }
    }

    /// Classify a reqwest failure raised before any response arrived.
    pub fn from_send_error(error: &reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() {
            Self::NoResponse(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }

    /// Short text suitable for showing in the chat panel.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ConfigurationMissing(_) => {
                "I'm having trouble connecting to my AI services. Please check your Azure OpenAI configuration in the Settings page."
            }
            Self::AuthenticationFailed => {
                "Authentication failed. Please check your Azure OpenAI API key in the Settings page."
            }
            Self::EndpointNotFound => {
                "Could not find the specified Azure OpenAI deployment. Please check your endpoint and deployment name in the Settings page."
            }
            Self::BadRequest(_) => {
                "The AI service rejected the request. Please try rephrasing your message."
            }
            Self::RateLimited => {
                "The AI service is receiving too many requests right now. Please wait a moment and try again."
            }
            Self::ServiceUnavailable(_) => {
                "The AI service is currently unavailable. Please try again later."
            }
            Self::NoResponse(_) => {
                "No response was received from the AI service. Please check your network connection and try again."
            }
            Self::Transport(_) => {
                "I'm sorry, I encountered an error while processing your request. Please try again."
            }
        }
    }

    /// Stable identifier used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigurationMissing(_) => "configuration_missing",
            Self::AuthenticationFailed => "authentication_failed",
            Self::EndpointNotFound => "endpoint_not_found",
            Self::BadRequest(_) => "bad_request",
            Self::RateLimited => "rate_limited",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::NoResponse(_) => "no_response",
            Self::Transport(_) => "transport_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ChatError::from_status(StatusCode::UNAUTHORIZED, ""),
            ChatError::AuthenticationFailed
        );
        assert_eq!(
            ChatError::from_status(StatusCode::NOT_FOUND, ""),
            ChatError::EndpointNotFound
        );
        assert_eq!(
            ChatError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ChatError::RateLimited
        );
        assert_eq!(
            ChatError::from_status(StatusCode::BAD_GATEWAY, ""),
            ChatError::ServiceUnavailable(502)
        );
        assert_eq!(
            ChatError::from_status(StatusCode::BAD_REQUEST, "max_tokens too large"),
            ChatError::BadRequest("max_tokens too large".to_string())
        );
    }

    #[test]
    fn test_unlisted_status_is_transport_error() {
        let err = ChatError::from_status(StatusCode::FORBIDDEN, "nope");
        assert_eq!(err.kind(), "transport_error");
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn test_configuration_missing_lists_fields() {
        let err = ChatError::ConfigurationMissing(vec!["api_key", "endpoint"]);
        assert_eq!(
            err.to_string(),
            "Azure OpenAI configuration is incomplete (missing: api_key, endpoint)"
        );
        assert!(err.user_message().contains("Settings page"));
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Failure taxonomy shared by the relay endpoints and the CLI.
///
/// Every upstream fault is caught locally and translated into one of these;
/// raw transport errors never reach a client.
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    /// Required configuration is absent. Reported before any outbound call
    /// is attempted; never fatal to the process.
    #[error("{0} not configured")]
    Configuration(&'static str),

    /// A required request field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The execution or LLM service answered with a non-success status.
    #[error("upstream responded with {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// The upstream response was syntactically valid HTTP but semantically
    /// unusable (missing token, undecodable payload, invalid base64).
    #[error("malformed upstream response: {0}")]
    UpstreamFormat(String),

    /// Connection-level failure before a response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The poll budget was exhausted without observing a terminal status.
    #[error("execution did not reach a terminal status after {attempts} attempts")]
    Timeout { attempts: u32 },
}

impl RelayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn upstream_format(msg: impl Into<String>) -> Self {
        Self::UpstreamFormat(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_message_matches_wire_contract() {
        let err = RelayError::Configuration("Judge0 URL");
        assert_eq!(err.to_string(), "Judge0 URL not configured");
    }

    #[test]
    fn test_upstream_message_includes_status_and_body() {
        let err = RelayError::UpstreamStatus {
            status: 503,
            body: "queue full".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("503"));
        assert!(text.contains("queue full"));
    }

    #[test]
    fn test_timeout_is_distinct_from_upstream_failures() {
        let err = RelayError::Timeout { attempts: 40 };
        assert!(err.to_string().contains("40 attempts"));
    }
}

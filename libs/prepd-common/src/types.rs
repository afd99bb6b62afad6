use serde::{Deserialize, Deserializer, Serialize};

/// Lowest Judge0 status id that is terminal.
/// 1 = In Queue, 2 = Processing, everything at or above 3 (Accepted, Wrong
/// Answer, limit/runtime/compile errors, internal errors) is final.
pub const TERMINAL_STATUS_ID: i64 = 3;

/// A single code execution request, as sent to the execution service.
/// Immutable once created; identified afterwards by the token the
/// execution service assigns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub source_code: String,
    pub language_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_line_arguments: Option<String>,
}

impl Submission {
    pub fn new(source_code: impl Into<String>, language_id: u32) -> Self {
        Self {
            source_code: source_code.into(),
            language_id,
            stdin: None,
            command_line_arguments: None,
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }
}

/// Execution status as reported by the execution service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StatusInfo {
    /// A terminal status will never change on subsequent polls.
    pub fn is_terminal(&self) -> bool {
        self.id >= TERMINAL_STATUS_ID
    }
}

/// Decoded result of one submission. The text fields arrive base64-encoded
/// from the execution service and are decoded exactly once by the relay;
/// absent fields stay absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: StatusInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Entry of the execution service's language catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

impl LanguageInfo {
    pub fn is_archived(&self) -> bool {
        self.is_archived.unwrap_or(false)
    }
}

/// One input/expected-output pair supplied by question generation.
///
/// Question generation is an LLM and occasionally emits numbers or nested
/// values where text is expected, so both fields stringify non-string JSON
/// on deserialization instead of rejecting the case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(deserialize_with = "string_or_stringify")]
    pub input: String,
    #[serde(deserialize_with = "string_or_stringify")]
    pub expected_output: String,
}

/// Outcome of one test case run by the batch runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub passed: bool,
    pub input: String,
    pub expected_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a conversation; append-only within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A generated practice problem: markdown statement plus extracted cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub test_cases: Vec<TestCase>,
}

/// Verbosity grade for AI feedback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelpLevel {
    Easy,
    #[default]
    Medium,
    Hard,
}

fn string_or_stringify<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_threshold() {
        let queued = StatusInfo {
            id: 1,
            description: Some("In Queue".to_string()),
        };
        let processing = StatusInfo {
            id: 2,
            description: Some("Processing".to_string()),
        };
        let accepted = StatusInfo {
            id: 3,
            description: Some("Accepted".to_string()),
        };
        let internal_error = StatusInfo {
            id: 13,
            description: None,
        };

        assert!(!queued.is_terminal());
        assert!(!processing.is_terminal());
        assert!(accepted.is_terminal());
        assert!(internal_error.is_terminal());
    }

    #[test]
    fn test_test_case_camel_case_wire_format() {
        let case: TestCase =
            serde_json::from_str(r#"{"input":"3\n4\n","expectedOutput":"7"}"#).unwrap();
        assert_eq!(case.input, "3\n4\n");
        assert_eq!(case.expected_output, "7");

        let json = serde_json::to_string(&case).unwrap();
        assert!(json.contains("expectedOutput"));
    }

    #[test]
    fn test_test_case_stringifies_non_string_values() {
        let case: TestCase =
            serde_json::from_str(r#"{"input":42,"expectedOutput":[1,2]}"#).unwrap();
        assert_eq!(case.input, "42");
        assert_eq!(case.expected_output, "[1,2]");
    }

    #[test]
    fn test_test_result_omits_absent_fields() {
        let result = TestResult {
            passed: false,
            input: "1".to_string(),
            expected_output: "2".to_string(),
            actual_output: None,
            stderr: None,
            error: Some("Submission failed".to_string()),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("actualOutput"));
        assert!(!json.contains("stderr"));
        assert!(json.contains("Submission failed"));
    }

    #[test]
    fn test_help_level_default_and_wire_format() {
        assert_eq!(HelpLevel::default(), HelpLevel::Medium);
        let level: HelpLevel = serde_json::from_str(r#""hard""#).unwrap();
        assert_eq!(level, HelpLevel::Hard);
    }

    #[test]
    fn test_execution_result_tolerates_sparse_payload() {
        let result: ExecutionResult =
            serde_json::from_str(r#"{"status":{"id":2,"description":"Processing"}}"#).unwrap();
        assert_eq!(result.status.id, 2);
        assert!(result.stdout.is_none());
        assert!(result.stderr.is_none());
    }
}

// Execution Relay: client for the Judge0-compatible sandbox service.
//
// Source code and stdin are base64-encoded on the way out; the four text
// fields of a result (stdout, stderr, compile_output, message) are decoded
// on the way back. The relay keeps no state: one outbound call per
// operation, every fault mapped into RelayError.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use prepd_common::types::{ExecutionResult, LanguageInfo, StatusInfo, Submission};
use prepd_common::{Config, RelayError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub struct JudgeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    rapidapi_host: Option<String>,
    languages_path: String,
}

/// Submission body as the execution service expects it: text fields
/// pre-encoded, optional fields omitted.
#[derive(Debug, Serialize)]
struct EncodedSubmission {
    source_code: String,
    language_id: u32,
    stdin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    command_line_arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Raw result as returned with `base64_encoded=true`.
#[derive(Debug, Deserialize)]
struct EncodedResult {
    status: StatusInfo,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    compile_output: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    memory: Option<f64>,
    #[serde(default)]
    token: Option<String>,
}

impl EncodedResult {
    fn decode(self) -> Result<ExecutionResult> {
        Ok(ExecutionResult {
            status: self.status,
            stdout: decode_field(self.stdout)?,
            stderr: decode_field(self.stderr)?,
            compile_output: decode_field(self.compile_output)?,
            message: decode_field(self.message)?,
            time: self.time,
            memory: self.memory,
            token: self.token,
        })
    }
}

impl JudgeClient {
    /// Fails with a configuration error when the base URL is unset, before
    /// any outbound call is attempted.
    pub fn from_config(config: &Config, http: reqwest::Client) -> Result<Self> {
        let base_url = config.judge_base_url()?.to_string();
        Ok(Self {
            http,
            base_url,
            api_key: config.judge_api_key.clone(),
            rapidapi_host: config.rapidapi_host.clone(),
            languages_path: config.judge_languages_path.clone(),
        })
    }

    fn headers(&self) -> HeaderMap {
        build_headers(self.api_key.as_deref(), self.rapidapi_host.as_deref())
    }

    /// Submit code for asynchronous execution and return the token the
    /// service assigned.
    pub async fn submit(&self, submission: &Submission) -> Result<String> {
        let url = format!(
            "{}/submissions?base64_encoded=true&wait=false",
            self.base_url
        );
        let response = self
            .http
            .post(&url)
            .headers(self.headers())
            .json(&encode_submission(submission))
            .send()
            .await
            .map_err(transport)?;

        let response = check_status(response).await?;
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| RelayError::upstream_format(e.to_string()))?;

        let token = body
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RelayError::upstream_format("no token in submission response"))?;
        debug!(token = %token, "submission accepted");
        Ok(token)
    }

    /// Submit code and block until the execution service reports the
    /// terminal result. Used by the batch test runner.
    pub async fn submit_and_wait(&self, submission: &Submission) -> Result<ExecutionResult> {
        let url = format!("{}/submissions?base64_encoded=true&wait=true", self.base_url);
        let response = self
            .http
            .post(&url)
            .headers(self.headers())
            .json(&encode_submission(submission))
            .send()
            .await
            .map_err(transport)?;

        let response = check_status(response).await?;
        let raw: EncodedResult = response
            .json()
            .await
            .map_err(|e| RelayError::upstream_format(e.to_string()))?;
        raw.decode()
    }

    /// Fetch and decode the current result for a token. The result is not
    /// necessarily terminal; callers inspect `status.is_terminal()`.
    pub async fn fetch_result(&self, token: &str) -> Result<ExecutionResult> {
        let url = format!(
            "{}/submissions/{}?base64_encoded=true",
            self.base_url, token
        );
        let response = self
            .http
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(transport)?;

        let response = check_status(response).await?;
        let raw: EncodedResult = response
            .json()
            .await
            .map_err(|e| RelayError::upstream_format(e.to_string()))?;
        raw.decode()
    }

    /// Pass-through of the service's language catalog. Archived entries are
    /// included; callers filter them.
    pub async fn list_languages(&self) -> Result<Vec<LanguageInfo>> {
        let url = format!("{}{}", self.base_url, self.languages_path);
        let response = self
            .http
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(transport)?;

        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| RelayError::upstream_format(e.to_string()))
    }
}

/// Auth headers are a pure function of the configured credentials: a
/// RapidAPI key/host pair when a host is set, a single auth-token header
/// when only a key is set, nothing otherwise.
pub fn build_headers(api_key: Option<&str>, rapidapi_host: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let Some(key) = api_key else {
        return headers;
    };
    let Ok(key_value) = HeaderValue::from_str(key) else {
        return headers;
    };
    match rapidapi_host.and_then(|h| HeaderValue::from_str(h).ok()) {
        Some(host_value) => {
            headers.insert(HeaderName::from_static("x-rapidapi-key"), key_value);
            headers.insert(HeaderName::from_static("x-rapidapi-host"), host_value);
        }
        None => {
            headers.insert(HeaderName::from_static("x-auth-token"), key_value);
        }
    }
    headers
}

fn encode_submission(submission: &Submission) -> EncodedSubmission {
    EncodedSubmission {
        source_code: encode(&submission.source_code),
        language_id: submission.language_id,
        stdin: submission.stdin.as_deref().map(encode).unwrap_or_default(),
        command_line_arguments: submission.command_line_arguments.as_deref().map(encode),
    }
}

pub fn encode(text: &str) -> String {
    BASE64.encode(text.as_bytes())
}

/// Decode one transport-encoded text field. Absent stays absent; an empty
/// string decodes to an empty string.
pub fn decode_field(field: Option<String>) -> Result<Option<String>> {
    match field {
        None => Ok(None),
        Some(encoded) => {
            // The service line-wraps long payloads; the wrapping is not
            // part of the encoding.
            let compact: String = encoded.split_whitespace().collect();
            let bytes = BASE64
                .decode(compact.as_bytes())
                .map_err(|e| RelayError::upstream_format(format!("invalid base64: {e}")))?;
            Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RelayError::UpstreamStatus {
        status: status.as_u16(),
        body,
    })
}

fn transport(e: reqwest::Error) -> RelayError {
    RelayError::Transport(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_with_rapidapi_host() {
        let headers = build_headers(Some("secret"), Some("judge0-ce.p.rapidapi.com"));
        assert_eq!(headers.get("x-rapidapi-key").unwrap(), "secret");
        assert_eq!(
            headers.get("x-rapidapi-host").unwrap(),
            "judge0-ce.p.rapidapi.com"
        );
        assert!(headers.get("x-auth-token").is_none());
    }

    #[test]
    fn test_headers_with_plain_key() {
        let headers = build_headers(Some("secret"), None);
        assert_eq!(headers.get("x-auth-token").unwrap(), "secret");
        assert!(headers.get("x-rapidapi-key").is_none());
    }

    #[test]
    fn test_headers_without_key() {
        let headers = build_headers(None, Some("ignored-without-key"));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_base64_round_trip() {
        for text in ["", "hi\n", "print('hi')", "日本語テキスト\n", "  spaced  "] {
            let decoded = decode_field(Some(encode(text))).unwrap();
            assert_eq!(decoded.as_deref(), Some(text));
        }
        assert!(decode_field(None).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        let err = decode_field(Some("not base64!!".to_string())).unwrap_err();
        assert!(matches!(err, RelayError::UpstreamFormat(_)));
    }

    #[test]
    fn test_encoded_result_decodes_text_fields() {
        let raw: EncodedResult = serde_json::from_value(serde_json::json!({
            "status": { "id": 3, "description": "Accepted" },
            "stdout": encode("hi\n"),
            "time": "0.002",
            "memory": 3212.0,
        }))
        .unwrap();

        let result = raw.decode().unwrap();
        assert_eq!(result.status.id, 3);
        assert!(result.status.is_terminal());
        assert_eq!(result.stdout.as_deref(), Some("hi\n"));
        assert!(result.stderr.is_none());
        assert!(result.compile_output.is_none());
        assert_eq!(result.time.as_deref(), Some("0.002"));
    }

    #[test]
    fn test_submission_encoding() {
        let submission = Submission::new("print('hi')", 71).with_stdin("3\n4\n");
        let encoded = encode_submission(&submission);
        assert_eq!(encoded.language_id, 71);
        assert_eq!(
            decode_field(Some(encoded.source_code)).unwrap().as_deref(),
            Some("print('hi')")
        );
        assert_eq!(
            decode_field(Some(encoded.stdin)).unwrap().as_deref(),
            Some("3\n4\n")
        );
        assert!(encoded.command_line_arguments.is_none());
    }

    #[test]
    fn test_submission_without_stdin_sends_empty_string() {
        let encoded = encode_submission(&Submission::new("pass", 71));
        assert_eq!(encoded.stdin, "");
    }
}

// Thin client for a running prepd-api backend.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use prepd_common::types::{
    ChatMessage, ExecutionResult, LanguageInfo, Question, TestCase, TestResult,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::poller::ResultSource;

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct ResultsBody {
    results: Vec<TestResult>,
}

#[derive(Deserialize)]
struct MessageBody {
    message: String,
}

#[derive(Deserialize)]
struct StreamPayload {
    content: String,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn submit(
        &self,
        source_code: &str,
        language_id: u32,
        stdin: Option<&str>,
    ) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/api/submissions", self.base_url))
            .json(&json!({
                "source_code": source_code,
                "language_id": language_id,
                "stdin": stdin,
            }))
            .send()
            .await
            .context("failed to reach prepd-api")?;

        let body: TokenResponse = read_json(response).await?;
        Ok(body.token)
    }

    pub async fn result(&self, token: &str) -> Result<ExecutionResult> {
        let response = self
            .http
            .get(format!("{}/api/submissions/{}", self.base_url, token))
            .send()
            .await
            .context("failed to reach prepd-api")?;
        read_json(response).await
    }

    pub async fn languages(&self) -> Result<Vec<LanguageInfo>> {
        let response = self
            .http
            .get(format!("{}/api/languages", self.base_url))
            .send()
            .await
            .context("failed to reach prepd-api")?;
        read_json(response).await
    }

    pub async fn run_tests(
        &self,
        source_code: &str,
        language_id: u32,
        cases: &[TestCase],
    ) -> Result<Vec<TestResult>> {
        let response = self
            .http
            .post(format!("{}/api/run-tests", self.base_url))
            .json(&json!({
                "source_code": source_code,
                "language_id": language_id,
                "testCases": cases,
            }))
            .send()
            .await
            .context("failed to reach prepd-api")?;

        let body: ResultsBody = read_json(response).await?;
        Ok(body.results)
    }

    pub async fn generate_question(
        &self,
        topic: Option<&str>,
        difficulty: Option<&str>,
    ) -> Result<Question> {
        let response = self
            .http
            .post(format!("{}/api/generate-question", self.base_url))
            .json(&json!({ "topic": topic, "difficulty": difficulty }))
            .send()
            .await
            .context("failed to reach prepd-api")?;
        read_json(response).await
    }

    pub async fn chat(&self, messages: &[ChatMessage], code: Option<&str>) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&ChatBody { messages, code })
            .send()
            .await
            .context("failed to reach prepd-api")?;

        let body: MessageBody = read_json(response).await?;
        Ok(body.message)
    }

    /// Streamed chat: invokes `on_fragment` for each content fragment as it
    /// arrives; returns once the end marker is seen or the stream closes.
    pub async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        code: Option<&str>,
        mut on_fragment: impl FnMut(&str),
    ) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/api/chat/stream", self.base_url))
            .json(&ChatBody { messages, code })
            .send()
            .await
            .context("failed to reach prepd-api")?;

        if !response.status().is_success() {
            bail!("server error: {}", read_error(response).await);
        }

        let mut bytes = response.bytes_stream();
        let mut buffer = String::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.context("stream interrupted")?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(newline) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline).collect();
                let Some(data) = line.trim().strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim_start();
                if data == "[DONE]" {
                    return Ok(());
                }
                if let Ok(payload) = serde_json::from_str::<StreamPayload>(data) {
                    on_fragment(&payload.content);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResultSource for ApiClient {
    async fn fetch(&self, token: &str) -> Result<ExecutionResult> {
        self.result(token).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        bail!("server error: {}", read_error(response).await);
    }
    response
        .json()
        .await
        .context("unexpected response from prepd-api")
}

async fn read_error(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => format!("HTTP {status}"),
    }
}

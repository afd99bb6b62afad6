// HTTP route handlers for the prepd API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    response::{IntoResponse, Json, Response},
};
use futures_util::stream::{Stream, StreamExt};
use prepd_common::types::{
    ChatMessage, ExecutionResult, HelpLevel, LanguageInfo, Question, Submission, TestCase,
    TestResult,
};
use prepd_common::RelayError;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::judge::JudgeClient;
use crate::llm::{ChatClient, StreamEvent};
use crate::runner;
use crate::AppState;

/// RelayError mapped onto the HTTP surface: validation faults are the
/// client's, everything else is reported as a server-side relay failure.
pub struct ApiError(RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Configuration(_)
            | RelayError::UpstreamStatus { .. }
            | RelayError::UpstreamFormat(_)
            | RelayError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub source_code: Option<String>,
    pub language_id: Option<u32>,
    #[serde(default)]
    pub stdin: Option<String>,
    #[serde(default)]
    pub command_line_arguments: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RunTestsRequest {
    pub source_code: Option<String>,
    pub language_id: Option<u32>,
    #[serde(rename = "testCases")]
    pub test_cases: Option<Vec<TestCase>>,
}

#[derive(Debug, Serialize)]
pub struct RunTestsResponse {
    pub results: Vec<TestResult>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateQuestionRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub code: Option<String>,
    #[serde(default)]
    pub conversation: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(rename = "helpLevel", default)]
    pub help_level: Option<HelpLevel>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub suggestion: String,
}

#[derive(Serialize)]
struct StreamPayload {
    content: String,
}

/// GET /api/health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Server is running",
    }))
}

/// POST /api/submissions - relay a code submission to the execution service
pub async fn submit_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let (source_code, language_id) = match (payload.source_code, payload.language_id) {
        (Some(source), Some(lang)) if !source.is_empty() => (source, lang),
        _ => return Err(RelayError::validation("Missing required fields").into()),
    };

    info!(
        language_id = language_id,
        code_length = source_code.len(),
        "submission request received"
    );

    let judge = JudgeClient::from_config(&state.config, state.http.clone())?;
    let mut submission = Submission::new(source_code, language_id);
    submission.stdin = payload.stdin;
    submission.command_line_arguments = payload.command_line_arguments;

    let token = judge.submit(&submission).await?;
    info!(token = %token, "submission accepted by execution service");
    Ok(Json(SubmitResponse { token }))
}

/// GET /api/submissions/:token - fetch and decode an execution result
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let judge = JudgeClient::from_config(&state.config, state.http.clone())?;
    let result = judge.fetch_result(&token).await?;
    Ok(Json(result))
}

/// GET /api/languages - pass-through of the execution service catalog
pub async fn list_languages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LanguageInfo>>, ApiError> {
    let judge = JudgeClient::from_config(&state.config, state.http.clone())?;
    let languages = judge.list_languages().await?;
    Ok(Json(languages))
}

/// POST /api/chat - full completion in one response
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let messages = payload
        .messages
        .ok_or_else(|| RelayError::validation("Messages array required"))?;

    let llm = ChatClient::from_config(&state.config, state.http.clone())?;
    let message = llm
        .complete(
            &messages,
            payload.code.as_deref(),
            payload.output.as_deref(),
        )
        .await?;
    Ok(Json(ChatResponse { message }))
}

/// POST /api/chat/stream - forward completion deltas as an event stream
///
/// Failures before the first upstream byte surface as a JSON error
/// response. Once the stream header is out, a failure can only end the
/// stream early; the status code is already committed.
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let messages = payload
        .messages
        .ok_or_else(|| RelayError::validation("Messages array required"))?;

    let llm = ChatClient::from_config(&state.config, state.http.clone())?;
    let fragments = llm
        .complete_stream(
            &messages,
            payload.code.as_deref(),
            payload.output.as_deref(),
        )
        .await?;

    let events = fragments.filter_map(|fragment| async move {
        match fragment {
            Ok(StreamEvent::Content(content)) => Event::default()
                .json_data(StreamPayload { content })
                .ok()
                .map(Ok::<_, Infallible>),
            Ok(StreamEvent::Done) => Some(Ok(Event::default().data("[DONE]"))),
            Err(e) => {
                // Stream already started; ending it is all we can do.
                warn!(error = %e, "upstream stream failed mid-flight");
                None
            }
        }
    });

    Ok(Sse::new(events))
}

/// POST /api/run-tests - sequential batch execution against test cases
pub async fn run_tests(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RunTestsRequest>,
) -> Result<Json<RunTestsResponse>, ApiError> {
    let (source_code, language_id, test_cases) = match (
        payload.source_code,
        payload.language_id,
        payload.test_cases,
    ) {
        (Some(source), Some(lang), Some(cases)) if !source.is_empty() => (source, lang, cases),
        _ => return Err(RelayError::validation("Missing required fields").into()),
    };

    info!(
        language_id = language_id,
        cases = test_cases.len(),
        "test batch received"
    );

    let judge = JudgeClient::from_config(&state.config, state.http.clone())?;
    let results = runner::run_all(&judge, &source_code, language_id, &test_cases).await;

    info!(
        passed = results.iter().filter(|r| r.passed).count(),
        total = results.len(),
        "test batch finished"
    );
    Ok(Json(RunTestsResponse { results }))
}

/// POST /api/generate-question - generate a practice problem with cases
pub async fn generate_question(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GenerateQuestionRequest>,
) -> Result<Json<Question>, ApiError> {
    let llm = ChatClient::from_config(&state.config, state.http.clone())?;
    let question = llm
        .generate_question(payload.topic.as_deref(), payload.difficulty.as_deref())
        .await?;
    info!(
        cases = question.test_cases.len(),
        "question generated"
    );
    Ok(Json(question))
}

/// POST /api/ai-feedback - graded one-shot feedback on the current code
pub async fn ai_feedback(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let code = payload
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| RelayError::validation("Code is required"))?;

    let llm = ChatClient::from_config(&state.config, state.http.clone())?;
    let suggestion = llm
        .feedback(
            &code,
            payload.conversation.as_deref().unwrap_or(""),
            payload.language.as_deref(),
            payload.help_level.unwrap_or_default(),
        )
        .await?;
    Ok(Json(FeedbackResponse { suggestion }))
}

// Chat Relay: client for an OpenAI-compatible chat completion service.
//
// Non-streaming mode waits for the full completion; streaming mode exposes
// the upstream deltas as a lazy, finite sequence of fragments terminated by
// an explicit Done marker. The event-stream transport lives in the handler
// layer; this module is transport-agnostic.

use std::collections::VecDeque;

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use prepd_common::types::{ChatMessage, ChatRole, HelpLevel, Question};
use prepd_common::{Config, RelayError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::question;

const CHAT_TEMPERATURE: f32 = 0.7;
const CHAT_MAX_TOKENS: u32 = 1024;
const FEEDBACK_MAX_TOKENS: u32 = 500;
const QUESTION_TEMPERATURE: f32 = 0.8;
const QUESTION_MAX_TOKENS: u32 = 1200;

const NO_RESPONSE: &str = "No response";
const NO_FEEDBACK: &str = "Looking good so far!";

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

/// One incremental fragment of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Content(String),
    Done,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient {
    /// Fails with a configuration error when no API key is set; checked
    /// before any upstream call.
    pub fn from_config(config: &Config, http: reqwest::Client) -> Result<Self> {
        let api_key = config.llm_api_key()?.to_string();
        Ok(Self {
            http,
            base_url: config.llm_base_url.clone(),
            api_key,
            model: config.llm_model.clone(),
        })
    }

    /// Full interview-chat completion: synthesized system message plus the
    /// client conversation, one round trip.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        code: Option<&str>,
        output: Option<&str>,
    ) -> Result<String> {
        let content = self
            .completion(
                with_system(system_prompt(code, output), messages),
                CHAT_TEMPERATURE,
                CHAT_MAX_TOKENS,
            )
            .await?;
        Ok(content.unwrap_or_else(|| NO_RESPONSE.to_string()))
    }

    /// Streaming variant of `complete`. Returns an error for any failure
    /// before the first upstream byte; afterwards, failures end the
    /// sequence early (a started stream cannot change its status).
    pub async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        code: Option<&str>,
        output: Option<&str>,
    ) -> Result<impl Stream<Item = Result<StreamEvent>>> {
        let body = ChatRequest {
            model: &self.model,
            messages: with_system(system_prompt(code, output), messages),
            temperature: CHAT_TEMPERATURE,
            max_tokens: CHAT_MAX_TOKENS,
            stream: true,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        debug!("upstream completion stream open");
        Ok(fragment_stream(response.bytes_stream().boxed()))
    }

    /// One-shot feedback on the user's current code, graded by help level.
    pub async fn feedback(
        &self,
        code: &str,
        conversation: &str,
        language: Option<&str>,
        help_level: HelpLevel,
    ) -> Result<String> {
        let messages = vec![
            ChatMessage::new(
                ChatRole::System,
                format!(
                    "You are a concise coding assistant. {} Always stay within the sentence limit specified.",
                    help_instruction(help_level)
                ),
            ),
            ChatMessage::new(
                ChatRole::User,
                feedback_prompt(code, conversation, language, help_level),
            ),
        ];
        let content = self
            .completion(messages, CHAT_TEMPERATURE, FEEDBACK_MAX_TOKENS)
            .await?;
        Ok(content.unwrap_or_else(|| NO_FEEDBACK.to_string()))
    }

    /// Generate a practice problem and extract its fenced test cases. An
    /// unparsable or missing test-case block yields an empty list, never an
    /// error.
    pub async fn generate_question(
        &self,
        topic: Option<&str>,
        difficulty: Option<&str>,
    ) -> Result<Question> {
        let messages = vec![
            ChatMessage::new(
                ChatRole::System,
                "You are a technical interviewer creating coding problems with test cases.",
            ),
            ChatMessage::new(ChatRole::User, question_prompt(topic, difficulty)),
        ];
        let markdown = self
            .completion(messages, QUESTION_TEMPERATURE, QUESTION_MAX_TOKENS)
            .await?
            .unwrap_or_else(|| "Failed to generate question".to_string());

        let test_cases = question::extract_test_cases(&markdown);
        Ok(Question {
            question: markdown,
            test_cases,
        })
    }

    async fn completion(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Option<String>> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens,
            stream: false,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| RelayError::upstream_format(e.to_string()))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty()))
    }
}

/// Fixed interviewer persona plus the candidate's current code and output.
pub fn system_prompt(code: Option<&str>, output: Option<&str>) -> String {
    format!(
        "You are an experienced technical interviewer. Current code:\n{}\nOutput:\n{}",
        code.unwrap_or(""),
        output.unwrap_or("")
    )
}

fn with_system(system: String, messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut all = Vec::with_capacity(messages.len() + 1);
    all.push(ChatMessage::new(ChatRole::System, system));
    all.extend_from_slice(messages);
    all
}

/// The three fixed instruction templates selected by help level.
pub fn help_instruction(level: HelpLevel) -> &'static str {
    match level {
        HelpLevel::Easy => {
            "Provide detailed, encouraging feedback with specific suggestions and explanations \
             (2-3 sentences). Be very helpful and guide them step by step."
        }
        HelpLevel::Medium => {
            "Provide balanced feedback in 1-2 sentences - point out issues and give helpful \
             hints without solving it for them."
        }
        HelpLevel::Hard => {
            "Provide minimal, subtle hints in 1 sentence only. Only point out critical errors \
             or misconceptions. Let them figure it out mostly on their own."
        }
    }
}

fn feedback_prompt(
    code: &str,
    conversation: &str,
    language: Option<&str>,
    level: HelpLevel,
) -> String {
    let limit = match level {
        HelpLevel::Easy => "Keep your response to 2-3 sentences maximum.",
        HelpLevel::Medium => {
            "Keep your response to 1-2 sentences maximum and don't give away the solution."
        }
        HelpLevel::Hard => {
            "Keep your response to EXACTLY 1 sentence and only hint at a next step"
        }
    };
    let conversation = if conversation.is_empty() {
        "No previous conversation"
    } else {
        conversation
    };

    format!(
        "You are a helpful coding assistant. The user is working on a coding problem in {}.\n\n\
         Current code:\n```\n{}\n```\n\n\
         Recent conversation:\n{}\n\n\
         Help Level Instructions: {}\n\n\
         Provide a brief, helpful suggestion about potential bugs, improvements, logic errors, \
         or better approaches.\n\n\
         IMPORTANT: {}",
        language.unwrap_or("an unknown language"),
        code,
        conversation,
        help_instruction(level),
        limit
    )
}

fn question_prompt(topic: Option<&str>, difficulty: Option<&str>) -> String {
    format!(
        "You are a technical interviewer creating a coding problem.\n\
         - Generate a problem description for topic: {} and difficulty: {}.\n\
         - Include: problem statement, example input/output, and constraints.\n\
         - STRICTLY DO NOT provide the solution, hints, or explanation.\n\
         - Format as markdown with sections: **Question Title**, **Problem**, **Example**, **Constraints**.\n\n\
         After the problem, provide 3-5 test cases in the following JSON format:\n\
         ```json\n\
         {{\n\
           \"testCases\": [\n\
             {{\"input\": \"example input\", \"expectedOutput\": \"expected output\"}},\n\
             {{\"input\": \"edge case input\", \"expectedOutput\": \"edge case output\"}}\n\
           ]\n\
         }}\n\
         ```",
        topic.unwrap_or("general"),
        difficulty.unwrap_or("medium")
    )
}

struct FragmentState {
    source: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    buffer: String,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

/// Adapt the upstream byte stream into parsed fragments. The sequence is
/// finite and non-restartable: it ends after Done, after an upstream error,
/// or when the connection closes (which implies Done).
fn fragment_stream(
    source: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
) -> impl Stream<Item = Result<StreamEvent>> {
    let state = FragmentState {
        source,
        buffer: String::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                if matches!(event, StreamEvent::Done) {
                    state.finished = true;
                }
                return Some((Ok(event), state));
            }
            if state.finished {
                return None;
            }
            match state.source.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.push_str(&String::from_utf8_lossy(&chunk));
                    while let Some(newline) = state.buffer.find('\n') {
                        let line: String = state.buffer.drain(..=newline).collect();
                        if let Some(event) = parse_stream_line(line.trim()) {
                            state.pending.push_back(event);
                        }
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(RelayError::Transport(e.to_string())), state));
                }
                // Upstream closed without an explicit end marker.
                None => state.pending.push_back(StreamEvent::Done),
            }
        }
    })
}

/// Parse one line of the upstream event stream. Lines that carry no
/// content (comments, empty keep-alives, empty deltas) yield nothing.
fn parse_stream_line(line: &str) -> Option<StreamEvent> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(StreamEvent::Done);
    }
    let chunk: StreamChunk = serde_json::from_str(data).ok()?;
    let content = chunk.choices.into_iter().next()?.delta.content?;
    if content.is_empty() {
        None
    } else {
        Some(StreamEvent::Content(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_line(content: &str) -> String {
        format!(
            "data: {}",
            serde_json::json!({ "choices": [{ "delta": { "content": content } }] })
        )
    }

    #[test]
    fn test_system_prompt_includes_code_and_output() {
        let prompt = system_prompt(Some("print('hi')"), Some("hi"));
        assert!(prompt.starts_with("You are an experienced technical interviewer."));
        assert!(prompt.contains("print('hi')"));
        assert!(prompt.contains("Output:\nhi"));

        let bare = system_prompt(None, None);
        assert!(bare.contains("Current code:\n\n"));
    }

    #[test]
    fn test_system_message_is_prepended() {
        let conversation = vec![ChatMessage::new(ChatRole::User, "hello")];
        let all = with_system("persona".to_string(), &conversation);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].role, ChatRole::System);
        assert_eq!(all[1].role, ChatRole::User);
    }

    #[test]
    fn test_parse_stream_line_content() {
        assert_eq!(
            parse_stream_line(&delta_line("Hello")),
            Some(StreamEvent::Content("Hello".to_string()))
        );
    }

    #[test]
    fn test_parse_stream_line_done_marker() {
        assert_eq!(parse_stream_line("data: [DONE]"), Some(StreamEvent::Done));
    }

    #[test]
    fn test_parse_stream_line_skips_noise() {
        assert_eq!(parse_stream_line(""), None);
        assert_eq!(parse_stream_line(": keep-alive"), None);
        assert_eq!(parse_stream_line("data: {not json"), None);
        assert_eq!(parse_stream_line(&delta_line("")), None);
        // Final chunk carries an empty delta object.
        assert_eq!(
            parse_stream_line(r#"data: {"choices":[{"delta":{}}]}"#),
            None
        );
    }

    /// The concatenation of streamed fragments must equal the message the
    /// non-streaming path would return for the same completion.
    #[test]
    fn test_stream_fragments_concatenate_to_full_message() {
        let full_message = "The two-pointer approach is correct.";
        let mut transcript: Vec<String> = full_message
            .split_inclusive(' ')
            .map(delta_line)
            .collect();
        transcript.push("data: [DONE]".to_string());

        let mut assembled = String::new();
        let mut done = false;
        for line in &transcript {
            match parse_stream_line(line) {
                Some(StreamEvent::Content(c)) => assembled.push_str(&c),
                Some(StreamEvent::Done) => done = true,
                None => {}
            }
        }

        assert!(done);
        assert_eq!(assembled, full_message);
    }

    #[tokio::test]
    async fn test_fragment_stream_ends_after_done() {
        let transcript = format!("{}\n{}\ndata: [DONE]\n", delta_line("Hi"), delta_line("!"));
        let bytes = stream::iter(vec![Ok(bytes::Bytes::from(transcript))]).boxed();

        let events: Vec<_> = fragment_stream(bytes).collect().await;
        let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Content("Hi".to_string()),
                StreamEvent::Content("!".to_string()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_fragment_stream_synthesizes_done_on_early_close() {
        let bytes = stream::iter(vec![Ok(bytes::Bytes::from(format!(
            "{}\n",
            delta_line("partial")
        )))])
        .boxed();

        let events: Vec<_> = fragment_stream(bytes).collect().await;
        let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Content("partial".to_string()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_fragment_stream_reassembles_split_lines() {
        let line = delta_line("whole");
        let (left, right) = line.split_at(10);
        let bytes = stream::iter(vec![
            Ok(bytes::Bytes::from(left.to_string())),
            Ok(bytes::Bytes::from(format!("{right}\ndata: [DONE]\n"))),
        ])
        .boxed();

        let events: Vec<_> = fragment_stream(bytes).collect().await;
        let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Content("whole".to_string()),
                StreamEvent::Done,
            ]
        );
    }

    #[test]
    fn test_help_instructions_are_distinct() {
        let easy = help_instruction(HelpLevel::Easy);
        let medium = help_instruction(HelpLevel::Medium);
        let hard = help_instruction(HelpLevel::Hard);
        assert_ne!(easy, medium);
        assert_ne!(medium, hard);
        assert!(hard.contains("1 sentence"));
    }

    #[test]
    fn test_feedback_prompt_defaults() {
        let prompt = feedback_prompt("x = 1", "", None, HelpLevel::Medium);
        assert!(prompt.contains("an unknown language"));
        assert!(prompt.contains("No previous conversation"));
        assert!(prompt.contains("don't give away the solution"));
    }

    #[test]
    fn test_question_prompt_embeds_topic_and_difficulty() {
        let prompt = question_prompt(Some("arrays"), Some("hard"));
        assert!(prompt.contains("topic: arrays"));
        assert!(prompt.contains("difficulty: hard"));
        assert!(prompt.contains("```json"));

        let defaults = question_prompt(None, None);
        assert!(defaults.contains("topic: general"));
        assert!(defaults.contains("difficulty: medium"));
    }
}

// Batch Test Runner: drives one blocking execution per test case,
// sequentially, and compares trimmed stdout against the expected output.
//
// Partial-failure semantics: a case whose submission fails outright is
// recorded with a fixed error marker and no actual output, and the batch
// moves on. One bad case never aborts the run.

use async_trait::async_trait;
use prepd_common::types::{ExecutionResult, Submission, TestCase, TestResult};
use prepd_common::Result;
use tracing::{debug, warn};

use crate::judge::JudgeClient;

const SUBMISSION_FAILED: &str = "Submission failed";

/// Seam between the runner and the execution service, so the runner is
/// testable against a fake backend.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Execute a submission and wait for its terminal result.
    async fn run_blocking(&self, submission: &Submission) -> Result<ExecutionResult>;
}

#[async_trait]
impl ExecutionBackend for JudgeClient {
    async fn run_blocking(&self, submission: &Submission) -> Result<ExecutionResult> {
        self.submit_and_wait(submission).await
    }
}

pub async fn run_all(
    backend: &dyn ExecutionBackend,
    source_code: &str,
    language_id: u32,
    test_cases: &[TestCase],
) -> Vec<TestResult> {
    let mut results = Vec::with_capacity(test_cases.len());

    for (index, case) in test_cases.iter().enumerate() {
        let submission = Submission::new(source_code, language_id).with_stdin(case.input.clone());

        match backend.run_blocking(&submission).await {
            Ok(result) => {
                debug!(
                    case = index + 1,
                    status = result.status.id,
                    "test case executed"
                );
                results.push(judge_case(case, &result));
            }
            Err(e) => {
                warn!(case = index + 1, error = %e, "test case submission failed");
                results.push(TestResult {
                    passed: false,
                    input: case.input.clone(),
                    expected_output: case.expected_output.clone(),
                    actual_output: None,
                    stderr: None,
                    error: Some(SUBMISSION_FAILED.to_string()),
                });
            }
        }
    }

    results
}

/// Exact string comparison after trimming both sides; case-sensitive, no
/// whitespace normalization beyond the single trim. Stderr is attached for
/// diagnostics even when the case passes.
fn judge_case(case: &TestCase, result: &ExecutionResult) -> TestResult {
    let actual = result.stdout.as_deref().unwrap_or("").trim().to_string();
    let passed = actual == case.expected_output.trim();

    TestResult {
        passed,
        input: case.input.clone(),
        expected_output: case.expected_output.clone(),
        actual_output: Some(actual),
        stderr: result.stderr.clone(),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prepd_common::types::StatusInfo;
    use prepd_common::RelayError;
    use std::sync::Mutex;

    /// Scripted backend: answers each call with the next canned response.
    struct FakeBackend {
        responses: Mutex<Vec<Result<ExecutionResult>>>,
        seen_stdin: Mutex<Vec<Option<String>>>,
    }

    impl FakeBackend {
        fn new(responses: Vec<Result<ExecutionResult>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                seen_stdin: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExecutionBackend for FakeBackend {
        async fn run_blocking(&self, submission: &Submission) -> Result<ExecutionResult> {
            self.seen_stdin
                .lock()
                .unwrap()
                .push(submission.stdin.clone());
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn accepted(stdout: &str) -> ExecutionResult {
        ExecutionResult {
            status: StatusInfo {
                id: 3,
                description: Some("Accepted".to_string()),
            },
            stdout: Some(stdout.to_string()),
            stderr: None,
            compile_output: None,
            message: None,
            time: None,
            memory: None,
            token: None,
        }
    }

    fn case(input: &str, expected: &str) -> TestCase {
        TestCase {
            input: input.to_string(),
            expected_output: expected.to_string(),
        }
    }

    #[tokio::test]
    async fn test_sum_case_passes() {
        let backend = FakeBackend::new(vec![Ok(accepted("7\n"))]);
        let results = run_all(&backend, "print(sum_of_input())", 71, &[case("3\n4\n", "7")]).await;

        assert_eq!(results.len(), 1);
        assert!(results[0].passed);
        assert_eq!(results[0].actual_output.as_deref(), Some("7"));
        assert_eq!(
            backend.seen_stdin.lock().unwrap()[0].as_deref(),
            Some("3\n4\n")
        );
    }

    #[tokio::test]
    async fn test_failed_submissions_do_not_abort_the_batch() {
        let backend = FakeBackend::new(vec![
            Ok(accepted("1")),
            Err(RelayError::UpstreamStatus {
                status: 503,
                body: "queue full".to_string(),
            }),
            Ok(accepted("3")),
        ]);
        let cases = [case("a", "1"), case("b", "2"), case("c", "3")];
        let results = run_all(&backend, "code", 71, &cases).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert!(results[1].actual_output.is_none());
        assert_eq!(results[1].error.as_deref(), Some("Submission failed"));
        assert!(results[2].passed);
    }

    #[tokio::test]
    async fn test_trailing_whitespace_differences_pass() {
        let backend = FakeBackend::new(vec![Ok(accepted("  hello  \n"))]);
        let results = run_all(&backend, "code", 71, &[case("", "hello")]).await;
        assert!(results[0].passed);
    }

    #[tokio::test]
    async fn test_internal_whitespace_differences_fail() {
        let backend = FakeBackend::new(vec![Ok(accepted("hello  world"))]);
        let results = run_all(&backend, "code", 71, &[case("", "hello world")]).await;
        assert!(!results[0].passed);
        assert_eq!(results[0].actual_output.as_deref(), Some("hello  world"));
    }

    #[tokio::test]
    async fn test_comparison_is_case_sensitive() {
        let backend = FakeBackend::new(vec![Ok(accepted("Hello"))]);
        let results = run_all(&backend, "code", 71, &[case("", "hello")]).await;
        assert!(!results[0].passed);
    }

    #[tokio::test]
    async fn test_stderr_attached_even_on_pass() {
        let mut result = accepted("7");
        result.stderr = Some("warning: deprecated syntax\n".to_string());
        let backend = FakeBackend::new(vec![Ok(result)]);

        let results = run_all(&backend, "code", 71, &[case("", "7")]).await;
        assert!(results[0].passed);
        assert_eq!(
            results[0].stderr.as_deref(),
            Some("warning: deprecated syntax\n")
        );
    }

    #[tokio::test]
    async fn test_missing_stdout_compares_as_empty() {
        let mut result = accepted("");
        result.stdout = None;
        let backend = FakeBackend::new(vec![Ok(result)]);

        let results = run_all(&backend, "code", 71, &[case("", "")]).await;
        assert!(results[0].passed);
        assert_eq!(results[0].actual_output.as_deref(), Some(""));
    }
}

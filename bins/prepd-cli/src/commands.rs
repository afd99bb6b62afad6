// CLI commands: submit-and-poll, batch tests, catalog, chat, questions.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use prepd_common::types::{ChatMessage, ChatRole, ExecutionResult, TestCase};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::api::ApiClient;
use crate::poller::{self, PollOutcome, PollPolicy};

/// Submit a source file, poll until terminal or the budget runs out, and
/// print the decoded outputs.
pub async fn run(
    client: &ApiClient,
    file: &Path,
    language_id: u32,
    stdin_file: Option<&Path>,
    interval_ms: u64,
    attempts: u32,
) -> Result<()> {
    let source_code = read_file(file)?;
    let stdin = stdin_file.map(read_file).transpose()?;

    let token = client
        .submit(&source_code, language_id, stdin.as_deref())
        .await
        .context("submission failed")?;
    println!("Submitted, token: {token}");

    let policy = PollPolicy {
        interval: Duration::from_millis(interval_ms),
        max_attempts: attempts,
    };

    match poller::poll(client, &token, &policy).await {
        PollOutcome::Completed(result) => {
            print_result(&result);
            Ok(())
        }
        PollOutcome::TimedOut { attempts } => {
            // Distinct from an execution failure: the code may still be running.
            bail!("execution timed out: no terminal status after {attempts} polls")
        }
    }
}

fn print_result(result: &ExecutionResult) {
    let status = result.status.description.as_deref().unwrap_or("Unknown");
    if result.status.id == 3 {
        println!("Status: {}", status.green());
    } else {
        println!("Status: {}", status.red());
    }
    if let Some(time) = &result.time {
        println!("Time: {time}s");
    }
    if let Some(stdout) = &result.stdout {
        println!("\n{}", "stdout:".bold());
        print!("{stdout}");
    }
    if let Some(stderr) = &result.stderr {
        println!("\n{}", "stderr:".bold());
        print!("{stderr}");
    }
    if let Some(compile_output) = &result.compile_output {
        println!("\n{}", "compiler output:".bold());
        print!("{compile_output}");
    }
    if let Some(message) = &result.message {
        println!("\n{message}");
    }
}

/// Run a source file against a JSON file of test cases and print a
/// pass/fail summary.
pub async fn test(client: &ApiClient, file: &Path, language_id: u32, cases: &Path) -> Result<()> {
    let source_code = read_file(file)?;
    let cases: Vec<TestCase> = serde_json::from_str(&read_file(cases)?)
        .context("cases file must be a JSON array of {input, expectedOutput}")?;

    if cases.is_empty() {
        bail!("no test cases in file");
    }

    let results = client.run_tests(&source_code, language_id, &cases).await?;

    let mut passed = 0;
    for (index, result) in results.iter().enumerate() {
        let label = format!("case {}", index + 1);
        if result.passed {
            passed += 1;
            println!("{} {}", "PASS".green().bold(), label);
        } else if let Some(error) = &result.error {
            println!("{} {} ({error})", "FAIL".red().bold(), label);
        } else {
            println!("{} {}", "FAIL".red().bold(), label);
            println!("  input:    {:?}", result.input);
            println!("  expected: {:?}", result.expected_output);
            println!(
                "  actual:   {:?}",
                result.actual_output.as_deref().unwrap_or("")
            );
        }
        if let Some(stderr) = &result.stderr {
            println!("  stderr: {}", stderr.trim_end());
        }
    }

    println!("\n{passed}/{} passed", results.len());
    if passed < results.len() {
        std::process::exit(1);
    }
    Ok(())
}

/// List the execution service's non-archived languages.
pub async fn languages(client: &ApiClient) -> Result<()> {
    let languages = client.languages().await?;
    for language in languages.iter().filter(|l| !l.is_archived()) {
        println!("{:>4}  {}", language.id, language.name);
    }
    Ok(())
}

/// Generate a practice question and print it with its test cases.
pub async fn question(
    client: &ApiClient,
    topic: Option<&str>,
    difficulty: Option<&str>,
) -> Result<()> {
    let question = client.generate_question(topic, difficulty).await?;
    println!("{}", question.question);

    if !question.test_cases.is_empty() {
        println!("\n{}", "Test cases:".bold());
        println!("{}", serde_json::to_string_pretty(&question.test_cases)?);
    }
    Ok(())
}

/// One chat turn; streamed to the terminal unless `plain` is set.
pub async fn chat(
    client: &ApiClient,
    message: &str,
    code_file: Option<&Path>,
    plain: bool,
) -> Result<()> {
    let code = code_file.map(read_file).transpose()?;
    let messages = vec![ChatMessage::new(ChatRole::User, message)];

    if plain {
        let reply = client.chat(&messages, code.as_deref()).await?;
        println!("{reply}");
        return Ok(());
    }

    client
        .chat_stream(&messages, code.as_deref(), |fragment| {
            print!("{fragment}");
            let _ = std::io::stdout().flush();
        })
        .await?;
    println!();
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

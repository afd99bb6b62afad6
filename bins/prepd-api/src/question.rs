// Extraction of test cases from generated problem markdown.
//
// The generator is asked to append a fenced ```json block holding a
// `testCases` array. Models do not always comply, so extraction degrades to
// an empty list instead of surfacing a parse error.

use lazy_regex::regex;
use prepd_common::types::TestCase;
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestCaseBlock {
    #[serde(default)]
    test_cases: Vec<TestCase>,
}

/// Locate the first fenced JSON block in `markdown` and parse its
/// `testCases` array. Returns an empty list when the block is absent or
/// unparsable.
pub fn extract_test_cases(markdown: &str) -> Vec<TestCase> {
    let fence = regex!(r"(?s)```json\s*(.*?)\s*```");
    let Some(captures) = fence.captures(markdown) else {
        return Vec::new();
    };
    let Some(body) = captures.get(1) else {
        return Vec::new();
    };
    match serde_json::from_str::<TestCaseBlock>(body.as_str()) {
        Ok(block) => block.test_cases,
        Err(e) => {
            debug!(error = %e, "generated test case block did not parse");
            Vec::new()
        }
    }
}

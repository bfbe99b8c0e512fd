//! Response Parser
//!
//! Extracts action calls embedded in free-form model output and renders
//! action results back into text for the next round.
//!
//! Model replies routinely mix prose with one or more JSON blocks, so the
//! scanner tracks brace depth instead of matching a pattern: parameters
//! may hold nested objects and arrays.

use std::fmt::Write as _;

use serde_json::Value;

use crate::action::{ActionCall, ActionResult};

const ACTION_KEY: &str = "\"action\"";
const PARAMETERS_KEY: &str = "\"parameters\"";

/// Header line of a formatted result block
pub const RESULTS_HEADER: &str = "Action results:";

/// Whether the text appears to attempt an action call
pub fn looks_like_action_attempt(text: &str) -> bool {
    text.contains(ACTION_KEY) && text.contains(PARAMETERS_KEY)
}

/// Extract every well-formed action call, in order of appearance.
///
/// A balanced candidate is consumed whole, accepted or not, so action-shaped
/// JSON nested inside another object is never extracted. An unterminated
/// candidate gives up only its nested balanced objects, which are tried as
/// candidates in turn.
pub fn parse_action_calls(text: &str) -> Vec<ActionCall> {
    let bytes = text.as_bytes();
    let mut calls = Vec::new();
    let mut pos = 0;

    while let Some(offset) = bytes[pos..].iter().position(|&b| b == b'{') {
        let start = pos + offset;
        let mut consumed_to = None;
        pos = bytes.len();

        for span in scan_objects(bytes, start) {
            if consumed_to.is_some_and(|end| span.open < end) {
                continue;
            }
            let Some(close) = span.close else {
                continue;
            };

            if let Some(call) = parse_candidate(&text[span.open..=close]) {
                tracing::debug!(action = %call.action, "Parsed action call");
                calls.push(call);
            }
            consumed_to = Some(close);
            if span.open == start {
                pos = close + 1;
            }
        }
    }

    calls
}

/// Brace pair found by [`scan_objects`]; `close` is `None` when the object
/// is still open at end of text.
struct Span {
    open: usize,
    close: Option<usize>,
}

/// Single pass from the `{` at `start` until it closes or the text ends.
/// Spans are listed in order of their opening brace.
fn scan_objects(bytes: &[u8], start: usize) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => {
                open.push(spans.len());
                spans.push(Span { open: i, close: None });
            }
            b'}' => {
                if let Some(idx) = open.pop() {
                    spans[idx].close = Some(i);
                }
                if open.is_empty() {
                    break;
                }
            }
            _ => {}
        }
    }

    spans
}

fn parse_candidate(candidate: &str) -> Option<ActionCall> {
    // Cheap filter before the JSON parse
    if !looks_like_action_attempt(candidate) {
        return None;
    }

    let Value::Object(mut object) = serde_json::from_str::<Value>(candidate).ok()? else {
        return None;
    };

    let action = match object.remove("action")? {
        Value::String(name) if !name.trim().is_empty() => name,
        _ => return None,
    };
    let Value::Object(parameters) = object.remove("parameters")? else {
        return None;
    };

    Some(ActionCall { action, parameters })
}

/// Render results as one text block; empty input renders as `""`.
pub fn format_action_results(results: &[ActionResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut block = String::from(RESULTS_HEADER);
    for result in results {
        block.push('\n');
        if result.success {
            let value = result.result.as_ref().map_or_else(String::new, describe_value);
            let _ = write!(block, "- {} succeeded: {}", result.action, value);
        } else {
            let error = result.error.as_deref().unwrap_or("unknown error");
            let _ = write!(block, "- {} failed: {}", result.action, error);
        }
    }

    block
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

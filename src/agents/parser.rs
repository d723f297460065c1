//! Model-output parser for generated problems
//!
//! The upstream model is instructed to emit JSON only, but it is a
//! probabilistic text generator and cannot be trusted to comply. Parsing is
//! total: the strict JSON path handles the normal case, and a line-oriented
//! section scanner degrades gracefully for everything else. The rest of the
//! system gets to behave as if the model always returned valid JSON.

use super::GeneratedProblem;

const PROBLEM_TEXT_FALLBACK_CHARS: usize = 200;

/// Parse raw model output into a `GeneratedProblem`. Never fails.
pub fn parse_problem(raw: &str) -> GeneratedProblem {
    if let Some(block) = json_block(raw) {
        match serde_json::from_str::<GeneratedProblem>(block) {
            Ok(problem) => return problem,
            Err(e) => {
                tracing::warn!(error = %e, "problem JSON failed to decode, using section fallback");
            }
        }
    }
    section_fallback(raw)
}

/// Find the first balanced `{...}` block in `raw`, brace-counting with
/// awareness of JSON string literals so braces inside strings don't
/// unbalance the scan. Returns `None` if no block ever closes.
pub(crate) fn json_block(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Active section while scanning free text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Problem,
    Hints,
    Solution,
    Explanation,
}

/// Line-oriented fallback. A keyword plus a colon opens a section (most
/// recent keyword wins); `hint` opens one even without a colon, taking the
/// whole line as the hint text. Lines matching no keyword are space-joined
/// into the active section. Hint continuation lines are dropped, matching
/// the historical scanner this replaces.
fn section_fallback(raw: &str) -> GeneratedProblem {
    let raw = raw.trim();
    let mut problem_text = String::new();
    let mut hints: Vec<String> = Vec::new();
    let mut solution = String::new();
    let mut explanation = String::new();
    let mut current: Option<Section> = None;

    for line in raw.lines() {
        let line = line.trim();
        let lower = line.to_lowercase();
        let colon = line.find(':');

        if lower.contains("problem") && colon.is_some() {
            current = Some(Section::Problem);
            problem_text = after_colon(line);
        } else if lower.contains("hint") {
            current = Some(Section::Hints);
            let hint = match colon {
                Some(_) => after_colon(line),
                None => line.to_string(),
            };
            if !hint.is_empty() {
                hints.push(hint);
            }
        } else if lower.contains("solution") && colon.is_some() {
            current = Some(Section::Solution);
            solution = after_colon(line);
        } else if lower.contains("explanation") && colon.is_some() {
            current = Some(Section::Explanation);
            explanation = after_colon(line);
        } else if !line.is_empty() {
            match current {
                Some(Section::Problem) => join(&mut problem_text, line),
                Some(Section::Solution) => join(&mut solution, line),
                Some(Section::Explanation) => join(&mut explanation, line),
                Some(Section::Hints) | None => {}
            }
        }
    }

    GeneratedProblem {
        problem_text: non_empty_or(problem_text, || head_chars(raw)),
        hints: if hints.is_empty() {
            vec![
                "Think about the basics".to_string(),
                "Try breaking it down".to_string(),
            ]
        } else {
            hints
        },
        solution: non_empty_or(solution, || "See explanation".to_string()),
        explanation: non_empty_or(explanation, || raw.to_string()),
    }
}

fn after_colon(line: &str) -> String {
    match line.split_once(':') {
        Some((_, rest)) => rest.trim().to_string(),
        None => line.to_string(),
    }
}

fn join(target: &mut String, line: &str) {
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(line);
}

fn non_empty_or(value: String, default: impl FnOnce() -> String) -> String {
    if value.is_empty() {
        default()
    } else {
        value
    }
}

fn head_chars(raw: &str) -> String {
    raw.chars().take(PROBLEM_TEXT_FALLBACK_CHARS).collect()
}

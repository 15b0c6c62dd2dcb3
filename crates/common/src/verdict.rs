//! Critic verdict parsing.
//!
//! The critic answers in a small line-oriented format:
//!
//! ```text
//! ---
//! VERDICT: APPROVED
//! FEEDBACK: Tighten the second sentence.
//! ---
//! ```
//!
//! Only an explicit `VERDICT:` key counts. It may sit anywhere in a line and
//! may be wrapped in Markdown emphasis or `---` fences. A reply that merely
//! mentions the word "approved" is [`Decision::Unclear`] and never publishes.

use serde::{Deserialize, Serialize};

const VERDICT_KEY: &str = "VERDICT";
const FEEDBACK_KEY: &str = "FEEDBACK";
const FENCE: &str = "---";
const DECORATION: [char; 3] = ['*', '_', ' '];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
    /// No recognisable verdict.
    Unclear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub decision: Decision,
    pub feedback: String,
}

impl Verdict {
    pub fn parse(content: &str) -> Self {
        let mut decision = Decision::Unclear;
        let mut feedback: Vec<&str> = Vec::new();
        let mut in_feedback = false;

        for line in content.lines() {
            let body = strip_fences(line);
            if body.is_empty() && line.trim().starts_with(FENCE) {
                in_feedback = false;
                continue;
            }
            let body = body.trim_start_matches(['*', '-', '#', ' ']);

            if let Some(value) = strip_key(body, FEEDBACK_KEY) {
                in_feedback = true;
                if !value.is_empty() {
                    feedback.push(value);
                }
            } else if let Some(value) = find_key(body, VERDICT_KEY) {
                // First verdict wins; later ones are usually quoted examples.
                if decision == Decision::Unclear {
                    decision = parse_decision(value);
                }
                in_feedback = false;
            } else if in_feedback && !body.is_empty() {
                feedback.push(body);
            }
        }

        Self {
            decision,
            feedback: feedback.join("\n"),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.decision == Decision::Approved
    }
}

/// Drop `---` fences from both ends of a line.
fn strip_fences(line: &str) -> &str {
    let mut body = line.trim();
    while let Some(rest) = body.strip_prefix(FENCE) {
        body = rest.trim_start_matches('-').trim_start();
    }
    while let Some(rest) = body.strip_suffix(FENCE) {
        body = rest.trim_end_matches('-').trim_end();
    }
    body
}

/// Match `KEY:` case-insensitively at the start of `line`, returning the trimmed rest.
fn strip_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let head = line.get(..key.len())?;
    if !head.eq_ignore_ascii_case(key) {
        return None;
    }
    value_after_key(&line[key.len()..])
}

/// Find `KEY:` case-insensitively anywhere in `line` at a word start.
fn find_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    // ASCII case folding keeps byte offsets aligned with `line`.
    let folded = line.to_ascii_uppercase();
    let mut from = 0;
    while let Some(pos) = folded[from..].find(key) {
        let start = from + pos;
        let end = start + key.len();
        let at_word_start = line[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        if at_word_start {
            if let Some(value) = value_after_key(&line[end..]) {
                return Some(value);
            }
        }
        from = end;
    }
    None
}

/// `rest` must open with a colon, allowing emphasis markers around it.
fn value_after_key(rest: &str) -> Option<&str> {
    rest.trim_start_matches(DECORATION)
        .strip_prefix(':')
        .map(|value| value.trim_start_matches(DECORATION).trim())
}

fn parse_decision(value: &str) -> Decision {
    let token: String = value
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect();

    match token.to_ascii_uppercase().as_str() {
        "APPROVED" | "APPROVE" => Decision::Approved,
        "REJECTED" | "REJECT" => Decision::Rejected,
        _ => Decision::Unclear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_approval_with_feedback() {
        let v = Verdict::parse("VERDICT: APPROVED\nFEEDBACK: none");
        assert_eq!(v.decision, Decision::Approved);
        assert_eq!(v.feedback, "none");
        assert!(v.is_approved());
    }

    #[test]
    fn parses_fenced_rejection_with_multiline_feedback() {
        let v = Verdict::parse(
            "---\nVERDICT: REJECTED\nFEEDBACK: Too long.\nDrop the second hashtag.\n---",
        );
        assert_eq!(v.decision, Decision::Rejected);
        assert_eq!(v.feedback, "Too long.\nDrop the second hashtag.");
    }

    #[test]
    fn bracketed_and_lowercase_tokens_are_accepted() {
        assert_eq!(Verdict::parse("verdict: [approved]").decision, Decision::Approved);
        assert_eq!(Verdict::parse("**VERDICT: REJECTED**").decision, Decision::Rejected);
    }

    #[test]
    fn mentioning_approval_without_verdict_line_is_unclear() {
        let v = Verdict::parse("This would be approved if it were shorter.");
        assert_eq!(v.decision, Decision::Unclear);
    }

    #[test]
    fn negated_verdict_is_not_approval() {
        assert_eq!(Verdict::parse("VERDICT: NOT APPROVED").decision, Decision::Unclear);
    }

    #[test]
    fn first_verdict_line_wins() {
        let v = Verdict::parse("VERDICT: REJECTED\nFEEDBACK: x\nVERDICT: APPROVED");
        assert_eq!(v.decision, Decision::Rejected);
    }

    #[test]
    fn verdict_after_prose_on_the_same_line() {
        let v = Verdict::parse("Solid tweet. VERDICT: APPROVED\nFEEDBACK: none");
        assert_eq!(v.decision, Decision::Approved);
        assert_eq!(v.feedback, "none");
    }

    #[test]
    fn single_line_fenced_verdict() {
        let v = Verdict::parse("--- VERDICT: APPROVED ---");
        assert_eq!(v.decision, Decision::Approved);

        let v = Verdict::parse("---VERDICT: REJECTED FEEDBACK: too long---");
        assert_eq!(v.decision, Decision::Rejected);
    }

    #[test]
    fn markdown_bold_key() {
        assert_eq!(Verdict::parse("**VERDICT:** APPROVED").decision, Decision::Approved);
        assert_eq!(
            Verdict::parse("Looks good.\n__Verdict__: rejected").decision,
            Decision::Rejected
        );
    }

    #[test]
    fn key_inside_a_word_is_ignored() {
        assert_eq!(Verdict::parse("PREVERDICT: APPROVED").decision, Decision::Unclear);
    }

    #[test]
    fn template_placeholder_is_unclear() {
        assert_eq!(
            Verdict::parse("VERDICT: [APPROVED/REJECTED]").decision,
            Decision::Unclear
        );
    }
}

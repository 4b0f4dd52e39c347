//! Suggestion text format
//!
//! Vision providers answer in plain text:
//!
//! ```text
//! TC-001: User Login - Valid Credentials
//! Type: FUNC
//! Priority: P0
//! Preconditions: User is on login page
//! Steps:
//! 1. Enter valid username in username field
//! 2. Click login button
//! Expected Result: User is redirected to dashboard
//! Covered Elements: username field, login button
//! ```
//!
//! Parsing is lenient: unknown lines are skipped, missing sections stay
//! empty and validation happens later in the orchestrator.

use super::CandidateRecord;
use regex::Regex;
use std::sync::OnceLock;

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:\*\*)?TC-\d+(?:\*\*)?\s*(?:[:\-.]\s*(.*))?$").expect("valid header regex")
    })
}

fn numbered_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\d+[.)]|[-*])\s+(.+)$").expect("valid step regex"))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Steps,
    Expected,
}

/// Split a labelled line (`Type: FUNC`) into its value, case-insensitively
fn labelled<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let (head, rest) = line.split_once(':')?;
    head.trim()
        .trim_matches('*')
        .eq_ignore_ascii_case(label)
        .then(|| rest.trim())
}

/// Parse every `TC-nnn` block of a suggestion text
pub fn parse_suggestion_text(text: &str) -> Vec<CandidateRecord> {
    let mut records = Vec::new();
    let mut current: Option<CandidateRecord> = None;
    let mut section = Section::None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("```") {
            continue;
        }

        if let Some(caps) = header_regex().captures(line) {
            records.extend(current.take());
            current = Some(CandidateRecord {
                title: caps
                    .get(1)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
                ..Default::default()
            });
            section = Section::None;
            continue;
        }
        let Some(record) = current.as_mut() else {
            continue;
        };

        if let Some(value) = labelled(line, "title") {
            record.title = value.to_string();
        } else if let Some(value) = labelled(line, "type") {
            record.test_type = Some(value.to_string()).filter(|v| !v.is_empty());
        } else if let Some(value) = labelled(line, "priority") {
            record.priority = Some(value.to_string()).filter(|v| !v.is_empty());
        } else if labelled(line, "preconditions").is_some() {
            section = Section::None;
        } else if let Some(value) = labelled(line, "steps") {
            section = Section::Steps;
            if !value.is_empty() {
                record.steps.push(value.to_string());
            }
        } else if let Some(value) = labelled(line, "expected result")
            .or_else(|| labelled(line, "expected"))
        {
            section = Section::Expected;
            if !value.is_empty() {
                record.expected.push(value.to_string());
            }
        } else if let Some(value) = labelled(line, "covered elements") {
            section = Section::None;
            record.elements.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        } else if let Some(value) = labelled(line, "covers") {
            section = Section::None;
            record.covers.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        } else if let Some(caps) = numbered_regex().captures(line) {
            let item = caps[1].trim().to_string();
            match section {
                Section::Steps => record.steps.push(item),
                Section::Expected => record.expected.push(item),
                Section::None => {}
            }
        } else if section == Section::Expected {
            record.expected.push(line.to_string());
        }
    }
    records.extend(current);
    tracing::debug!(records = records.len(), "parsed suggestion text");
    records
}

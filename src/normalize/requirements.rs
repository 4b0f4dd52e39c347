//! Free-text requirement lists
//!
//! ```text
//! # Login
//! - REQ-1: The system must support login [Must]
//!   Sessions expire after 30 minutes.
//! - Password reset should be available
//! Flow [FLOW-LOGIN]: open app > enter credentials > dashboard (REQ-1)
//! ```
//!
//! A line carrying a requirement id starts a requirement; indented or
//! plain follow-up lines continue it until a blank line or heading. Lines
//! outside any id'd requirement become requirements of their own with a
//! synthesized `REQ-<line>` id.

use crate::model::{Flow, Requirement, RequirementPriority, SourceKind};
use crate::util::contains_word;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Keyword table, checked in order; the first family with a hit wins
const PRIORITY_KEYWORDS: &[(RequirementPriority, &[&str])] = &[
    (RequirementPriority::Wont, &["won't", "will not", "wont"]),
    (
        RequirementPriority::Must,
        &["must", "shall", "required", "critical"],
    ),
    (RequirementPriority::Should, &["should", "important"]),
    (RequirementPriority::Could, &["could", "optional", "nice to have"]),
];

fn id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:REQUIREMENT-\d+|REQ-\d+|REQ_\w+_\d+|R-\d+)\b")
            .expect("valid requirement id regex")
    })
}

fn bullet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[-*+•]\s+|\d+[.)]\s+)(?i:requirement\s*:\s*)?|^(?i:requirement\s*:\s*)")
            .expect("valid bullet regex")
    })
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\[(must|should|could|won'?t)\]|\bpriority\s*[:=]\s*(must|should|could|won'?t)\b")
            .expect("valid priority marker regex")
    })
}

fn flow_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^flow(?:\s*\[([^\]]+)\])?\s*:\s*(.+)$").expect("valid flow regex")
    })
}

/// Requirements and flows found in one text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRequirements {
    pub requirements: Vec<Requirement>,
    pub flows: Vec<Flow>,
}

struct Pending {
    id: String,
    parts: Vec<String>,
}

/// Parse a requirement document
pub fn parse_requirements(text: &str) -> ParsedRequirements {
    let mut parsed = ParsedRequirements::default();
    let mut current: Option<Pending> = None;

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = raw_line.trim().replace('\u{2019}', "'");

        if trimmed.is_empty() || trimmed.starts_with('#') {
            flush(&mut current, &mut parsed.requirements);
            continue;
        }

        let line = bullet_regex().replace(&trimmed, "").trim().to_string();
        if line.is_empty() {
            continue;
        }

        if let Some(flow) = parse_flow(&line, line_no) {
            flush(&mut current, &mut parsed.requirements);
            parsed.flows.push(flow);
            continue;
        }

        if let Some(found) = id_regex().find(&line) {
            flush(&mut current, &mut parsed.requirements);
            let mut rest = String::with_capacity(line.len());
            rest.push_str(&line[..found.start()]);
            rest.push_str(&line[found.end()..]);
            current = Some(Pending {
                id: found.as_str().to_string(),
                parts: vec![clean_fragment(&rest)],
            });
        } else if let Some(pending) = current.as_mut() {
            pending.parts.push(collapse(&line));
        } else {
            parsed
                .requirements
                .push(finish(format!("REQ-{:03}", line_no), &collapse(&line)));
        }
    }
    flush(&mut current, &mut parsed.requirements);

    tracing::debug!(
        requirements = parsed.requirements.len(),
        flows = parsed.flows.len(),
        "parsed requirement text"
    );
    parsed
}

/// Priority implied by keywords in the text; `Could` when nothing matches
pub fn infer_priority(text: &str) -> RequirementPriority {
    let lower = text.to_lowercase().replace('\u{2019}', "'");
    PRIORITY_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| contains_word(&lower, w)))
        .map(|(priority, _)| *priority)
        .unwrap_or(RequirementPriority::Could)
}

fn parse_flow(line: &str, line_no: usize) -> Option<Flow> {
    let caps = flow_regex().captures(line)?;
    let id = caps
        .get(1)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("FLOW-{:03}", line_no));
    let body = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

    let related: BTreeSet<String> = id_regex()
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .collect();
    let without_ids = id_regex().replace_all(body, "");
    let steps: Vec<String> = without_ids
        .replace("->", ">")
        .split('>')
        .map(clean_fragment)
        .filter(|s| !s.is_empty())
        .collect();
    if steps.is_empty() {
        return None;
    }
    Some(Flow {
        id,
        steps,
        related_requirement_ids: related,
    })
}

fn flush(current: &mut Option<Pending>, out: &mut Vec<Requirement>) {
    if let Some(pending) = current.take() {
        let text = pending
            .parts
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        out.push(finish(pending.id, &text));
    }
}

fn finish(id: String, raw: &str) -> Requirement {
    let explicit = marker_regex().captures(raw).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| RequirementPriority::parse(m.as_str()))
    });
    let text = collapse(&marker_regex().replace_all(raw, ""));
    let priority = explicit.unwrap_or_else(|| infer_priority(&text));
    Requirement {
        id,
        text,
        priority,
        source_type: SourceKind::RequirementText,
    }
}

/// Drop separators and empty brackets left behind after removing an id
fn clean_fragment(s: &str) -> String {
    let s = s.replace("()", " ").replace("[]", " ");
    collapse(&s)
        .trim_matches(|c: char| c == ':' || c == '-' || c == '.' || c.is_whitespace())
        .to_string()
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("The system must support login", RequirementPriority::Must)]
    #[case("Users shall be locked out after 5 attempts", RequirementPriority::Must)]
    #[case("Export should be fast", RequirementPriority::Should)]
    #[case("Dark mode is nice to have", RequirementPriority::Could)]
    #[case("We won't support IE11", RequirementPriority::Wont)]
    #[case("Search results are paginated", RequirementPriority::Could)]
    #[case("The mustard color is used", RequirementPriority::Could)]
    fn test_infer_priority(#[case] text: &str, #[case] expected: RequirementPriority) {
        assert_eq!(infer_priority(text), expected);
    }

    #[test]
    fn test_ids_continuations_and_synthesized_ids() {
        let text = "\
# Auth
- REQ-1: The system must support login
  Sessions expire after 30 minutes.

1. Password reset should be available
REQ_AUTH_2 - Logout could be offered
";
        let parsed = parse_requirements(text);
        let ids: Vec<&str> = parsed.requirements.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["REQ-1", "REQ-005", "REQ_AUTH_2"]);

        let first = &parsed.requirements[0];
        assert_eq!(
            first.text,
            "The system must support login Sessions expire after 30 minutes."
        );
        assert_eq!(first.priority, RequirementPriority::Must);
        assert_eq!(parsed.requirements[1].text, "Password reset should be available");
        assert_eq!(parsed.requirements[1].priority, RequirementPriority::Should);
        assert_eq!(parsed.requirements[2].text, "Logout could be offered");
    }

    #[test]
    fn test_explicit_marker_wins_over_keywords() {
        let parsed = parse_requirements("REQ-7: Users must see a banner [Could]\nR-8: Audit log. Priority: Should");
        assert_eq!(parsed.requirements[0].priority, RequirementPriority::Could);
        assert_eq!(parsed.requirements[0].text, "Users must see a banner");
        assert_eq!(parsed.requirements[1].id, "R-8");
        assert_eq!(parsed.requirements[1].priority, RequirementPriority::Should);
        assert_eq!(parsed.requirements[1].text, "Audit log.");
    }

    #[test]
    fn test_id_in_trailing_parentheses() {
        let parsed = parse_requirements("Requirement: Login must lock after 5 failures (REQ-12)");
        assert_eq!(parsed.requirements.len(), 1);
        assert_eq!(parsed.requirements[0].id, "REQ-12");
        assert_eq!(parsed.requirements[0].text, "Login must lock after 5 failures");
    }

    #[test]
    fn test_flow_lines() {
        let parsed = parse_requirements(
            "REQ-1: must support login\nFlow [FLOW-LOGIN]: open app > enter credentials -> dashboard (REQ-1)\nflow: a > b",
        );
        assert_eq!(parsed.requirements.len(), 1);
        assert_eq!(parsed.flows.len(), 2);
        let login = &parsed.flows[0];
        assert_eq!(login.id, "FLOW-LOGIN");
        assert_eq!(login.steps, vec!["open app", "enter credentials", "dashboard"]);
        assert!(login.related_requirement_ids.contains("REQ-1"));
        assert_eq!(parsed.flows[1].id, "FLOW-003");
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(parse_requirements("\n\n   \n"), ParsedRequirements::default());
    }
}

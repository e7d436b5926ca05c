//! Prompt rendering for the reviewer and evaluator calls.

use crate::errors::{EvalError, EvalResult};
use crate::model::{GroundTruth, ReviewResponse};
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::LazyLock;

pub const REVIEWER_TEMPLATE: &str = include_str!("../prompts/reviewer.md");
pub const EVALUATOR_TEMPLATE: &str = include_str!("../prompts/evaluator.md");

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex"));

/// Substitute `{name}` placeholders in a single pass.
///
/// Every placeholder in the template must be bound and every parameter must be
/// used; substituted values are never rescanned, so braces inside a source file
/// cannot be mistaken for placeholders.
pub fn render(template: &str, params: &[(&str, &str)]) -> EvalResult<String> {
    let found: BTreeSet<&str> = PLACEHOLDER
        .captures_iter(template)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    if let Some(unbound) = found
        .iter()
        .find(|name| !params.iter().any(|(k, _)| k == *name))
    {
        return Err(EvalError::Template {
            message: format!("placeholder {{{unbound}}} has no value"),
        });
    }
    if let Some((missing, _)) = params.iter().find(|(k, _)| !found.contains(k)) {
        return Err(EvalError::Template {
            message: format!("template does not contain placeholder {{{missing}}}"),
        });
    }

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let name = &caps[1];
        params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| (*v).to_string())
            .unwrap_or_default()
    });
    Ok(rendered.into_owned())
}

/// Reviewer prompt from file content and diff. `template` overrides the built-in one.
pub fn reviewer_prompt(
    file_content: &str,
    diff_text: &str,
    template: Option<&str>,
) -> EvalResult<String> {
    render(
        template.unwrap_or(REVIEWER_TEMPLATE),
        &[("file", file_content), ("diff", diff_text)],
    )
}

/// Evaluator prompt from two already-serialized payloads.
pub fn evaluator_prompt(ground_truth_json: &str, candidate_json: &str) -> EvalResult<String> {
    render(
        EVALUATOR_TEMPLATE,
        &[("ground_truth", ground_truth_json), ("candidate", candidate_json)],
    )
}

/// Serialize both reviews and render the evaluator prompt.
pub fn evaluator_prompt_for(
    ground_truth: &GroundTruth,
    candidate: &ReviewResponse,
) -> EvalResult<String> {
    let to_json = |v: &ReviewResponse| {
        serde_json::to_string_pretty(v).map_err(|e| EvalError::Template {
            message: format!("failed to serialize review: {e}"),
        })
    };
    evaluator_prompt(&to_json(ground_truth)?, &to_json(candidate)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reviewer_prompt_embeds_file_and_diff() {
        let prompt = reviewer_prompt("const a = 1;", "1 + const a = 1;", None).unwrap();
        assert!(prompt.contains("const a = 1;"));
        assert!(prompt.contains("1 + const a = 1;"));
        assert!(!prompt.contains("{file}"));
        assert!(!prompt.contains("{diff}"));
        for label in crate::model::SuggestionLabel::ALL {
            assert!(prompt.contains(label.as_str()), "missing label {label}");
        }
    }

    #[test]
    fn values_with_braces_are_not_rescanned() {
        let file = "function f() { return `${diff}`; } // {file}";
        let prompt = reviewer_prompt(file, "+ x", None).unwrap();
        assert!(prompt.contains(file));
    }

    #[test]
    fn override_missing_a_placeholder_fails_loudly() {
        let err = reviewer_prompt("a", "b", Some("Review this: {file}")).unwrap_err();
        assert!(matches!(err, EvalError::Template { .. }));
        assert!(err.to_string().contains("{diff}"));
    }

    #[test]
    fn unbound_placeholder_fails_loudly() {
        let err = render("{file} {diff} {language}", &[("file", "a"), ("diff", "b")]).unwrap_err();
        assert!(err.to_string().contains("{language}"));
    }

    #[test]
    fn repeated_placeholder_is_replaced_everywhere() {
        let out = render("{diff}\n---\n{diff}", &[("diff", "+x")]).unwrap();
        assert_eq!(out, "+x\n---\n+x");
    }

    #[test]
    fn evaluator_prompt_states_match_criteria() {
        let prompt = evaluator_prompt("{\"gt\": 1}", "{\"cand\": 2}").unwrap();
        assert!(prompt.contains("{\"gt\": 1}"));
        assert!(prompt.contains("{\"cand\": 2}"));
        assert!(prompt.contains("±3 lines"));
        assert!(prompt.contains("root cause"));
    }
}

//! Data model shared by the pipeline: test cases, review payloads and scores.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Review categories. The reviewer prompt only admits these eight values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionLabel {
    Security,
    ErrorHandling,
    Refactoring,
    PerformanceAndOptimization,
    Maintainability,
    PotentialIssues,
    CodeStyle,
    DocumentationAndComments,
}

impl SuggestionLabel {
    pub const ALL: [SuggestionLabel; 8] = [
        Self::Security,
        Self::ErrorHandling,
        Self::Refactoring,
        Self::PerformanceAndOptimization,
        Self::Maintainability,
        Self::PotentialIssues,
        Self::CodeStyle,
        Self::DocumentationAndComments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::ErrorHandling => "error_handling",
            Self::Refactoring => "refactoring",
            Self::PerformanceAndOptimization => "performance_and_optimization",
            Self::Maintainability => "maintainability",
            Self::PotentialIssues => "potential_issues",
            Self::CodeStyle => "code_style",
            Self::DocumentationAndComments => "documentation_and_comments",
        }
    }
}

impl fmt::Display for SuggestionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One code-review suggestion, either curated (ground truth) or model-produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSuggestion {
    pub relevant_file: String,
    pub language: String,
    pub suggestion_content: String,
    #[serde(default)]
    pub existing_code: String,
    #[serde(default)]
    pub improved_code: String,
    pub one_sentence_summary: String,
    #[serde(deserialize_with = "de_line_number")]
    pub relevant_lines_start: u32,
    #[serde(deserialize_with = "de_line_number")]
    pub relevant_lines_end: u32,
    pub label: SuggestionLabel,
}

impl CodeSuggestion {
    pub fn validate(&self) -> Result<(), String> {
        if self.relevant_lines_start > self.relevant_lines_end {
            return Err(format!(
                "relevantLinesStart ({}) > relevantLinesEnd ({}) in {}",
                self.relevant_lines_start, self.relevant_lines_end, self.relevant_file
            ));
        }
        Ok(())
    }
}

/// Line numbers arrive as numbers or, following the prompt's example, as numeric strings.
fn de_line_number<'de, D>(d: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u32),
        Text(String),
    }

    match Raw::deserialize(d)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| serde::de::Error::custom(format!("invalid line number: {s:?}"))),
    }
}

/// `{overallSummary, codeSuggestions}` as produced by the reviewer model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub overall_summary: String,
    #[serde(default)]
    pub code_suggestions: Vec<CodeSuggestion>,
}

/// Curated reference review. Same shape as [`ReviewResponse`], different role.
pub type GroundTruth = ReviewResponse;

impl ReviewResponse {
    pub fn validate(&self) -> Result<(), String> {
        for (idx, s) in self.code_suggestions.iter().enumerate() {
            s.validate().map_err(|e| format!("codeSuggestions[{idx}]: {e}"))?;
        }
        Ok(())
    }
}

/// Immutable test fixture: source file, diff and the expected review.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub file_content: String,
    pub diff_text: String,
    pub ground_truth: GroundTruth,
}

/// One ground-truth suggestion paired with at most one candidate suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionMatch {
    pub ground_truth: CodeSuggestion,
    #[serde(rename = "llmResponse")]
    pub candidate: Option<CodeSuggestion>,
    pub is_match: bool,
    pub similarity: f64,
    pub reasoning: String,
}

/// Score for one test case, either a single trial or the aggregate of several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub test_case: String,
    pub overall_match: bool,
    pub overall_similarity: f64,
    pub suggestion_matches: Vec<SuggestionMatch>,
    pub total_suggestions: f64,
    pub matched_suggestions: f64,
    pub accuracy: f64,
    pub detailed_analysis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_run_results: Option<Vec<EvaluationResult>>,
}

/// Raw scoring object requested from the evaluator model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorVerdict {
    pub overall_match: bool,
    pub overall_similarity: f64,
    #[serde(default)]
    pub suggestion_matches: Vec<VerdictMatch>,
    pub total_suggestions: f64,
    pub matched_suggestions: f64,
    pub accuracy: f64,
    #[serde(default)]
    pub detailed_analysis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictMatch {
    pub ground_truth_index: usize,
    #[serde(default)]
    pub llm_response_index: Option<usize>,
    pub is_match: bool,
    pub similarity: f64,
    #[serde(default)]
    pub reasoning: String,
}

fn check_percentage(field: &str, value: f64) -> Result<(), String> {
    if !(0.0..=100.0).contains(&value) {
        return Err(format!("{field} must be within [0, 100], got {value}"));
    }
    Ok(())
}

impl EvaluatorVerdict {
    /// Resolve index references against the two suggestion lists the evaluator was shown.
    pub fn resolve(
        self,
        test_case: &str,
        ground_truth: &GroundTruth,
        candidate: &ReviewResponse,
    ) -> Result<EvaluationResult, String> {
        check_percentage("accuracy", self.accuracy)?;
        check_percentage("overallSimilarity", self.overall_similarity)?;
        if self.total_suggestions < 0.0 || self.matched_suggestions < 0.0 {
            return Err("suggestion counts must be non-negative".to_string());
        }

        let mut matches = Vec::with_capacity(self.suggestion_matches.len());
        for (idx, m) in self.suggestion_matches.into_iter().enumerate() {
            check_percentage(&format!("suggestionMatches[{idx}].similarity"), m.similarity)?;
            let gt = ground_truth
                .code_suggestions
                .get(m.ground_truth_index)
                .ok_or_else(|| {
                    format!(
                        "suggestionMatches[{idx}].groundTruthIndex {} out of range ({} ground-truth suggestions)",
                        m.ground_truth_index,
                        ground_truth.code_suggestions.len()
                    )
                })?;
            let cand = match m.llm_response_index {
                Some(ci) => Some(candidate.code_suggestions.get(ci).cloned().ok_or_else(
                    || {
                        format!(
                            "suggestionMatches[{idx}].llmResponseIndex {ci} out of range ({} candidate suggestions)",
                            candidate.code_suggestions.len()
                        )
                    },
                )?),
                None => None,
            };
            matches.push(SuggestionMatch {
                ground_truth: gt.clone(),
                candidate: cand,
                is_match: m.is_match,
                similarity: m.similarity,
                reasoning: m.reasoning,
            });
        }

        Ok(EvaluationResult {
            test_case: test_case.to_string(),
            overall_match: self.overall_match,
            overall_similarity: self.overall_similarity,
            suggestion_matches: matches,
            total_suggestions: self.total_suggestions,
            matched_suggestions: self.matched_suggestions,
            accuracy: self.accuracy,
            detailed_analysis: self.detailed_analysis,
            repetition_count: None,
            per_run_results: None,
        })
    }
}

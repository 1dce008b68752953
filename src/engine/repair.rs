//! Repair acceptance policy.
//!
//! Test output is cut into candidate errors before the repairer sees it.
//! Fixes come back with a confidence score and only those strictly above
//! [`CONFIDENCE_THRESHOLD`] are merged. Repair is attempted once per
//! iteration; nothing is re-tested within the same iteration.

use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::collab::{CandidateError, ProposedFix, RepairOutcome};

/// A fix must score strictly above this to be merged.
pub const CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Candidate errors (and fixes) considered per repair attempt.
pub const MAX_CANDIDATE_ERRORS: usize = 5;

const ERROR_MARKERS: [&str; 4] = ["FAILED", "ERROR", "Error:", "Traceback"];

fn marker_regex() -> Option<&'static Regex> {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
    MARKER
        .get_or_init(|| {
            let pattern = ERROR_MARKERS
                .iter()
                .map(|m| regex::escape(m))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&pattern).ok()
        })
        .as_ref()
}

fn is_marker_line(line: &str) -> bool {
    match marker_regex() {
        Some(re) => re.is_match(line),
        None => ERROR_MARKERS.iter().any(|m| line.contains(m)),
    }
}

/// Split test output into candidate errors.
///
/// A candidate starts at every line containing `FAILED`, `ERROR`, `Error:`
/// or `Traceback`; following lines belong to it until the next marker.
/// Lines before the first marker are dropped. At most
/// [`MAX_CANDIDATE_ERRORS`] candidates are returned.
///
/// # Example
///
/// ```
/// use foreman::engine::repair::extract_candidate_errors;
///
/// let output = "collected 2 items\nFAILED test_a\n  assert 1 == 2\nERROR test_b";
/// let errors = extract_candidate_errors(output);
/// assert_eq!(errors.len(), 2);
/// assert_eq!(errors[0].text, "FAILED test_a\n  assert 1 == 2");
/// assert_eq!(errors[1].line, 4);
/// ```
#[must_use]
pub fn extract_candidate_errors(output: &str) -> Vec<CandidateError> {
    let mut errors: Vec<CandidateError> = Vec::new();
    let mut current: Option<(usize, Vec<&str>)> = None;

    for (idx, line) in output.lines().enumerate() {
        if is_marker_line(line) {
            if let Some((start, lines)) = current.take() {
                errors.push(CandidateError {
                    line: start,
                    text: lines.join("\n"),
                });
                if errors.len() == MAX_CANDIDATE_ERRORS {
                    return errors;
                }
            }
            current = Some((idx + 1, vec![line]));
        } else if let Some((_, ref mut lines)) = current {
            lines.push(line);
        }
    }

    if let Some((start, lines)) = current {
        errors.push(CandidateError {
            line: start,
            text: lines.join("\n"),
        });
    }
    errors.truncate(MAX_CANDIDATE_ERRORS);
    errors
}

/// Whether a fix clears the confidence threshold.
#[must_use]
pub fn is_accepted(fix: &ProposedFix) -> bool {
    fix.confidence > CONFIDENCE_THRESHOLD
}

/// Fixes from one repair attempt, split by the acceptance policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairVerdict {
    pub accepted: Vec<ProposedFix>,
    pub rejected: Vec<ProposedFix>,
    /// Fixes past [`MAX_CANDIDATE_ERRORS`] that were never considered.
    pub ignored: usize,
}

impl RepairVerdict {
    /// Apply the acceptance policy to a repair outcome.
    #[must_use]
    pub fn judge(outcome: RepairOutcome) -> Self {
        let total = outcome.fixes.len();
        let mut verdict = Self {
            ignored: total.saturating_sub(MAX_CANDIDATE_ERRORS),
            ..Self::default()
        };

        for fix in outcome.fixes.into_iter().take(MAX_CANDIDATE_ERRORS) {
            if is_accepted(&fix) {
                debug!(confidence = fix.confidence, files = fix.files.len(), "fix accepted");
                verdict.accepted.push(fix);
            } else {
                warn!(
                    "Rejecting fix with confidence {:.2} (threshold {:.2})",
                    fix.confidence, CONFIDENCE_THRESHOLD
                );
                verdict.rejected.push(fix);
            }
        }

        if verdict.ignored > 0 {
            warn!("Ignoring {} fixes beyond the first {}", verdict.ignored, MAX_CANDIDATE_ERRORS);
        }
        verdict
    }

    /// Files from accepted fixes, in fix order. Later fixes win on a
    /// duplicate path when merged.
    pub fn accepted_files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.accepted
            .iter()
            .flat_map(|fix| fix.files.iter().map(|(p, c)| (p.as_str(), c.as_str())))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

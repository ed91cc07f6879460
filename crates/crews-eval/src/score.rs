//! `TaskEvaluation`: the scored verdict for one task output, plus the
//! structured-JSON / free-text parsing that produces it and the grade
//! thresholds shared by both per-task and aggregate reporting.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskEvaluation {
    pub score: f64,
    pub completion_score: Option<f64>,
    pub quality_score: Option<f64>,
    pub performance_score: Option<f64>,
    pub feedback: String,
    pub suggestions: Vec<String>,
    pub entities: Vec<String>,
    pub grade: String,
}

/// Letter grade for a 0-10 score, used both per-task and at the crew
/// aggregate level.
pub fn grade_for_score(score: f64) -> &'static str {
    if score >= 9.0 {
        "A+"
    } else if score >= 8.0 {
        "A"
    } else if score >= 7.0 {
        "B"
    } else if score >= 6.0 {
        "C"
    } else if score >= 5.0 {
        "D"
    } else {
        "F"
    }
}

/// Aggregate-level performance label, same thresholds as `grade_for_score`
/// but the word labels spec §4.5 names for crew-wide statistics rather than
/// per-task letter grades.
pub fn performance_label_for_score(score: f64) -> &'static str {
    if score >= 9.0 {
        "Excellent"
    } else if score >= 8.0 {
        "Very Good"
    } else if score >= 7.0 {
        "Good"
    } else if score >= 6.0 {
        "Satisfactory"
    } else if score >= 5.0 {
        "Needs Improvement"
    } else {
        "Poor"
    }
}

/// The closed set of metric categories an `EvaluationConfig` can enable
/// (spec §3). The evaluator prompt names whichever categories are enabled
/// so the LLM knows what dimensions to weigh; scoring itself still reduces
/// to the same structured `score`/sub-score fields in `TaskEvaluation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    GoalAlignment,
    SemanticQuality,
    TaskCompletion,
    Efficiency,
    Accuracy,
    Creativity,
    Coherence,
    Relevance,
}

impl MetricCategory {
    pub fn all() -> Vec<MetricCategory> {
        vec![
            MetricCategory::GoalAlignment,
            MetricCategory::SemanticQuality,
            MetricCategory::TaskCompletion,
            MetricCategory::Efficiency,
            MetricCategory::Accuracy,
            MetricCategory::Creativity,
            MetricCategory::Coherence,
            MetricCategory::Relevance,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricCategory::GoalAlignment => "goal alignment",
            MetricCategory::SemanticQuality => "semantic quality",
            MetricCategory::TaskCompletion => "task completion",
            MetricCategory::Efficiency => "efficiency",
            MetricCategory::Accuracy => "accuracy",
            MetricCategory::Creativity => "creativity",
            MetricCategory::Coherence => "coherence",
            MetricCategory::Relevance => "relevance",
        }
    }
}

/// The raw JSON shape an evaluator LLM is instructed to emit.
#[derive(Debug, Deserialize)]
struct StructuredEvaluation {
    score: Option<f64>,
    completion_score: Option<f64>,
    quality_score: Option<f64>,
    performance_score: Option<f64>,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    entities: Vec<String>,
}

/// Parses an evaluator's response into a `TaskEvaluation`. Tries structured
/// JSON first; falls back to a heuristic `"Score: N"` scan over free text.
/// The overall score is the explicit `score` field if present, else the
/// mean of whichever of the three sub-scores were given; the result is
/// always clamped to [0, 10].
pub fn parse_evaluation(raw: &str) -> Result<TaskEvaluation> {
    if let Ok(structured) = serde_json::from_str::<StructuredEvaluation>(raw.trim()) {
        let overall = structured.score.unwrap_or_else(|| {
            let subs: Vec<f64> = [
                structured.completion_score,
                structured.quality_score,
                structured.performance_score,
            ]
            .into_iter()
            .flatten()
            .collect();
            if subs.is_empty() {
                0.0
            } else {
                subs.iter().sum::<f64>() / subs.len() as f64
            }
        });
        let clamped = overall.clamp(0.0, 10.0);
        return Ok(TaskEvaluation {
            score: clamped,
            completion_score: structured.completion_score,
            quality_score: structured.quality_score,
            performance_score: structured.performance_score,
            feedback: structured.feedback,
            suggestions: structured.suggestions,
            entities: structured.entities,
            grade: grade_for_score(clamped).to_string(),
        });
    }

    let re = Regex::new(r"(?i)score\s*[:\-]\s*(-?\d+(?:\.\d+)?)").expect("valid regex literal");
    let captured = re
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or(EvalError::Unparseable)?;
    let clamped = captured.clamp(0.0, 10.0);

    Ok(TaskEvaluation {
        score: clamped,
        completion_score: None,
        quality_score: None,
        performance_score: None,
        feedback: raw.trim().to_string(),
        suggestions: Vec::new(),
        entities: Vec::new(),
        grade: grade_for_score(clamped).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_boundaries_match_thresholds() {
        assert_eq!(grade_for_score(9.0), "A+");
        assert_eq!(grade_for_score(8.5), "A");
        assert_eq!(grade_for_score(7.0), "B");
        assert_eq!(grade_for_score(6.0), "C");
        assert_eq!(grade_for_score(5.0), "D");
        assert_eq!(grade_for_score(4.999), "F");
    }

    #[test]
    fn parses_structured_json_with_explicit_score() {
        let raw = r#"{"score": 8.2, "feedback": "solid work"}"#;
        let eval = parse_evaluation(raw).unwrap();
        assert_eq!(eval.score, 8.2);
        assert_eq!(eval.grade, "A");
        assert_eq!(eval.feedback, "solid work");
    }

    #[test]
    fn derives_score_from_mean_of_sub_scores_when_absent() {
        let raw = r#"{"completion_score": 8.0, "quality_score": 6.0}"#;
        let eval = parse_evaluation(raw).unwrap();
        assert_eq!(eval.score, 7.0);
    }

    #[test]
    fn clamps_out_of_range_structured_score() {
        let raw = r#"{"score": 14.0}"#;
        let eval = parse_evaluation(raw).unwrap();
        assert_eq!(eval.score, 10.0);
    }

    #[test]
    fn parses_free_text_score_heuristically() {
        let raw = "The response covers the topic well.\nScore: 7.5\nKeep it up.";
        let eval = parse_evaluation(raw).unwrap();
        assert_eq!(eval.score, 7.5);
        assert_eq!(eval.grade, "B");
    }

    #[test]
    fn rejects_text_with_no_parseable_score() {
        assert!(parse_evaluation("no numeric verdict here").is_err());
    }

    #[test]
    fn performance_label_boundaries_match_thresholds() {
        assert_eq!(performance_label_for_score(9.5), "Excellent");
        assert_eq!(performance_label_for_score(8.0), "Very Good");
        assert_eq!(performance_label_for_score(7.2), "Good");
        assert_eq!(performance_label_for_score(6.0), "Satisfactory");
        assert_eq!(performance_label_for_score(5.1), "Needs Improvement");
        assert_eq!(performance_label_for_score(2.0), "Poor");
    }

    #[test]
    fn metric_category_all_contains_eight_categories() {
        assert_eq!(MetricCategory::all().len(), 8);
    }

    #[test]
    fn serialization_round_trip_preserves_quality_score() {
        let eval = TaskEvaluation {
            score: 8.0,
            completion_score: None,
            quality_score: Some(7.5),
            performance_score: None,
            feedback: "ok".to_string(),
            suggestions: vec![],
            entities: vec![],
            grade: "A".to_string(),
        };
        let json = serde_json::to_string(&eval).unwrap();
        let restored: TaskEvaluation = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.quality_score, Some(7.5));
    }
}

//! `TaskEvaluator`: scores one task's output by asking the evaluator LLM to
//! grade it against the task's description and expected output.

use std::collections::HashMap;
use std::sync::Arc;

use crews_core::{CallOptions, Message};
use crews_llm::LlmTransport;

use crate::error::Result;
use crate::score::{parse_evaluation, MetricCategory, TaskEvaluation};

#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    pub verbose: bool,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub passing_score: f64,
    /// Which metric categories the evaluator prompt should ask the LLM to
    /// weigh (spec §3's closed set). Defaults to all eight.
    pub enabled_metrics: Vec<MetricCategory>,
    /// Extra named grading criteria beyond the fixed metric categories,
    /// e.g. `{"tone": "must stay formal"}`.
    pub custom_criteria: HashMap<String, String>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            verbose: false,
            max_retries: 2,
            timeout_secs: 30,
            passing_score: 6.0,
            enabled_metrics: MetricCategory::all(),
            custom_criteria: HashMap::new(),
        }
    }
}

#[derive(Clone)]
pub struct TaskEvaluator {
    llm: Arc<dyn LlmTransport>,
    config: EvaluationConfig,
}

impl TaskEvaluator {
    pub fn new(llm: Arc<dyn LlmTransport>, config: EvaluationConfig) -> Self {
        TaskEvaluator { llm, config }
    }

    fn prompt(&self, description: &str, expected_output: &str, actual_output: &str) -> String {
        let metrics = self
            .config
            .enabled_metrics
            .iter()
            .map(|m| m.label())
            .collect::<Vec<_>>()
            .join(", ");
        let criteria = if self.config.custom_criteria.is_empty() {
            String::new()
        } else {
            let lines = self
                .config
                .custom_criteria
                .iter()
                .map(|(k, v)| format!("- {k}: {v}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("\nAdditional grading criteria:\n{lines}")
        };
        format!(
            "You are grading a completed task.\n\
             Task: {description}\n\
             Expected output: {expected_output}\n\
             Actual output: {actual_output}\n\n\
             Weigh these dimensions: {metrics}.{criteria}\n\n\
             Respond with a JSON object: \
             {{\"score\": <0-10>, \"completion_score\": <0-10>, \"quality_score\": <0-10>, \
             \"performance_score\": <0-10>, \"feedback\": <string>, \"suggestions\": [<string>], \
             \"entities\": [<string>]}}. \
             If you cannot produce JSON, respond with free text containing a line 'Score: N'."
        )
    }

    /// Grades `actual_output` against `description`/`expected_output`.
    pub async fn evaluate(
        &self,
        description: &str,
        expected_output: &str,
        actual_output: &str,
    ) -> Result<TaskEvaluation> {
        let prompt = self.prompt(description, expected_output, actual_output);
        let messages = vec![
            Message::system("You are a meticulous, impartial evaluator of task outputs.")
                .expect("static system prompt is non-empty"),
            Message::user(prompt).expect("constructed prompt is non-empty"),
        ];

        let mut options = CallOptions::new().with_temperature(0.0);
        options.timeout = Some(std::time::Duration::from_secs(self.config.timeout_secs));

        let response = self.llm.call(messages, &options).await?;
        if self.config.verbose {
            tracing::info!(response = %response.content, "evaluator response");
        }
        parse_evaluation(&response.content)
    }

    pub fn passing_score(&self) -> f64 {
        self.config.passing_score
    }
}

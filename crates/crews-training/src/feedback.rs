//! `FeedbackProvider`: the hook the training loop calls once per iteration
//! to collect a `Feedback` record. The loop is agnostic to where the
//! judgment comes from -- a human reviewing the output, a secondary LLM
//! grading it, or a fixed script in a test -- since the command-line
//! entry point that would prompt a human interactively is out of scope
//! (spec §1).

use async_trait::async_trait;
use crews_engine::CrewOutput;

use crate::record::Feedback;

#[async_trait]
pub trait FeedbackProvider: Send + Sync {
    async fn collect(&self, iteration: usize, output: &CrewOutput) -> Feedback;
}

/// Returns a fixed, cyclic sequence of feedback records -- the common case
/// for tests and for scripted/automated training runs that already know
/// their scores ahead of time.
pub struct StaticFeedbackProvider {
    sequence: Vec<Feedback>,
}

impl StaticFeedbackProvider {
    pub fn new(sequence: Vec<Feedback>) -> Self {
        assert!(
            !sequence.is_empty(),
            "StaticFeedbackProvider needs at least one feedback record to cycle through"
        );
        StaticFeedbackProvider { sequence }
    }
}

#[async_trait]
impl FeedbackProvider for StaticFeedbackProvider {
    async fn collect(&self, iteration: usize, _output: &CrewOutput) -> Feedback {
        self.sequence[iteration % self.sequence.len()].clone()
    }
}

/// Adapts a plain closure (sync or computed from the output) into a
/// `FeedbackProvider`, for callers who want to wire in their own evaluator
/// or a human-review channel without implementing the trait by hand.
pub struct ClosureFeedbackProvider<F>
where
    F: Fn(usize, &CrewOutput) -> Feedback + Send + Sync,
{
    f: F,
}

impl<F> ClosureFeedbackProvider<F>
where
    F: Fn(usize, &CrewOutput) -> Feedback + Send + Sync,
{
    pub fn new(f: F) -> Self {
        ClosureFeedbackProvider { f }
    }
}

#[async_trait]
impl<F> FeedbackProvider for ClosureFeedbackProvider<F>
where
    F: Fn(usize, &CrewOutput) -> Feedback + Send + Sync,
{
    async fn collect(&self, iteration: usize, output: &CrewOutput) -> Feedback {
        (self.f)(iteration, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample_output() -> CrewOutput {
        CrewOutput {
            raw: "done".to_string(),
            json: None,
            usage: Default::default(),
            task_outputs: vec![],
            success: true,
            metadata: Value::Null,
        }
    }

    #[tokio::test]
    async fn static_provider_cycles_through_sequence() {
        let provider = StaticFeedbackProvider::new(vec![
            Feedback::new(5.0, 5.0, 5.0),
            Feedback::new(9.0, 9.0, 9.0),
        ]);
        let output = sample_output();
        assert_eq!(provider.collect(0, &output).await.quality_score, 5.0);
        assert_eq!(provider.collect(1, &output).await.quality_score, 9.0);
        assert_eq!(provider.collect(2, &output).await.quality_score, 5.0);
    }

    #[tokio::test]
    async fn closure_provider_derives_feedback_from_output() {
        let provider = ClosureFeedbackProvider::new(|_iteration, output: &CrewOutput| {
            let score = if output.success { 8.0 } else { 2.0 };
            Feedback::new(score, score, score)
        });
        let output = sample_output();
        assert_eq!(provider.collect(0, &output).await.quality_score, 8.0);
    }
}

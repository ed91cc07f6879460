//! Unary and streaming response shapes (spec §3).

use serde::{Deserialize, Serialize};

use crate::tool::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

/// Token accounting plus derived cost. `prompt_tokens + completion_tokens ==
/// total_tokens` is a data-model invariant (spec §3, §8); providers that
/// round may drift by at most one token, which callers should tolerate but
/// this type does not itself enforce (the invariant is checked in tests
/// against recorded responses, not at construction, since the raw wire
/// values come from the provider verbatim).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    /// Derived cost in USD, computed from a provider-specific per-model
    /// table (see `crews_llm::cost`). `None` until a cost table has been
    /// applied.
    pub cost_usd: Option<f64>,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cost_usd: None,
        }
    }

    pub fn checked_total(&self) -> bool {
        self.prompt_tokens + self.completion_tokens == self.total_tokens
    }
}

impl std::ops::Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
            cost_usd: match (self.cost_usd, rhs.cost_usd) {
                (Some(a), Some(b)) => Some(a + b),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub content: String,
    pub usage: Usage,
    pub model: String,
    pub finish_reason: FinishReason,
    pub tool_calls: Vec<ToolCall>,
    pub metadata: serde_json::Value,
}

/// One chunk of a streamed completion. `usage`/`finish_reason` are only
/// populated on the terminal chunk, when the provider sends them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamResponse {
    pub delta: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<FinishReason>,
    pub tool_calls: Vec<ToolCall>,
    pub error: Option<String>,
}

impl StreamResponse {
    pub fn delta(text: impl Into<String>) -> Self {
        StreamResponse {
            delta: text.into(),
            usage: None,
            finish_reason: None,
            tool_calls: Vec::new(),
            error: None,
        }
    }

    pub fn terminal(usage: Option<Usage>, finish_reason: FinishReason) -> Self {
        StreamResponse {
            delta: String::new(),
            usage,
            finish_reason: Some(finish_reason),
            tool_calls: Vec::new(),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamResponse {
            delta: String::new(),
            usage: None,
            finish_reason: None,
            tool_calls: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.finish_reason.is_some() || self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_total_matches_sum() {
        let u = Usage::new(10, 5);
        assert_eq!(u.total_tokens, 15);
        assert!(u.checked_total());
    }

    #[test]
    fn usage_add_sums_cost() {
        let mut a = Usage::new(10, 5);
        a.cost_usd = Some(0.01);
        let mut b = Usage::new(3, 2);
        b.cost_usd = Some(0.02);
        let sum = a + b;
        assert_eq!(sum.prompt_tokens, 13);
        assert_eq!(sum.total_tokens, 20);
        assert!((sum.cost_usd.unwrap() - 0.03).abs() < 1e-9);
    }
}

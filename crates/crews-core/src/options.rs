//! `CallOptions` and its validation rules (spec §3, §4.2).
//!
//! Validation happens at construction / `validate()` time, before any
//! network I/O -- mirrors the LLM transport's stated state machine
//! (`Idle -> Validating -> Transmitting -> ...`): `Validating` is this
//! module's `validate()` call, invoked by the transport before it ever
//! touches the wire.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::tool::{Tool, ToolChoice};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormat {
    pub kind: ResponseFormatKind,
    /// JSON schema, required when `kind == JsonSchema`.
    pub schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormatKind {
    Text,
    JsonObject,
    JsonSchema,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub max_completion_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub stop_sequences: Vec<String>,
    pub stream: bool,
    pub tools: Vec<Tool>,
    pub tool_choice: Option<ToolChoice>,
    pub n: Option<u32>,
    pub seed: Option<i64>,
    pub response_format: Option<ResponseFormat>,
    pub logit_bias: HashMap<String, f32>,
    pub user_id: Option<String>,
    #[serde(skip, default)]
    pub timeout: Option<Duration>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enforces every numeric bound named in spec §3/§4.2. Called by the
    /// transport before constructing the wire request.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(CoreError::validation(format!(
                    "temperature must be in [0, 2], got {t}"
                )));
            }
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(CoreError::validation(format!(
                    "top_p must be in [0, 1], got {p}"
                )));
            }
        }
        if let Some(mt) = self.max_tokens {
            if mt < 1 {
                return Err(CoreError::validation("max_tokens must be >= 1"));
            }
        }
        if let Some(mct) = self.max_completion_tokens {
            if mct < 1 {
                return Err(CoreError::validation("max_completion_tokens must be >= 1"));
            }
        }
        if let Some(n) = self.n {
            if n < 1 {
                return Err(CoreError::validation("n must be >= 1"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_boundary_accepted_at_2_0() {
        let opts = CallOptions::new().with_temperature(2.0);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn temperature_boundary_rejected_above_2_0() {
        let opts = CallOptions::new().with_temperature(2.0 + f32::EPSILON * 4.0);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn max_tokens_zero_rejected() {
        let opts = CallOptions::new().with_max_tokens(0);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn top_p_out_of_range_rejected() {
        let mut opts = CallOptions::new();
        opts.top_p = Some(1.5);
        assert!(opts.validate().is_err());
    }
}

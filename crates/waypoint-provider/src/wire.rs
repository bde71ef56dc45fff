// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Uniform provider wire format.
//!
//! Every backend is reached through the same JSON contract; vendor-specific
//! translation happens in front of the endpoint, not here.

use serde::{Deserialize, Serialize};
use waypoint_core::TokenUsage;

/// Request body sent to a provider endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest<'a> {
    pub prompt: &'a str,
    pub max_tokens: u32,
    pub model: &'a str,
}

/// Successful response body.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
    /// Cost charged for this call, when the provider reports one.
    #[serde(default)]
    pub cost: Option<f64>,
}

/// Error body some providers return alongside a non-2xx status.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_snake_case() {
        let req = GenerateRequest {
            prompt: "hi",
            max_tokens: 500,
            model: "sonar",
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["prompt"], "hi");
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["model"], "sonar");
    }

    #[test]
    fn response_usage_and_cost_are_optional() {
        let resp: GenerateResponse = serde_json::from_str(r#"{"text":"ok"}"#).unwrap();
        assert_eq!(resp.text, "ok");
        assert!(resp.usage.is_none());
        assert!(resp.cost.is_none());

        let resp: GenerateResponse = serde_json::from_str(
            r#"{"text":"ok","usage":{"input_tokens":3,"output_tokens":7},"cost":0.002}"#,
        )
        .unwrap();
        assert_eq!(resp.usage.map(|u| u.output_tokens), Some(7));
        assert_eq!(resp.cost, Some(0.002));
    }

    #[test]
    fn error_body_parses() {
        let err: ErrorResponse =
            serde_json::from_str(r#"{"error":{"type":"overloaded","message":"busy"}}"#).unwrap();
        assert_eq!(err.error.message, "busy");
        assert_eq!(err.error.type_.as_deref(), Some("overloaded"));
    }
}

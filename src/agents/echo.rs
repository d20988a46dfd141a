//! Diagnostic echo agent.
//!
//! Renders its parameters back as a formatted report without touching any
//! external provider. Useful for exercising the job lifecycle end to end.

use async_trait::async_trait;
use std::time::Duration;

use crate::agents::{Agent, AgentDeps, Capability};
use crate::error::AgentError;

pub struct EchoAgent;

fn topics_of(params: &serde_json::Value) -> Result<Option<Vec<String>>, AgentError> {
    let Some(topics) = params.get("topics") else {
        return Ok(None);
    };
    let list = topics
        .as_array()
        .ok_or_else(|| AgentError::InvalidParameters {
            reason: "'topics' must be an array of strings".to_string(),
        })?;
    let topics: Vec<String> = list
        .iter()
        .map(|t| {
            t.as_str()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AgentError::InvalidParameters {
                    reason: "'topics' entries must be non-empty strings".to_string(),
                })
        })
        .collect::<Result<_, _>>()?;
    if topics.is_empty() || topics.len() > 10 {
        return Err(AgentError::InvalidParameters {
            reason: "'topics' must contain between 1 and 10 entries".to_string(),
        });
    }
    Ok(Some(topics))
}

#[async_trait]
impl Agent for EchoAgent {
    fn id(&self) -> &str {
        "echo"
    }

    fn name(&self) -> &str {
        "Echo Agent"
    }

    fn description(&self) -> &str {
        "Echoes its input parameters back as a report; no external calls"
    }

    fn category(&self) -> &str {
        "diagnostics"
    }

    fn timeout(&self) -> Option<Duration> {
        Some(Duration::from_secs(30))
    }

    fn required_capabilities(&self) -> &[Capability] {
        &[]
    }

    fn default_parameters(&self) -> serde_json::Value {
        serde_json::json!({ "topics": ["ping"] })
    }

    fn validate_parameters(&self, params: &serde_json::Value) -> Result<(), AgentError> {
        topics_of(params).map(|_| ())
    }

    async fn run(
        &self,
        params: serde_json::Value,
        _deps: &AgentDeps,
    ) -> Result<String, AgentError> {
        let mut out = String::from("*Echo Agent*\n");

        if let Some(topics) = topics_of(&params)? {
            for topic in topics {
                out.push_str(&format!("\n*{topic}*\n• echoed section for {topic}\n"));
            }
        }

        out.push_str(&format!(
            "\nParameters: {}",
            serde_json::to_string(&params).unwrap_or_else(|_| "{}".to_string())
        ));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn echoes_a_section_per_topic() {
        let result = EchoAgent
            .run(json!({"topics": ["Bitcoin"]}), &AgentDeps::none())
            .await
            .unwrap();
        assert!(result.contains("*Bitcoin*"));
        assert!(result.contains("echoed section for Bitcoin"));
    }

    #[tokio::test]
    async fn works_without_topics() {
        let result = EchoAgent
            .run(json!({"anything": 1}), &AgentDeps::none())
            .await
            .unwrap();
        assert!(result.contains("\"anything\":1"));
    }

    #[test]
    fn rejects_malformed_topics() {
        assert!(EchoAgent.validate_parameters(&json!({"topics": "Bitcoin"})).is_err());
        assert!(EchoAgent.validate_parameters(&json!({"topics": []})).is_err());
        assert!(EchoAgent.validate_parameters(&json!({"topics": [""]})).is_err());
        assert!(EchoAgent.validate_parameters(&json!({"topics": [1, 2]})).is_err());
        assert!(EchoAgent.validate_parameters(&json!({"topics": ["ok"]})).is_ok());
        assert!(EchoAgent.validate_parameters(&json!({})).is_ok());
    }
}

//! Current date tool.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use super::{Tool, ToolContext};

/// Return the current UTC time as an ISO-8601 timestamp.
pub struct CurrentDate;

#[async_trait]
impl Tool for CurrentDate {
    fn name(&self) -> &str {
        "current_date"
    }

    fn description(&self) -> &str {
        "Tool for retrieving the current date"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value, _context: ToolContext<'_>) -> anyhow::Result<String> {
        Ok(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;

    #[tokio::test]
    async fn test_current_date_is_iso_8601() {
        let provider = ScriptedProvider::new(vec![]);
        let context = ToolContext {
            provider: &provider,
            messages: &[],
        };
        let now = CurrentDate.execute(json!({}), context).await.unwrap();

        assert!(now.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&now).is_ok());
    }
}

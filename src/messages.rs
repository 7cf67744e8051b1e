//! Conversation helpers shared by the built-in agents.

use crate::llm::{ChatMessage, Role};

/// Compact a list of `(task, result)` message pairs into one user message per
/// step.
///
/// A trailing task without a result yields a step with an empty result.
pub fn steps(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    messages
        .chunks(2)
        .map(|pair| {
            let name = pair[0].content.as_str();
            let result = pair.get(1).map(|m| m.content.as_str()).unwrap_or_default();
            ChatMessage::user(format!(
                "<step>\n  <name>{}</name>\n  <result>{}</result>\n</step>",
                name, result
            ))
        })
        .collect()
}

/// Render messages as plain text, one block per message.
///
/// Tool-call requests and tool results are rendered inline, so the output can
/// be sent to a model that is offered no tools.
pub fn transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|message| {
            if message.is_tool_call_request() {
                let calls = message
                    .requested_calls()
                    .iter()
                    .map(|call| format!("{}({})", call.name, call.arguments))
                    .collect::<Vec<_>>()
                    .join(", ");
                return format!("assistant called tools: {}", calls);
            }
            let label = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool result",
            };
            format!("{}: {}", label, message.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;
    use serde_json::json;

    #[test]
    fn test_steps_pairs_task_and_result() {
        let digest = steps(&[
            ChatMessage::user("find flights"),
            ChatMessage::assistant("3 flights found"),
            ChatMessage::user("book hotel"),
            ChatMessage::assistant("booked"),
        ]);

        assert_eq!(digest.len(), 2);
        assert_eq!(digest[0].role, Role::User);
        assert!(digest[0].content.contains("<name>find flights</name>"));
        assert!(digest[0].content.contains("<result>3 flights found</result>"));
        assert!(digest[1].content.contains("<name>book hotel</name>"));
    }

    #[test]
    fn test_steps_handles_trailing_task() {
        let digest = steps(&[ChatMessage::user("pending")]);
        assert_eq!(digest.len(), 1);
        assert!(digest[0].content.contains("<result></result>"));
        assert!(steps(&[]).is_empty());
    }

    #[test]
    fn test_transcript_renders_tool_calls_inline() {
        let text = transcript(&[
            ChatMessage::user("weather?"),
            ChatMessage::tool_calls(vec![ToolCall::new("c1", "forecast", json!({"city": "Oslo"}))]),
            ChatMessage::tool_result("c1", "rain"),
        ]);

        assert!(text.starts_with("user: weather?"));
        assert!(text.contains("assistant called tools: forecast({\"city\":\"Oslo\"})"));
        assert!(text.ends_with("tool result: rain"));
    }
}

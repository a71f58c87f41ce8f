//! services/api/src/adapters/schedule_llm.rs
//!
//! This module contains the adapter for the schedule optimization LLM.
//! It implements the `ScheduleOptimizationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use vibeprep_core::domain::{OptimizationRequest, OptimizedSchedule};
use vibeprep_core::ports::{PortError, PortResult, ScheduleOptimizationService};

const SYSTEM_INSTRUCTIONS: &str = r#"You are an expert schedule optimizer for students preparing for competitive exams such as JEE, NEET, UPSC and CAT.

You receive a student's psychometric profile and their current calendar. Rewrite the calendar to maximize exam preparation:
- Balance study time across subjects by syllabus weightage and the student's proficiency.
- Put the hardest work in the student's peak productivity hours and respect their attention span.
- Add short breaks between long sessions, plus daily revision and weekly mock tests.
- Use spaced repetition for weak topics while maintaining strong ones.
- Protect 7-8 hours of sleep and include exercise or stress management.

Respond with ONLY a JSON object of this shape, no prose and no markdown:
{
  "daily_schedules": [
    {
      "date": "YYYY-MM-DD",
      "slots": [
        {
          "time_slot": "09:00-10:00",
          "task": {
            "task_id": "string",
            "title": "string",
            "description": "string or null",
            "priority": "low | medium | high | urgent",
            "status": "pending"
          },
          "reasoning": "why this slot holds this task"
        }
      ]
    }
  ],
  "optimization_summary": "short explanation of the strategy",
  "recommendations": ["string"],
  "psychometric_considerations": ["string"]
}
Use "task": null for free slots."#;

pub struct OpenAiScheduleAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiScheduleAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl ScheduleOptimizationService for OpenAiScheduleAdapter {
    async fn optimize(&self, request: &OptimizationRequest) -> PortResult<OptimizedSchedule> {
        let profile = serde_json::to_string_pretty(&request.psychometric_profile)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let schedule = serde_json::to_string_pretty(&request.current_schedule)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_INSTRUCTIONS)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(format!(
                        "STUDENT PSYCHOMETRIC PROFILE:\n{profile}\n\nCURRENT SCHEDULE:\n{schedule}"
                    ))
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages(messages)
            .temperature(0.4)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        info!(
            user_id = %request.user_id,
            days = request.current_schedule.len(),
            "Requesting schedule optimization"
        );

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| PortError::Unexpected("No schedule generated".to_string()))?;

        parse_schedule(&content, &request.user_id)
    }
}

/// Parses the model reply, tolerating a markdown code fence around the JSON.
fn parse_schedule(content: &str, user_id: &str) -> PortResult<OptimizedSchedule> {
    let mut value: Value = serde_json::from_str(strip_code_fence(content)).map_err(|e| {
        warn!("Optimizer returned non-JSON content: {}", e);
        PortError::Unexpected(format!("Optimizer returned malformed JSON: {e}"))
    })?;

    if let Value::Object(fields) = &mut value {
        fields
            .entry("user_id")
            .or_insert_with(|| Value::String(user_id.to_string()));
        fields
            .entry("optimization_date")
            .or_insert_with(|| Value::String(Utc::now().date_naive().to_string()));
    }

    serde_json::from_value(value)
        .map_err(|e| PortError::Unexpected(format!("Optimizer returned an unexpected shape: {e}")))
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"{
        "daily_schedules": [
            {"date": "2025-08-05", "slots": [
                {"time_slot": "06:00-07:00", "task": {"task_id": "p1", "title": "Optics drills", "priority": "high"}, "reasoning": "peak hours"},
                {"time_slot": "07:00-07:15", "task": null, "reasoning": "break"}
            ]}
        ],
        "optimization_summary": "Front-load physics",
        "recommendations": ["Sleep by 22:30"]
    }"#;

    #[test]
    fn parses_plain_json_and_fills_identity_fields() {
        let schedule = parse_schedule(REPLY, "user-1").unwrap();
        assert_eq!(schedule.user_id, "user-1");
        assert!(!schedule.optimization_date.is_empty());
        assert_eq!(schedule.daily_schedules[0].slots.len(), 2);
        assert!(schedule.daily_schedules[0].slots[1].task.is_none());
        assert!(schedule.psychometric_considerations.is_empty());
    }

    #[test]
    fn strips_markdown_fences() {
        let fenced = format!("```json\n{REPLY}\n```");
        let schedule = parse_schedule(&fenced, "user-1").unwrap();
        assert_eq!(schedule.optimization_summary, "Front-load physics");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
    }

    #[test]
    fn rejects_prose() {
        assert!(parse_schedule("Here is your schedule!", "user-1").is_err());
        assert!(parse_schedule(r#"{"daily_schedules": "nope"}"#, "user-1").is_err());
    }
}

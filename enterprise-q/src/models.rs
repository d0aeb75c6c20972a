//! Request and response payloads for the Enterprise Q operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{EnterpriseQConfig, Error};

/// File attached to a question as extra context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContextFile {
    /// File name as shown in Slack
    pub name: String,
    /// Base64-encoded file content
    pub data: String,
}

/// Continuation fields that place a question inside an existing conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub conversation_id: String,
    pub parent_message_id: String,
}

/// Identifies a single answer, e.g. the one being rated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContext {
    pub conversation_id: String,
    pub message_id: String,
}

/// Input of the `ChatSync` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub application_id: String,
    pub user_id: String,
    /// Idempotency token, fresh for every request
    pub client_token: String,
    pub user_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_context_files: Option<Vec<ChatContextFile>>,
    #[serde(flatten)]
    pub continuation: Option<ConversationContext>,
}

impl AskRequest {
    /// Build a request that starts a new conversation.
    ///
    /// An empty file list is left out of the request entirely.
    pub fn new(
        config: &EnterpriseQConfig,
        message: impl Into<String>,
        chat_context_files: Vec<ChatContextFile>,
    ) -> Self {
        Self {
            application_id: config.application_id.clone(),
            user_id: config.user_id.clone(),
            client_token: Uuid::new_v4().to_string(),
            user_message: message.into(),
            chat_context_files: (!chat_context_files.is_empty()).then_some(chat_context_files),
            continuation: None,
        }
    }

    /// Continue an existing conversation.
    pub fn with_continuation(mut self, continuation: ConversationContext) -> Self {
        self.continuation = Some(continuation);
        self
    }
}

/// Output of the `ChatSync` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub conversation_id: String,
    pub system_message_id: String,
    pub user_message_id: String,
    /// The answer text
    #[serde(default)]
    pub system_message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_attributions: Vec<SourceAttribution>,
}

impl AskResponse {
    /// Continuation for a follow-up question in the same conversation.
    pub fn continuation(&self) -> ConversationContext {
        ConversationContext {
            conversation_id: self.conversation_id.clone(),
            parent_message_id: self.system_message_id.clone(),
        }
    }

    /// Context identifying this answer when submitting feedback on it.
    pub fn feedback_context(&self) -> MessageContext {
        MessageContext {
            conversation_id: self.conversation_id.clone(),
            message_id: self.system_message_id.clone(),
        }
    }
}

/// Citation linking part of an answer to a source document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAttribution {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 1-based citation number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_number: Option<u32>,
    /// Epoch seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_message_segments: Vec<TextSegment>,
}

impl SourceAttribution {
    /// Last update of the source document.
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        let seconds = self.updated_at?;
        if !seconds.is_finite() {
            return None;
        }
        DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
    }
}

/// Character range of the answer covered by a citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin_offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_offset: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Usefulness {
    Useful,
    NotUseful,
}

impl Usefulness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Usefulness::Useful => "USEFUL",
            Usefulness::NotUseful => "NOT_USEFUL",
        }
    }
}

impl FromStr for Usefulness {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USEFUL" => Ok(Usefulness::Useful),
            "NOT_USEFUL" => Ok(Usefulness::NotUseful),
            other => Err(Error::Validation(format!("Unknown usefulness: {}", other))),
        }
    }
}

impl fmt::Display for Usefulness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    Helpful,
    NotHelpful,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Helpful => "HELPFUL",
            Reason::NotHelpful => "NOT_HELPFUL",
        }
    }
}

impl FromStr for Reason {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HELPFUL" => Ok(Reason::Helpful),
            "NOT_HELPFUL" => Ok(Reason::NotHelpful),
            other => Err(Error::Validation(format!("Unknown reason: {}", other))),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feedback timestamp in epoch units, as converted from the caller's string.
///
/// Conversion never fails: anything that is not a number becomes NaN and is
/// left for the service to reject. Non-finite values go out as JSON `null`,
/// integral values as JSON integers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubmittedAt(f64);

impl SubmittedAt {
    /// Convert with the same rules as JavaScript's `Number(string)`.
    pub fn parse(input: &str) -> Self {
        Self(parse_number(input))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_nan(&self) -> bool {
        self.0.is_nan()
    }
}

impl From<f64> for SubmittedAt {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl Serialize for SubmittedAt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // 2^53: past this f64 can no longer hold every integer
        const MAX_SAFE: f64 = 9_007_199_254_740_992.0;

        let value = self.0;
        if !value.is_finite() {
            serializer.serialize_none()
        } else if value.fract() == 0.0 && value.abs() <= MAX_SAFE {
            serializer.serialize_i64(value as i64)
        } else {
            serializer.serialize_f64(value)
        }
    }
}

fn parse_number(input: &str) -> f64 {
    let s = input.trim();
    if s.is_empty() {
        return 0.0;
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = s.strip_prefix(prefix) {
            if digits.is_empty() {
                return f64::NAN;
            }
            return digits
                .chars()
                .try_fold(0.0_f64, |acc, c| {
                    c.to_digit(radix)
                        .map(|d| acc * f64::from(radix) + f64::from(d))
                })
                .unwrap_or(f64::NAN);
        }
    }

    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    if unsigned == "Infinity" {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    // f64::from_str also takes "inf" and "NaN", which are not numeric literals
    let literal = unsigned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !literal {
        return f64::NAN;
    }

    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// `usefulness` / `reason` pair of a feedback submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageUsefulnessFeedback {
    pub usefulness: Usefulness,
    pub reason: Reason,
    pub submitted_at: SubmittedAt,
}

/// Input of the `PutFeedback` operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub application_id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub context: MessageContext,
    pub message_usefulness: MessageUsefulnessFeedback,
}

impl FeedbackRequest {
    pub fn new(
        config: &EnterpriseQConfig,
        context: MessageContext,
        usefulness: Usefulness,
        reason: Reason,
        submitted_at: &str,
    ) -> Self {
        Self {
            application_id: config.application_id.clone(),
            user_id: config.user_id.clone(),
            context,
            message_usefulness: MessageUsefulnessFeedback {
                usefulness,
                reason,
                submitted_at: SubmittedAt::parse(submitted_at),
            },
        }
    }
}

/// Raw acknowledgement of `PutFeedback`, passed through as returned.
pub type FeedbackAck = serde_json::Value;

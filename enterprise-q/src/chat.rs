//! Ask and feedback operations used by the Slack handlers.

use crate::client::{get_client, EnterpriseQClient};
use crate::models::{
    AskRequest, AskResponse, ChatContextFile, ConversationContext, FeedbackAck, FeedbackRequest,
    MessageContext, Reason, Usefulness,
};
use crate::{EnterpriseQConfig, Result};

/// Build the `ChatSync` request for a user message.
///
/// `continuation` is `None` on the first turn of a conversation.
pub fn ask_request(
    message: &str,
    chat_context_files: Vec<ChatContextFile>,
    config: &EnterpriseQConfig,
    continuation: Option<ConversationContext>,
) -> AskRequest {
    let request = AskRequest::new(config, message, chat_context_files);
    match continuation {
        Some(continuation) => request.with_continuation(continuation),
        None => request,
    }
}

/// Ask Enterprise Q a question through the shared client.
pub async fn ask(
    message: &str,
    chat_context_files: Vec<ChatContextFile>,
    config: &EnterpriseQConfig,
    continuation: Option<ConversationContext>,
) -> Result<AskResponse> {
    let request = ask_request(message, chat_context_files, config, continuation);
    let client = get_client(config).await?;
    client.chat_sync(&request).await
}

/// Ask through a specific client instead of the shared one.
pub async fn ask_with(
    client: &EnterpriseQClient,
    message: &str,
    chat_context_files: Vec<ChatContextFile>,
    config: &EnterpriseQConfig,
    continuation: Option<ConversationContext>,
) -> Result<AskResponse> {
    let request = ask_request(message, chat_context_files, config, continuation);
    client.chat_sync(&request).await
}

/// Submit a rating for a previous answer through the shared client.
///
/// `submitted_at` is sent as a number; it is not validated here.
pub async fn submit_feedback(
    config: &EnterpriseQConfig,
    context: MessageContext,
    usefulness: Usefulness,
    reason: Reason,
    submitted_at: &str,
) -> Result<FeedbackAck> {
    let request = FeedbackRequest::new(config, context, usefulness, reason, submitted_at);
    let client = get_client(config).await?;
    client.put_feedback(&request).await
}

/// Submit feedback through a specific client instead of the shared one.
pub async fn submit_feedback_with(
    client: &EnterpriseQClient,
    config: &EnterpriseQConfig,
    context: MessageContext,
    usefulness: Usefulness,
    reason: Reason,
    submitted_at: &str,
) -> Result<FeedbackAck> {
    let request = FeedbackRequest::new(config, context, usefulness, reason, submitted_at);
    client.put_feedback(&request).await
}

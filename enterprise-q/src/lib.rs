//! Enterprise Q client for the Slack bot.
//!
//! Enterprise Q is not part of the AWS SDK yet. This crate ships its service
//! model, registers it on first use, and exposes one shared client with typed
//! wrappers for asking questions and rating answers.

pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod registry;
pub mod transport;

pub use chat::{ask, ask_request, ask_with, submit_feedback, submit_feedback_with};
pub use client::{get_client, ClientSlot, EnterpriseQClient};
pub use config::EnterpriseQConfig;
pub use error::{Error, Result};
pub use models::{
    AskRequest, AskResponse, ChatContextFile, ConversationContext, FeedbackAck, FeedbackRequest,
    MessageContext, Reason, SourceAttribution, SubmittedAt, TextSegment, Usefulness,
};
pub use registry::{ensure_service_registered, ServiceDescriptor, ServiceRegistry};
pub use transport::{HttpRequest, SigV4Transport, Transport};

//! Configuration management for the Enterprise Q client.

use std::env;

use crate::{Error, Result};

pub const REGION_VAR: &str = "ENTERPRISE_Q_REGION";
pub const ENDPOINT_VAR: &str = "ENTERPRISE_Q_ENDPOINT";
pub const APP_ID_VAR: &str = "ENTERPRISE_Q_APP_ID";
pub const USER_ID_VAR: &str = "ENTERPRISE_Q_USER_ID";

/// Enterprise Q settings shared by the Slack events and interactions handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnterpriseQConfig {
    /// AWS region the service is deployed in
    pub region: String,
    /// Service endpoint URL
    pub endpoint: String,
    /// Enterprise Q application ID
    pub application_id: String,
    /// User ID the bot acts as
    pub user_id: String,
}

impl EnterpriseQConfig {
    pub fn new(
        region: impl Into<String>,
        endpoint: impl Into<String>,
        application_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            endpoint: endpoint.into(),
            application_id: application_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            region: required(REGION_VAR)?,
            endpoint: required(ENDPOINT_VAR)?,
            application_id: required(APP_ID_VAR)?,
            user_id: required(USER_ID_VAR)?,
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("{} not set", name)))
}

//! Enterprise Q client and its process-wide singleton.
//!
//! The client is driven by the registered service model: each operation's
//! input is bound to an HTTP request according to the model's member
//! locations, then handed to a [`Transport`].

use reqwest::Url;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::{AskRequest, AskResponse, FeedbackAck, FeedbackRequest};
use crate::registry::{
    ensure_service_registered, MemberLocation, OperationDescriptor, ServiceDescriptor,
};
use crate::transport::{HttpRequest, SigV4Transport, Transport};
use crate::{EnterpriseQConfig, Error, Result};

/// Remote operation behind "ask".
pub const ASK_OPERATION: &str = "ChatSync";

/// Remote operation behind "give feedback".
pub const FEEDBACK_OPERATION: &str = "PutFeedback";

/// The process-wide client, built on first use.
static CLIENT: ClientSlot = ClientSlot::new();

/// Client for the Enterprise Q service.
pub struct EnterpriseQClient {
    descriptor: Arc<ServiceDescriptor>,
    region: String,
    endpoint: Url,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for EnterpriseQClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnterpriseQClient")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl EnterpriseQClient {
    /// Build a client signing its requests with the default AWS credentials.
    ///
    /// Registers the bundled service model if that has not happened yet.
    pub async fn from_config(config: &EnterpriseQConfig) -> Result<Self> {
        let descriptor = ensure_service_registered()?;
        let (region, endpoint) = validate(&config.region, &config.endpoint)?;

        let transport =
            SigV4Transport::from_env(&region, &descriptor.metadata.signing_name).await?;

        Ok(Self {
            descriptor,
            region,
            endpoint,
            transport: Arc::new(transport),
        })
    }

    /// Build a client on top of an existing transport.
    pub fn with_transport(
        descriptor: Arc<ServiceDescriptor>,
        region: &str,
        endpoint: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let (region, endpoint) = validate(region, endpoint)?;
        Ok(Self {
            descriptor,
            region,
            endpoint,
            transport,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Invoke an operation of the service model with a JSON input.
    pub async fn invoke(&self, operation: &str, input: Value) -> Result<Value> {
        let operation = self.descriptor.operation(operation)?;
        let request = self.bind(operation, input)?;
        self.transport.send(request).await
    }

    /// Ask a question and wait for the answer.
    pub async fn chat_sync(&self, request: &AskRequest) -> Result<AskResponse> {
        let input = serde_json::to_value(request)?;
        debug!("chat_sync input {}", input);

        let output = self.invoke(ASK_OPERATION, input).await?;
        Ok(serde_json::from_value(output)?)
    }

    /// Rate a previous answer.
    pub async fn put_feedback(&self, request: &FeedbackRequest) -> Result<FeedbackAck> {
        let input = serde_json::to_value(request)?;
        debug!("put_feedback input {}", input);

        let output = self.invoke(FEEDBACK_OPERATION, input).await?;
        debug!("put_feedback output {}", output);

        Ok(output)
    }

    /// Bind an operation input to an HTTP request (rest-json protocol).
    fn bind(&self, operation: &OperationDescriptor, input: Value) -> Result<HttpRequest> {
        let Value::Object(mut body) = input else {
            return Err(Error::Validation(format!(
                "{} input must be a JSON object",
                operation.name
            )));
        };

        let mut labels = HashMap::new();
        let mut query = Vec::new();
        let mut headers = Vec::new();

        // Sorted so the query string is stable
        let members: BTreeMap<_, _> = self
            .descriptor
            .input_members(operation)
            .into_iter()
            .flatten()
            .collect();

        for (name, member) in members {
            let Some(location) = member.location else {
                continue;
            };
            let Some(value) = body.remove(name.as_str()) else {
                continue;
            };
            let location_name = member.location_name.as_deref().unwrap_or(name);

            match location {
                MemberLocation::Uri => {
                    labels.insert(location_name.to_string(), scalar(name, &value)?);
                }
                MemberLocation::Querystring => match value {
                    Value::Array(items) => {
                        for item in &items {
                            query.push((location_name.to_string(), scalar(name, item)?));
                        }
                    }
                    other => query.push((location_name.to_string(), scalar(name, &other)?)),
                },
                MemberLocation::Header => {
                    headers.push((location_name.to_string(), scalar(name, &value)?));
                }
                MemberLocation::Headers | MemberLocation::StatusCode => {}
            }
        }

        let url = self.resolve_url(&operation.http.request_uri, &labels, &query)?;

        Ok(HttpRequest {
            method: operation.http.method.clone(),
            url,
            headers,
            body: Value::Object(body),
        })
    }

    fn resolve_url(
        &self,
        request_uri: &str,
        labels: &HashMap<String, String>,
        query: &[(String, String)],
    ) -> Result<Url> {
        let (path, fixed_query) = request_uri.split_once('?').unwrap_or((request_uri, ""));
        let mut url = self.endpoint.clone();

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("Invalid endpoint: {}", self.endpoint)))?;
            segments.pop_if_empty();

            for segment in path.split('/').filter(|s| !s.is_empty()) {
                match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Some(label) => {
                        let value = labels.get(label).ok_or_else(|| {
                            Error::Validation(format!("Missing path parameter {}", label))
                        })?;
                        segments.push(value);
                    }
                    None => {
                        segments.push(segment);
                    }
                }
            }
        }

        if !fixed_query.is_empty() || !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for part in fixed_query.split('&').filter(|p| !p.is_empty()) {
                match part.split_once('=') {
                    Some((key, value)) => pairs.append_pair(key, value),
                    None => pairs.append_key_only(part),
                };
            }
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

fn validate(region: &str, endpoint: &str) -> Result<(String, Url)> {
    let region = region.trim();
    if region.is_empty() {
        return Err(Error::Config("Region must not be empty".to_string()));
    }

    let url = Url::parse(endpoint)
        .map_err(|e| Error::Config(format!("Invalid endpoint {}: {}", endpoint, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::Config(format!(
            "Endpoint must be an http(s) URL: {}",
            endpoint
        )));
    }

    Ok((region.to_string(), url))
}

fn scalar(member: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(Error::Validation(format!(
            "{} cannot be bound to the request URL",
            member
        ))),
    }
}

/// Holds at most one client; first successful initialization wins.
///
/// Initialization runs under the lock, so racing callers build one client.
/// A failed initialization leaves the slot empty for the next caller.
pub struct ClientSlot {
    client: Mutex<Option<Arc<EnterpriseQClient>>>,
}

impl ClientSlot {
    pub const fn new() -> Self {
        Self {
            client: Mutex::const_new(None),
        }
    }

    pub async fn get_or_try_init<F, Fut>(&self, init: F) -> Result<Arc<EnterpriseQClient>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<EnterpriseQClient>>,
    {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        let client = Arc::new(init().await?);
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Get the client, building it from `config` on first use.
    ///
    /// Later calls return the same client whatever config they pass.
    pub async fn get_or_build(
        &self,
        config: &EnterpriseQConfig,
    ) -> Result<Arc<EnterpriseQClient>> {
        self.get_or_try_init(|| async move {
            debug!(
                "Initiating Enterprise Q client with region {} and endpoint {}",
                config.region, config.endpoint
            );
            EnterpriseQClient::from_config(config).await
        })
        .await
    }

    /// The client, if one has been built.
    pub async fn get(&self) -> Option<Arc<EnterpriseQClient>> {
        self.client.lock().await.clone()
    }
}

impl Default for ClientSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the shared client, building it from `config` on first use.
pub async fn get_client(config: &EnterpriseQConfig) -> Result<Arc<EnterpriseQClient>> {
    CLIENT.get_or_build(config).await
}

/// Shared-client state, for diagnostics.
pub async fn is_client_initialized() -> bool {
    CLIENT.get().await.is_some()
}

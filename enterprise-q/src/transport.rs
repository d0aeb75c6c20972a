//! HTTP transport for Enterprise Q requests.
//!
//! The client binds operations to [`HttpRequest`]s; a [`Transport`] signs and
//! sends them. Production traffic goes through [`SigV4Transport`], which
//! resolves credentials with the default AWS provider chain.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use reqwest::Url;
use serde_json::Value;
use std::time::SystemTime;
use tracing::debug;

use crate::{Error, Result};

/// A bound operation, ready to be signed and sent.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    /// JSON body with all URI, query and header members removed
    pub body: Value,
}

/// Sends bound requests and returns the decoded JSON response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<Value>;
}

/// Transport signing requests with AWS Signature V4.
pub struct SigV4Transport {
    http: reqwest::Client,
    credentials: SharedCredentialsProvider,
    region: String,
    signing_name: String,
}

impl SigV4Transport {
    /// Create a transport using the default AWS configuration for `region`.
    pub async fn from_env(region: &str, signing_name: &str) -> Result<Self> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        let credentials = sdk_config
            .credentials_provider()
            .ok_or_else(|| Error::Aws("No credentials provider configured".to_string()))?;

        Ok(Self::new(credentials, region, signing_name))
    }

    pub fn new(credentials: SharedCredentialsProvider, region: &str, signing_name: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            region: region.to_string(),
            signing_name: signing_name.to_string(),
        }
    }

    /// Compute the signature headers for a request.
    async fn signature_headers(
        &self,
        request: &HttpRequest,
        body: &[u8],
    ) -> Result<Vec<(String, String)>> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| Error::Aws(format!("Failed to resolve credentials: {}", e)))?;
        let identity: Identity = credentials.into();

        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(&self.signing_name)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| Error::Aws(format!("Invalid signing parameters: {}", e)))?
            .into();

        let signable = SignableRequest::new(
            &request.method,
            request.url.as_str(),
            request
                .headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
            SignableBody::Bytes(body),
        )
        .map_err(|e| Error::Aws(format!("Failed to sign request: {}", e)))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| Error::Aws(format!("Failed to sign request: {}", e)))?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}

#[async_trait]
impl Transport for SigV4Transport {
    async fn send(&self, mut request: HttpRequest) -> Result<Value> {
        request
            .headers
            .push(("content-type".to_string(), "application/json".to_string()));
        let body = serde_json::to_vec(&request.body)?;
        let signature = self.signature_headers(&request, &body).await?;

        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::Aws(format!("Invalid HTTP method: {}", e)))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in request.headers.iter().chain(signature.iter()) {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Request to {} failed: {}", request.url, e)))?;

        let status = response.status().as_u16();
        let error_type = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Aws(format!("Failed to read response: {}", e)))?;

        debug!("Enterprise Q responded with status {}", status);

        if !(200..300).contains(&status) {
            return Err(error_from_response(status, error_type.as_deref(), &bytes));
        }

        parse_body(&bytes)
    }
}

/// Decode a success body. Operations without output answer with an empty body.
pub(crate) fn parse_body(bytes: &[u8]) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    Ok(serde_json::from_slice(bytes)?)
}

/// Build the error for a non-2xx response.
///
/// The code comes from `x-amzn-errortype` or the body `__type`, e.g.
/// `aws.protocols#ValidationException:http://internal` becomes
/// `ValidationException`.
pub(crate) fn error_from_response(status: u16, error_type: Option<&str>, body: &[u8]) -> Error {
    let parsed: Value = serde_json::from_slice(body).unwrap_or(Value::Null);

    let raw_code = error_type
        .or_else(|| parsed.get("__type").and_then(Value::as_str))
        .or_else(|| parsed.get("code").and_then(Value::as_str))
        .unwrap_or("UnknownError");
    let code = raw_code
        .split(':')
        .next()
        .unwrap_or(raw_code)
        .rsplit('#')
        .next()
        .unwrap_or(raw_code)
        .to_string();

    let message = parsed
        .get("message")
        .or_else(|| parsed.get("Message"))
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

    Error::Service {
        status,
        code,
        message,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;
    use tracing_subscriber::EnvFilter;

    /// Install a test subscriber; `RUST_LOG=debug` shows request bodies.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Records every request and answers with a canned result.
    pub struct RecordingTransport {
        requests: Mutex<Vec<HttpRequest>>,
        response: std::result::Result<Value, (u16, String)>,
    }

    impl RecordingTransport {
        pub fn replying(response: Value) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                response: Ok(response),
            }
        }

        pub fn failing(status: u16, code: &str) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                response: Err((status, code.to_string())),
            }
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: HttpRequest) -> Result<Value> {
            self.requests.lock().unwrap().push(request);
            match &self.response {
                Ok(value) => Ok(value.clone()),
                Err((status, code)) => Err(Error::Service {
                    status: *status,
                    code: code.clone(),
                    message: "rejected by test transport".to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_credential_types::Credentials;
    use serde_json::json;

    #[tokio::test]
    async fn test_signature_headers() {
        let credentials = Credentials::new("AKIDEXAMPLE", "secret", None, None, "test");
        let transport = SigV4Transport::new(
            SharedCredentialsProvider::new(credentials),
            "us-east-1",
            "expertq",
        );
        let request = HttpRequest {
            method: "POST".to_string(),
            url: Url::parse("https://expertq.us-east-1.api.aws/applications/a/conversations?sync")
                .unwrap(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: json!({"userMessage": "What is X?"}),
        };
        let body = serde_json::to_vec(&request.body).unwrap();

        let headers = transport.signature_headers(&request, &body).await.unwrap();
        let header = |name: &str| {
            headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
        };

        assert!(header("x-amz-date").is_some());
        let authorization = header("authorization").unwrap();
        assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
        assert!(authorization.contains("/us-east-1/expertq/aws4_request"));
        assert!(authorization.contains("SignedHeaders=content-type;host;x-amz-date"));
        assert!(authorization.contains("Signature="));
    }

    #[test]
    fn test_empty_body_is_empty_object() {
        assert_eq!(parse_body(b"").unwrap(), json!({}));
        assert_eq!(parse_body(b" \n").unwrap(), json!({}));
        assert_eq!(parse_body(br#"{"a":1}"#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_invalid_body_is_serialization_error() {
        assert!(matches!(parse_body(b"<html>"), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_error_code_from_header() {
        let err = error_from_response(
            400,
            Some("ValidationException:http://internal.amazon.com/coral/"),
            br#"{"message":"userMessage is too long"}"#,
        );
        match err {
            Error::Service {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, "ValidationException");
                assert_eq!(message, "userMessage is too long");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_code_from_body() {
        let err = error_from_response(
            404,
            None,
            br#"{"__type":"com.amazonaws.expertq#ResourceNotFoundException","Message":"Conversation not found"}"#,
        );
        assert!(matches!(
            err,
            Error::Service { status: 404, ref code, ref message }
                if code == "ResourceNotFoundException" && message == "Conversation not found"
        ));
    }

    #[test]
    fn test_error_without_json_body() {
        let err = error_from_response(502, None, b"Bad Gateway");
        assert!(matches!(
            err,
            Error::Service { status: 502, ref code, ref message }
                if code == "UnknownError" && message == "Bad Gateway"
        ));
    }
}

//! Service model registry.
//!
//! Enterprise Q is not bundled with the AWS SDK yet, so its service model ships
//! with this crate and is installed in a process-wide registry before the first
//! client is built. Clients are then driven entirely by the registered model.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use tracing::debug;

use crate::{Error, Result};

/// Service key the model is registered under.
pub const SERVICE_KEY: &str = "expertq";

/// The only API version we ship a model for.
pub const API_VERSION: &str = "2023-11-27";

const BUNDLED_MODEL: &str = include_str!("../models/expertq-2023-11-27.json");

/// Process-wide registry, created on first use.
static REGISTRY: OnceLock<ServiceRegistry> = OnceLock::new();

/// Protocol metadata from the service model.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    pub api_version: String,
    pub endpoint_prefix: String,
    pub protocol: String,
    pub service_id: String,
    /// Service name used in SigV4 signatures
    pub signing_name: String,
}

/// HTTP binding of an operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpBinding {
    pub method: String,
    /// Path template with `{label}` placeholders, optionally followed by a fixed query
    pub request_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShapeRef {
    pub shape: String,
}

/// A single remote operation.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub http: HttpBinding,
    pub input: Option<ShapeRef>,
    pub output: Option<ShapeRef>,
}

/// Where a structure member is bound in the HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MemberLocation {
    Uri,
    Querystring,
    Header,
    Headers,
    StatusCode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDescriptor {
    pub shape: String,
    pub location: Option<MemberLocation>,
    pub location_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShapeDescriptor {
    #[serde(rename = "type")]
    pub shape_type: String,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub members: HashMap<String, MemberDescriptor>,
}

/// Parsed service model: operations, shapes and protocol metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDescriptor {
    pub metadata: ServiceMetadata,
    pub operations: HashMap<String, OperationDescriptor>,
    pub shapes: HashMap<String, ShapeDescriptor>,
    #[serde(default)]
    pub paginators: HashMap<String, serde_json::Value>,
}

impl ServiceDescriptor {
    /// Parse a service model document.
    ///
    /// Paginators are dropped; none of the operations we call are paginated.
    pub fn parse(model: &str) -> Result<Self> {
        let mut descriptor: ServiceDescriptor = serde_json::from_str(model)
            .map_err(|e| Error::Registration(format!("Invalid service model: {}", e)))?;
        descriptor.paginators.clear();

        for operation in descriptor.operations.values() {
            for shape_ref in operation.input.iter().chain(operation.output.iter()) {
                if !descriptor.shapes.contains_key(&shape_ref.shape) {
                    return Err(Error::Registration(format!(
                        "Operation {} references unknown shape {}",
                        operation.name, shape_ref.shape
                    )));
                }
            }
        }

        Ok(descriptor)
    }

    /// Parse the model bundled with this crate.
    pub fn bundled() -> Result<Self> {
        let descriptor = Self::parse(BUNDLED_MODEL)?;
        if descriptor.metadata.api_version != API_VERSION {
            return Err(Error::Registration(format!(
                "Bundled model has version {}, expected {}",
                descriptor.metadata.api_version, API_VERSION
            )));
        }
        Ok(descriptor)
    }

    /// Look up an operation by name.
    pub fn operation(&self, name: &str) -> Result<&OperationDescriptor> {
        self.operations
            .get(name)
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))
    }

    /// Members of an operation's input structure.
    pub fn input_members(
        &self,
        operation: &OperationDescriptor,
    ) -> Option<&HashMap<String, MemberDescriptor>> {
        let shape = operation.input.as_ref()?;
        self.shapes.get(&shape.shape).map(|s| &s.members)
    }
}

/// Registry of service descriptors keyed by service key and API version.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<(String, String), Arc<ServiceDescriptor>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a descriptor unless one is already registered for this key.
    ///
    /// `load` runs at most once per key. A failed load installs nothing.
    pub fn register_with<F>(
        &self,
        service: &str,
        version: &str,
        load: F,
    ) -> Result<Arc<ServiceDescriptor>>
    where
        F: FnOnce() -> Result<ServiceDescriptor>,
    {
        let key = (service.to_string(), version.to_string());

        let mut services = self
            .services
            .write()
            .map_err(|_| Error::Registration("Service registry lock poisoned".to_string()))?;

        if let Some(existing) = services.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let descriptor = Arc::new(load()?);
        debug!(
            "Registered service {} version {} with {} operations",
            service,
            version,
            descriptor.operations.len()
        );
        services.insert(key, Arc::clone(&descriptor));

        Ok(descriptor)
    }

    /// Get a registered descriptor.
    pub fn get(&self, service: &str, version: &str) -> Option<Arc<ServiceDescriptor>> {
        self.services
            .read()
            .ok()?
            .get(&(service.to_string(), version.to_string()))
            .cloned()
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.services.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The process-wide registry.
pub fn global_registry() -> &'static ServiceRegistry {
    REGISTRY.get_or_init(ServiceRegistry::new)
}

/// Register the bundled Enterprise Q model. Safe to call any number of times.
pub fn ensure_service_registered() -> Result<Arc<ServiceDescriptor>> {
    global_registry().register_with(SERVICE_KEY, API_VERSION, ServiceDescriptor::bundled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_bundled_model_parses() {
        let descriptor = ServiceDescriptor::bundled().unwrap();
        assert_eq!(descriptor.metadata.api_version, API_VERSION);
        assert_eq!(descriptor.metadata.signing_name, "expertq");
        assert_eq!(descriptor.metadata.protocol, "rest-json");
        assert!(descriptor.paginators.is_empty());

        let chat = descriptor.operation("ChatSync").unwrap();
        assert_eq!(chat.http.method, "POST");
        assert_eq!(
            chat.http.request_uri,
            "/applications/{applicationId}/conversations?sync"
        );

        let members = descriptor.input_members(chat).unwrap();
        assert_eq!(members["applicationId"].location, Some(MemberLocation::Uri));
        assert_eq!(
            members["userId"].location,
            Some(MemberLocation::Querystring)
        );
        assert_eq!(members["userMessage"].location, None);
    }

    #[test]
    fn test_unknown_operation() {
        let descriptor = ServiceDescriptor::bundled().unwrap();
        let err = descriptor.operation("DeleteApplication").unwrap_err();
        assert!(matches!(err, Error::UnknownOperation(name) if name == "DeleteApplication"));
    }

    #[test]
    fn test_paginators_are_cleared() {
        let model = r#"{
            "metadata": {"apiVersion": "1", "endpointPrefix": "x", "protocol": "rest-json",
                         "serviceId": "X", "signingName": "x"},
            "operations": {},
            "shapes": {},
            "paginators": {"ListThings": {"input_token": "nextToken"}}
        }"#;
        let descriptor = ServiceDescriptor::parse(model).unwrap();
        assert!(descriptor.paginators.is_empty());
    }

    #[test]
    fn test_dangling_shape_is_rejected() {
        let model = r#"{
            "metadata": {"apiVersion": "1", "endpointPrefix": "x", "protocol": "rest-json",
                         "serviceId": "X", "signingName": "x"},
            "operations": {"Ping": {"name": "Ping", "http": {"method": "GET", "requestUri": "/"},
                                    "input": {"shape": "PingInput"}}},
            "shapes": {}
        }"#;
        let err = ServiceDescriptor::parse(model).unwrap_err();
        assert!(matches!(err, Error::Registration(_)));
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = ServiceRegistry::new();
        let loads = AtomicUsize::new(0);

        let load = || {
            loads.fetch_add(1, Ordering::SeqCst);
            ServiceDescriptor::bundled()
        };

        let first = registry.register_with(SERVICE_KEY, API_VERSION, load).unwrap();
        for _ in 0..3 {
            let again = registry
                .register_with(SERVICE_KEY, API_VERSION, || {
                    loads.fetch_add(1, Ordering::SeqCst);
                    ServiceDescriptor::bundled()
                })
                .unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_failed_registration_can_be_retried() {
        let registry = ServiceRegistry::new();

        let err = registry
            .register_with(SERVICE_KEY, API_VERSION, || ServiceDescriptor::parse("{"))
            .unwrap_err();
        assert!(matches!(err, Error::Registration(_)));
        assert!(registry.is_empty());

        registry
            .register_with(SERVICE_KEY, API_VERSION, ServiceDescriptor::bundled)
            .unwrap();
        assert!(registry.get(SERVICE_KEY, API_VERSION).is_some());
    }

    #[test]
    fn test_ensure_service_registered_repeatedly() {
        let first = ensure_service_registered().unwrap();
        let second = ensure_service_registered().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(global_registry().get(SERVICE_KEY, API_VERSION).is_some());
        assert_eq!(global_registry().len(), 1);
    }
}

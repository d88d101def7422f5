//! Shared helpers for resource lifecycle tests against mockito servers

#![allow(dead_code)]

use akamai::AkamaiProvider;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{ConfigureProviderRequest, Provider};
use tfplug::resource::{ConfigureResourceRequest, ResourceWithConfigure};
use tfplug::types::{AttributePath, ClientCapabilities, Dynamic, DynamicValue};

pub type ProviderData = Arc<dyn Any + Send + Sync>;

/// Configures the provider with a `config` block pointing at `host`
pub async fn provider_data(host: String) -> ProviderData {
    let mut block = HashMap::new();
    block.insert("host".to_string(), Dynamic::String(host));
    block.insert("client_token".to_string(), Dynamic::String("akab-client-token".to_string()));
    block.insert("client_secret".to_string(), Dynamic::String("client-secret".to_string()));
    block.insert("access_token".to_string(), Dynamic::String("akab-access-token".to_string()));
    block.insert("max_body".to_string(), Dynamic::Null);
    block.insert("account_key".to_string(), Dynamic::Null);

    let mut config = DynamicValue::object();
    config.set_map(&AttributePath::new("config"), block).unwrap();

    let mut provider = AkamaiProvider::new();
    let response = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config,
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    response.provider_data.unwrap()
}

pub async fn configured<R: ResourceWithConfigure>(mut resource: R, data: &ProviderData) -> R {
    let response = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: Some(data.clone()),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    resource
}

pub fn object(pairs: Vec<(&str, Dynamic)>) -> DynamicValue {
    DynamicValue::new(Dynamic::Map(
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
    ))
}

pub fn string(value: &str) -> Dynamic {
    Dynamic::String(value.to_string())
}

pub fn get_string(state: &DynamicValue, name: &str) -> String {
    state.get_string(&AttributePath::new(name)).unwrap()
}

pub fn get(state: &DynamicValue, name: &str) -> Dynamic {
    state
        .get(&AttributePath::new(name))
        .cloned()
        .unwrap_or(Dynamic::Null)
}

mod common;

use akamai::AkamaiProvider;
use mockito::Server;
use std::any::Any;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{Provider, ProviderSchemaRequest};
use tfplug::resource::{
    ConfigureResourceRequest, ReadResourceRequest, Resource, ResourceSchemaRequest,
    ResourceWithConfigure,
};
use tfplug::types::{ClientCapabilities, Dynamic};

#[tokio::test]
async fn provider_schema_available_without_configuration() {
    let provider = AkamaiProvider::new();
    let response = provider.schema(Context::new(), ProviderSchemaRequest).await;

    assert!(response.diagnostics.is_empty());
    let schema = &response.schema;
    for name in ["edgerc", "config_section", "property_section", "appsec_section"] {
        assert!(schema.attribute(name).is_some(), "missing {}", name);
    }
    let config = schema
        .block
        .block_types
        .iter()
        .find(|b| b.type_name == "config")
        .unwrap();
    let secret = config
        .block
        .attributes
        .iter()
        .find(|a| a.name == "client_secret")
        .unwrap();
    assert!(secret.sensitive);
}

#[tokio::test]
async fn every_resource_schema_has_an_id() {
    let provider = AkamaiProvider::new();

    for (name, factory) in provider.resources() {
        let resource = factory();
        let response = resource.schema(Context::new(), ResourceSchemaRequest).await;
        assert!(response.diagnostics.is_empty(), "{}", name);
        assert!(response.schema.attribute("id").is_some(), "{} has no id", name);
    }
}

#[tokio::test]
async fn resources_reject_foreign_provider_data() {
    let provider = AkamaiProvider::new();

    for (name, factory) in provider.resources() {
        let mut resource = factory();
        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(Arc::new("not provider data") as Arc<dyn Any + Send + Sync>),
                },
            )
            .await;
        assert_eq!(response.diagnostics.len(), 1, "{}", name);
        assert_eq!(response.diagnostics[0].summary, "Invalid provider data");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn factory_resources_use_configured_client() {
    let mut server = Server::new_async().await;
    let protections = server
        .mock(
            "GET",
            "/appsec/v1/configs/43253/versions/7/security-policies/AAAA_81230/protections",
        )
        .match_header("authorization", mockito::Matcher::Regex("^EG1-HMAC-SHA256 client_token=akab-client-token;access_token=akab-access-token;timestamp=".to_string()))
        .with_body(r#"{"applyApiConstraints":true}"#)
        .create_async()
        .await;

    let data = common::provider_data(server.url()).await;
    let provider = AkamaiProvider::new();
    let factories = provider.resources();
    let mut resource = factories["akamai_appsec_api_constraints_protection"]();
    let response = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: Some(data),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);

    let state = common::object(vec![
        ("id", common::string("43253:AAAA_81230")),
        ("config_id", Dynamic::Number(43253.0)),
        ("version", Dynamic::Number(7.0)),
        ("security_policy_id", common::string("AAAA_81230")),
        ("enabled", Dynamic::Bool(false)),
    ]);
    let response = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "akamai_appsec_api_constraints_protection".to_string(),
                current_state: state,
                private: vec![],
                provider_meta: None,
                client_capabilities: ClientCapabilities::default(),
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(
        common::get(&response.new_state.unwrap(), "enabled"),
        Dynamic::Bool(true)
    );
    protections.assert_async().await;
}

pub mod api;
pub mod edgegrid;
pub mod provider_data;
pub mod resources;
pub mod tools;

pub use provider_data::AkamaiProviderData;

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, Provider, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, Block, NestedBlock, NestingMode, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::edgegrid::{EdgegridConfig, DEFAULT_MAX_BODY, DEFAULT_SECTION};

#[derive(Default)]
pub struct AkamaiProvider {
    configured: bool,
}

impl AkamaiProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }
}

fn config_block() -> NestedBlock {
    NestedBlock {
        type_name: "config".to_string(),
        block: Block {
            attributes: vec![
                AttributeBuilder::new("host", AttributeType::String)
                    .required()
                    .build(),
                AttributeBuilder::new("client_token", AttributeType::String)
                    .required()
                    .build(),
                AttributeBuilder::new("client_secret", AttributeType::String)
                    .required()
                    .sensitive()
                    .build(),
                AttributeBuilder::new("access_token", AttributeType::String)
                    .required()
                    .sensitive()
                    .build(),
                AttributeBuilder::new("max_body", AttributeType::Number)
                    .optional()
                    .build(),
                AttributeBuilder::new("account_key", AttributeType::String)
                    .optional()
                    .build(),
            ],
            description: "EdgeGrid credentials, used instead of the edgerc file".to_string(),
            ..Block::new()
        },
        nesting: NestingMode::Single,
        min_items: 0,
        max_items: 1,
    }
}

fn optional_string(config: &DynamicValue, path: AttributePath) -> Option<String> {
    config
        .get(&path)
        .and_then(Dynamic::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Credentials from the `config` block, None when the block is absent
fn credentials_from_block(config: &DynamicValue) -> Result<Option<EdgegridConfig>, Diagnostic> {
    match config.get(&AttributePath::new("config")) {
        None | Some(Dynamic::Null) => return Ok(None),
        Some(Dynamic::Unknown) => {
            return Err(Diagnostic::error(
                "Unknown provider configuration",
                "the config block must be known when the provider is configured",
            ))
        }
        Some(_) => {}
    }

    let field = |name: &str| optional_string(config, AttributePath::new("config").attribute(name));
    let required = |name: &str| {
        field(name).ok_or_else(|| {
            Diagnostic::error(
                "Missing credential",
                format!("config.{} is required", name),
            )
            .with_attribute(AttributePath::new("config").attribute(name))
        })
    };

    let max_body = config
        .get(&AttributePath::new("config").attribute("max_body"))
        .and_then(Dynamic::as_number)
        .filter(|n| *n > 0.0)
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_MAX_BODY);

    Ok(Some(EdgegridConfig {
        host: required("host")?,
        client_token: required("client_token")?,
        client_secret: required("client_secret")?,
        access_token: required("access_token")?,
        max_body,
        account_key: field("account_key"),
    }))
}

fn client_for(edgegrid: EdgegridConfig) -> Result<api::Client, Diagnostic> {
    api::Client::new(edgegrid).map_err(|e| {
        Diagnostic::error(
            "Failed to create API client",
            format!("Unable to create Akamai client: {}", e),
        )
    })
}

fn resolve_section(edgerc: Option<&str>, section: &str) -> Result<EdgegridConfig, Diagnostic> {
    EdgegridConfig::resolve(edgerc, section).map_err(|e| {
        Diagnostic::error(
            "Unable to load EdgeGrid credentials",
            format!("section {:?}: {}", section, e),
        )
    })
}

impl AkamaiProvider {
    fn build_provider_data(config: &DynamicValue) -> Result<AkamaiProviderData, Diagnostic> {
        if let Some(edgegrid) = credentials_from_block(config)? {
            tracing::debug!("using EdgeGrid credentials from the config block");
            return Ok(AkamaiProviderData::new(client_for(edgegrid)?));
        }

        let edgerc = optional_string(config, AttributePath::new("edgerc"));
        let section = optional_string(config, AttributePath::new("config_section"))
            .unwrap_or_else(|| DEFAULT_SECTION.to_string());
        let property_section = optional_string(config, AttributePath::new("property_section"));
        let appsec_section = optional_string(config, AttributePath::new("appsec_section"));

        if property_section.is_none() && appsec_section.is_none() {
            let edgegrid = resolve_section(edgerc.as_deref(), &section)?;
            return Ok(AkamaiProviderData::new(client_for(edgegrid)?));
        }

        let papi = resolve_section(
            edgerc.as_deref(),
            property_section.as_deref().unwrap_or(&section),
        )?;
        let appsec = resolve_section(
            edgerc.as_deref(),
            appsec_section.as_deref().unwrap_or(&section),
        )?;
        Ok(AkamaiProviderData::with_clients(
            client_for(papi)?,
            client_for(appsec)?,
        ))
    }
}

#[async_trait]
impl Provider for AkamaiProvider {
    fn type_name(&self) -> &str {
        "akamai"
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Akamai provider")
            .attribute(
                AttributeBuilder::new("edgerc", AttributeType::String)
                    .description("Path to the edgerc file, ~/.edgerc by default")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("config_section", AttributeType::String)
                    .description("edgerc section holding the API credentials")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("property_section", AttributeType::String)
                    .description("edgerc section for Property Manager calls")
                    .optional()
                    .deprecated("Use config_section instead")
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("appsec_section", AttributeType::String)
                    .description("edgerc section for Application Security calls")
                    .optional()
                    .deprecated("Use config_section instead")
                    .build(),
            )
            .block(config_block())
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        tracing::info!(
            "configuring provider for Terraform {}",
            request.terraform_version
        );

        match Self::build_provider_data(&request.config) {
            Ok(data) => {
                self.configured = true;
                ConfigureProviderResponse {
                    diagnostics: vec![],
                    provider_data: Some(Arc::new(data) as Arc<dyn Any + Send + Sync>),
                }
            }
            Err(diag) => ConfigureProviderResponse {
                diagnostics: vec![diag],
                provider_data: None,
            },
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "akamai_property_activation".to_string(),
            Box::new(|| {
                Box::new(resources::PropertyActivationResource::new()) as Box<dyn ResourceWithConfigure>
            }),
        );
        factories.insert(
            "akamai_appsec_rate_policy_action".to_string(),
            Box::new(|| {
                Box::new(resources::RatePolicyActionResource::new()) as Box<dyn ResourceWithConfigure>
            }),
        );
        factories.insert(
            "akamai_appsec_api_constraints_protection".to_string(),
            Box::new(|| {
                Box::new(resources::ApiConstraintsProtectionResource::new())
                    as Box<dyn ResourceWithConfigure>
            }),
        );
        factories.insert(
            "akamai_appsec_attack_group_condition_exception".to_string(),
            Box::new(|| {
                Box::new(resources::AttackGroupConditionExceptionResource::new())
                    as Box<dyn ResourceWithConfigure>
            }),
        );
        factories
    }
}

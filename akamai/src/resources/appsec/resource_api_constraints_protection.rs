//! API constraints protection resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource,
    ReadResourceRequest, ReadResourceResponse, Resource, ResourceSchemaRequest,
    ResourceSchemaResponse, ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::split_import_id;
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tracing::Instrument;

use super::{config_id_attribute, parse_id_part, policy_attribute, resolve_version, version_attribute};
use crate::api::Client;
use crate::resources::{api_error, not_configured, provider_data_from};
use crate::tools;
use crate::AkamaiProviderData;

#[derive(Default)]
pub struct ApiConstraintsProtectionResource {
    provider_data: Option<AkamaiProviderData>,
}

impl ApiConstraintsProtectionResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn apply_protection(
        &self,
        client: &Client,
        state: &mut DynamicValue,
        enabled: Option<bool>,
    ) -> Result<(), Diagnostic> {
        let appsec = client.appsec();
        let config_id = tools::get_int_value("config_id", state)?;
        let policy_id = tools::get_string_value("security_policy_id", state)?;
        let version = resolve_version(&appsec, config_id, state).await?;

        // false reads as "not set", so the raw bool is used
        let enabled = match enabled {
            Some(enabled) => enabled,
            None => state.get_bool(&AttributePath::new("enabled")).map_err(|e| {
                Diagnostic::error("Invalid attribute value", format!("enabled: {}", e))
            })?,
        };

        let protections = appsec
            .update_api_constraints_protection(config_id, version, &policy_id, enabled)
            .await
            .map_err(|e| api_error("Failed to update API constraints protection", &e))?;
        tracing::debug!("updated protections {:?}", protections);

        tools::set_value(
            state,
            "id",
            Dynamic::String(format!("{}:{}", config_id, policy_id)),
        )?;
        Ok(())
    }

    async fn read_protection(&self, client: &Client, state: &mut DynamicValue) -> Result<(), Diagnostic> {
        let appsec = client.appsec();
        let config_id = tools::get_int_value("config_id", state)?;
        let policy_id = tools::get_string_value("security_policy_id", state)?;
        let version = resolve_version(&appsec, config_id, state).await?;

        let protections = appsec
            .get_api_constraints_protection(config_id, version, &policy_id)
            .await
            .map_err(|e| api_error("Failed to read API constraints protection", &e))?;

        tools::set_value(
            state,
            "enabled",
            Dynamic::Bool(protections.apply_api_constraints),
        )?;
        tools::set_value(
            state,
            "id",
            Dynamic::String(format!("{}:{}", config_id, policy_id)),
        )?;
        Ok(())
    }

    async fn write_and_read(&self, client: &Client, state: &mut DynamicValue) -> Result<(), Diagnostic> {
        self.apply_protection(client, state, None).await?;
        self.read_protection(client, state).await
    }
}

#[async_trait]
impl Resource for ApiConstraintsProtectionResource {
    fn type_name(&self) -> &str {
        "akamai_appsec_api_constraints_protection"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Enables or disables API request constraints protection for a security policy")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(config_id_attribute())
            .attribute(version_attribute())
            .attribute(policy_attribute("security_policy_id"))
            .attribute(
                AttributeBuilder::new("enabled", AttributeType::Bool)
                    .description("Whether API request constraints protection is applied")
                    .required()
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut new_state = request.planned_state;

        let diagnostics = match &self.provider_data {
            Some(data) => self
                .write_and_read(&data.appsec, &mut new_state)
                .instrument(tracing::info_span!("APPSEC", operation = "resourceAPIConstraintsProtectionCreate"))
                .await
                .err()
                .into_iter()
                .collect(),
            None => vec![not_configured()],
        };

        CreateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![not_configured()],
                private: request.private,
            };
        };

        let mut new_state = request.current_state.clone();
        match self
            .read_protection(&data.appsec, &mut new_state)
            .instrument(tracing::info_span!("APPSEC", operation = "resourceAPIConstraintsProtectionRead"))
            .await
        {
            Ok(()) => ReadResourceResponse {
                new_state: Some(new_state),
                diagnostics: vec![],
                private: request.private,
            },
            Err(diag) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![diag],
                private: request.private,
            },
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };

        let mut new_state = request.planned_state.clone();
        match self
            .write_and_read(&data.appsec, &mut new_state)
            .instrument(tracing::info_span!("APPSEC", operation = "resourceAPIConstraintsProtectionUpdate"))
            .await
        {
            Ok(()) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let diagnostics = match &self.provider_data {
            Some(data) => {
                let mut state = request.prior_state;
                let result = self
                    .apply_protection(&data.appsec, &mut state, Some(false))
                    .instrument(tracing::info_span!("APPSEC", operation = "resourceAPIConstraintsProtectionDelete"))
                    .await;
                result.err().into_iter().collect()
            }
            None => vec![not_configured()],
        };

        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let imported = split_import_id(&request.id, &["config_id", "security_policy_id"])
            .and_then(|parts| {
                let config_id = parse_id_part(&parts[0], "config_id")?;

                let mut state = DynamicValue::object();
                tools::set_value(&mut state, "id", Dynamic::String(request.id.clone()))?;
                tools::set_value(&mut state, "config_id", Dynamic::Number(config_id as f64))?;
                tools::set_value(
                    &mut state,
                    "security_policy_id",
                    Dynamic::String(parts[1].clone()),
                )?;
                Ok(state)
            });

        match imported {
            Ok(state) => ImportResourceStateResponse {
                imported_resources: vec![ImportedResource {
                    type_name: request.type_name,
                    state,
                    private: vec![],
                }],
                diagnostics: vec![],
            },
            Err(diag) => ImportResourceStateResponse {
                imported_resources: vec![],
                diagnostics: vec![diag],
            },
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for ApiConstraintsProtectionResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];

        match provider_data_from(request) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }

        ConfigureResourceResponse { diagnostics }
    }
}

//! Rate policy action resource implementation

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource,
    ReadResourceRequest, ReadResourceResponse, Resource, ResourceSchemaRequest,
    ResourceSchemaResponse, ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::split_import_id;
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOf;
use tracing::Instrument;

use super::{config_id_attribute, parse_id_part, policy_attribute, resolve_version, version_attribute};
use crate::api::appsec::UpdateRatePolicyActionRequest;
use crate::api::Client;
use crate::resources::{api_error, not_configured, provider_data_from};
use crate::tools;
use crate::AkamaiProviderData;

const ACTIONS: &[&str] = &["alert", "deny", "none"];

#[derive(Default)]
pub struct RatePolicyActionResource {
    provider_data: Option<AkamaiProviderData>,
}

impl RatePolicyActionResource {
    pub fn new() -> Self {
        Self::default()
    }
}

struct RatePolicyTarget {
    config_id: i64,
    policy_id: String,
    rate_policy_id: i64,
}

impl RatePolicyTarget {
    fn from_state(state: &DynamicValue) -> Result<Self, Diagnostic> {
        Ok(Self {
            config_id: tools::get_int_value("config_id", state)?,
            policy_id: tools::get_string_value("policy_id", state)?,
            rate_policy_id: tools::get_int_value("rate_policy_id", state)?,
        })
    }

    fn resource_id(&self) -> String {
        format!("{}:{}:{}", self.config_id, self.policy_id, self.rate_policy_id)
    }
}

impl RatePolicyActionResource {
    async fn update_actions(&self, client: &Client, state: &mut DynamicValue) -> Result<(), Diagnostic> {
        let appsec = client.appsec();
        let target = RatePolicyTarget::from_state(state)?;
        let version = resolve_version(&appsec, target.config_id, state).await?;

        let request = UpdateRatePolicyActionRequest {
            ipv4_action: tools::get_string_value("ipv4_action", state)?,
            ipv6_action: tools::get_string_value("ipv6_action", state)?,
        };
        tracing::debug!("updating rate policy action {:?}", request);

        let updated = appsec
            .update_rate_policy_action(
                target.config_id,
                version,
                &target.policy_id,
                target.rate_policy_id,
                &request,
            )
            .await
            .map_err(|e| api_error("Failed to update rate policy action", &e))?;
        tracing::debug!("updated rate policy action {:?}", updated);

        tools::set_value(state, "id", Dynamic::String(target.resource_id()))?;
        self.read_actions(client, state).await
    }

    async fn read_actions(&self, client: &Client, state: &mut DynamicValue) -> Result<(), Diagnostic> {
        let appsec = client.appsec();
        let target = RatePolicyTarget::from_state(state)?;
        let version = resolve_version(&appsec, target.config_id, state).await?;

        let actions = appsec
            .get_rate_policy_actions(target.config_id, version, &target.policy_id)
            .await
            .map_err(|e| api_error("Failed to read rate policy actions", &e))?;

        match actions.into_iter().find(|a| a.id == target.rate_policy_id) {
            Some(action) => {
                tools::set_value(state, "ipv4_action", Dynamic::String(action.ipv4_action))?;
                tools::set_value(state, "ipv6_action", Dynamic::String(action.ipv6_action))?;
                tools::set_value(state, "id", Dynamic::String(target.resource_id()))?;
            }
            None => tracing::warn!(
                "rate policy {} not found in policy {}",
                target.rate_policy_id,
                target.policy_id
            ),
        }
        Ok(())
    }

    async fn remove_actions(&self, client: &Client, prior: &DynamicValue) -> Result<(), Diagnostic> {
        let appsec = client.appsec();
        let mut state = prior.clone();
        let target = RatePolicyTarget::from_state(&state)?;
        let version = resolve_version(&appsec, target.config_id, &mut state).await?;

        let request = UpdateRatePolicyActionRequest {
            ipv4_action: "none".to_string(),
            ipv6_action: "none".to_string(),
        };
        appsec
            .update_rate_policy_action(
                target.config_id,
                version,
                &target.policy_id,
                target.rate_policy_id,
                &request,
            )
            .await
            .map_err(|e| api_error("Failed to remove rate policy action", &e))?;
        Ok(())
    }
}

#[async_trait]
impl Resource for RatePolicyActionResource {
    fn type_name(&self) -> &str {
        "akamai_appsec_rate_policy_action"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Sets the IPv4 and IPv6 actions of a rate policy in a security policy")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(config_id_attribute())
            .attribute(version_attribute())
            .attribute(policy_attribute("policy_id"))
            .attribute(
                AttributeBuilder::new("rate_policy_id", AttributeType::Number)
                    .description("Rate policy ID")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ipv4_action", AttributeType::String)
                    .description("Action for IPv4 traffic: alert, deny or none")
                    .required()
                    .validator(StringOneOf::create(ACTIONS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("ipv6_action", AttributeType::String)
                    .description("Action for IPv6 traffic: alert, deny or none")
                    .required()
                    .validator(StringOneOf::create(ACTIONS))
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
                .update_actions(&data.appsec, &mut new_state)
                .instrument(tracing::info_span!("APPSEC", operation = "resourceRatePolicyActionCreate"))
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
            .read_actions(&data.appsec, &mut new_state)
            .instrument(tracing::info_span!("APPSEC", operation = "resourceRatePolicyActionRead"))
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
            .update_actions(&data.appsec, &mut new_state)
            .instrument(tracing::info_span!("APPSEC", operation = "resourceRatePolicyActionUpdate"))
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
            Some(data) => self
                .remove_actions(&data.appsec, &request.prior_state)
                .instrument(tracing::info_span!("APPSEC", operation = "resourceRatePolicyActionRemove"))
                .await
                .err()
                .into_iter()
                .collect(),
            None => vec![not_configured()],
        };

        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let imported = split_import_id(&request.id, &["config_id", "policy_id", "rate_policy_id"])
            .and_then(|parts| {
                let config_id = parse_id_part(&parts[0], "config_id")?;
                let rate_policy_id = parse_id_part(&parts[2], "rate_policy_id")?;

                let mut state = DynamicValue::object();
                tools::set_value(&mut state, "id", Dynamic::String(request.id.clone()))?;
                tools::set_value(&mut state, "config_id", Dynamic::Number(config_id as f64))?;
                tools::set_value(&mut state, "policy_id", Dynamic::String(parts[1].clone()))?;
                tools::set_value(
                    &mut state,
                    "rate_policy_id",
                    Dynamic::Number(rate_policy_id as f64),
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
impl ResourceWithConfigure for RatePolicyActionResource {
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

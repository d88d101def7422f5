//! Attack group condition and exception resource implementation

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
use tfplug::validator::{JsonString, StringLengthValidator};
use tracing::Instrument;

use super::{config_id_attribute, parse_id_part, policy_attribute, resolve_version, version_attribute};
use crate::api::appsec::ConditionException;
use crate::api::Client;
use crate::resources::{api_error, not_configured, provider_data_from};
use crate::tools::{self, OptionalValue};
use crate::AkamaiProviderData;

#[derive(Default)]
pub struct AttackGroupConditionExceptionResource {
    provider_data: Option<AkamaiProviderData>,
}

impl AttackGroupConditionExceptionResource {
    pub fn new() -> Self {
        Self::default()
    }
}

struct AttackGroupTarget {
    config_id: i64,
    policy_id: String,
    attack_group: String,
}

impl AttackGroupTarget {
    fn from_state(state: &DynamicValue) -> Result<Self, Diagnostic> {
        Ok(Self {
            config_id: tools::get_int_value("config_id", state)?,
            policy_id: tools::get_string_value("security_policy_id", state)?,
            attack_group: tools::get_string_value("attack_group", state)?,
        })
    }

    fn resource_id(&self) -> String {
        format!("{}:{}:{}", self.config_id, self.policy_id, self.attack_group)
    }
}

fn parse_condition_exception(value: &str) -> Result<serde_json::Value, Diagnostic> {
    serde_json::from_str(value).map_err(|e| {
        Diagnostic::error(
            "Invalid condition_exception",
            format!("condition_exception is not valid JSON: {}", e),
        )
    })
}

/// Compact JSON for the API value, or None when the configured string
/// already describes the same document
fn changed_condition_exception(
    current: Option<&str>,
    remote: &ConditionException,
) -> Result<Option<Dynamic>, Diagnostic> {
    let remote_value = serde_json::to_value(remote).map_err(|e| {
        Diagnostic::error("Failed to encode condition_exception", e.to_string())
    })?;

    let unchanged = match current {
        Some(current) => serde_json::from_str::<serde_json::Value>(current)
            .map(|current| current == remote_value)
            .unwrap_or(false),
        None => remote.is_empty(),
    };
    if unchanged {
        return Ok(None);
    }

    Ok(Some(Dynamic::String(remote_value.to_string())))
}

impl AttackGroupConditionExceptionResource {
    async fn write_condition_exception(
        &self,
        client: &Client,
        state: &mut DynamicValue,
    ) -> Result<(), Diagnostic> {
        let appsec = client.appsec();
        let target = AttackGroupTarget::from_state(state)?;
        let version = resolve_version(&appsec, target.config_id, state).await?;

        let body = match tools::get_string_value("condition_exception", state).optional()? {
            Some(json) => parse_condition_exception(&json)?,
            None => serde_json::json!({}),
        };

        appsec
            .update_attack_group_condition_exception(
                target.config_id,
                version,
                &target.policy_id,
                &target.attack_group,
                &body,
            )
            .await
            .map_err(|e| api_error("Failed to update attack group condition exception", &e))?;

        // applied state follows the plan; drift is picked up on refresh
        self.fetch_condition_exception(client, state).await?;
        tools::set_value(state, "id", Dynamic::String(target.resource_id()))?;
        Ok(())
    }

    async fn fetch_condition_exception(
        &self,
        client: &Client,
        state: &mut DynamicValue,
    ) -> Result<ConditionException, Diagnostic> {
        let appsec = client.appsec();
        let target = AttackGroupTarget::from_state(state)?;
        let version = resolve_version(&appsec, target.config_id, state).await?;

        appsec
            .get_attack_group_condition_exception(
                target.config_id,
                version,
                &target.policy_id,
                &target.attack_group,
            )
            .await
            .map_err(|e| api_error("Failed to read attack group condition exception", &e))
    }

    async fn read_condition_exception(
        &self,
        client: &Client,
        state: &mut DynamicValue,
    ) -> Result<(), Diagnostic> {
        let target = AttackGroupTarget::from_state(state)?;
        let remote = self.fetch_condition_exception(client, state).await?;

        let current = tools::get_string_value("condition_exception", state).optional()?;
        if let Some(value) = changed_condition_exception(current.as_deref(), &remote)? {
            tools::set_value(state, "condition_exception", value)?;
        }
        tools::set_value(state, "id", Dynamic::String(target.resource_id()))?;
        Ok(())
    }

    async fn remove_condition_exception(
        &self,
        client: &Client,
        prior: &DynamicValue,
    ) -> Result<(), Diagnostic> {
        let appsec = client.appsec();
        let mut state = prior.clone();
        let target = AttackGroupTarget::from_state(&state)?;
        let version = resolve_version(&appsec, target.config_id, &mut state).await?;

        appsec
            .remove_attack_group_condition_exception(
                target.config_id,
                version,
                &target.policy_id,
                &target.attack_group,
            )
            .await
            .map_err(|e| api_error("Failed to remove attack group condition exception", &e))?;
        Ok(())
    }
}

#[async_trait]
impl Resource for AttackGroupConditionExceptionResource {
    fn type_name(&self) -> &str {
        "akamai_appsec_attack_group_condition_exception"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages the conditions and exceptions of an attack group in a security policy")
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
                AttributeBuilder::new("attack_group", AttributeType::String)
                    .description("Attack group ID, e.g. SQL")
                    .required()
                    .validator(StringLengthValidator::not_empty())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("condition_exception", AttributeType::String)
                    .description("JSON object with the attack group's conditions and exception")
                    .optional()
                    .validator(JsonString::create())
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
                .write_condition_exception(&data.appsec, &mut new_state)
                .instrument(tracing::info_span!("APPSEC", operation = "resourceAttackGroupConditionExceptionCreate"))
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
            .read_condition_exception(&data.appsec, &mut new_state)
            .instrument(tracing::info_span!("APPSEC", operation = "resourceAttackGroupConditionExceptionRead"))
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
            .write_condition_exception(&data.appsec, &mut new_state)
            .instrument(tracing::info_span!("APPSEC", operation = "resourceAttackGroupConditionExceptionUpdate"))
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
                .remove_condition_exception(&data.appsec, &request.prior_state)
                .instrument(tracing::info_span!("APPSEC", operation = "resourceAttackGroupConditionExceptionDelete"))
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
        let imported = split_import_id(
            &request.id,
            &["config_id", "security_policy_id", "attack_group"],
        )
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
            tools::set_value(&mut state, "attack_group", Dynamic::String(parts[2].clone()))?;
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
impl ResourceWithConfigure for AttackGroupConditionExceptionResource {
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

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn remote() -> ConditionException {
        serde_json::from_str(
            r#"{"exception":{"specificHeaderCookieParamXmlOrJsonNames":[{"names":["ExceptMe"],"selector":"REQUEST_HEADERS"}]}}"#,
        )
        .unwrap()
    }

    #[test]
    fn semantically_equal_json_is_kept() {
        let configured = r#"{
            "exception": {
                "specificHeaderCookieParamXmlOrJsonNames": [
                    { "selector": "REQUEST_HEADERS", "names": ["ExceptMe"] }
                ]
            }
        }"#;

        assert!(changed_condition_exception(Some(configured), &remote())
            .unwrap()
            .is_none());
    }

    #[test]
    fn drift_is_written_compact() {
        let changed = changed_condition_exception(Some(r#"{"exception":{}}"#), &remote())
            .unwrap()
            .unwrap();

        assert_eq!(
            changed,
            Dynamic::String(
                r#"{"exception":{"specificHeaderCookieParamXmlOrJsonNames":[{"names":["ExceptMe"],"selector":"REQUEST_HEADERS"}]}}"#
                    .to_string()
            )
        );
    }

    #[test]
    fn empty_remote_with_unset_value_is_unchanged() {
        assert!(changed_condition_exception(None, &ConditionException::default())
            .unwrap()
            .is_none());
        assert!(changed_condition_exception(None, &remote()).unwrap().is_some());
    }
}

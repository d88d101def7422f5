//! Property activation resource implementation
//!
//! Activating a property version on a network is a long running operation:
//! the resource submits (or reuses) an activation and polls it until it is
//! live. Destroying the resource deactivates the version the same way.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tfplug::context::{Context, ContextError};
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{timeouts_block, AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{has_errors, AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{ListLengthValidator, StringOneOf};
use tracing::Instrument;

use crate::api::papi::{
    Activation, ActivationStatus, ActivationType, CreateActivationRequest, Network, PapiApi,
    PapiError, VersionStatus,
};
use crate::api::{ApiError, Client};
use crate::resources::{api_error, not_configured, provider_data_from};
use crate::tools::{self, OptionalValue, ToolsError};
use crate::AkamaiProviderData;

/// Default timeout for create, update and delete
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90 * 60);

/// Activations are never polled more often than this
pub const POLL_MINIMUM: Duration = Duration::from_secs(60);

const PROPERTY_PREFIX: &str = "prp_";

/// How often an activation's status is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub minimum: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: POLL_MINIMUM,
            minimum: POLL_MINIMUM,
        }
    }
}

impl PollConfig {
    pub fn effective_interval(&self) -> Duration {
        tools::max_duration(self.interval, self.minimum)
    }
}

#[derive(Default)]
pub struct PropertyActivationResource {
    provider_data: Option<AkamaiProviderData>,
    poll: PollConfig,
}

impl PropertyActivationResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_config(poll: PollConfig) -> Self {
        Self {
            provider_data: None,
            poll,
        }
    }
}

/// Property, network and version an activation applies to
#[derive(Debug, Clone, PartialEq)]
struct ActivationTarget {
    property_id: String,
    network: Network,
    version: i64,
}

impl ActivationTarget {
    fn resource_id(&self) -> String {
        format!("{}:{}", self.property_id, self.network)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Activation,
    Deactivation,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Activation => f.write_str("activation"),
            Operation::Deactivation => f.write_str("deactivation"),
        }
    }
}

enum PollError {
    Failed(String),
    Api(ApiError),
    State(ToolsError),
    Interrupted {
        reason: ContextError,
        activation: Activation,
    },
}

fn papi_error_attribute_type() -> AttributeType {
    let mut fields = HashMap::new();
    for name in [
        "type",
        "title",
        "detail",
        "instance",
        "behavior_name",
        "error_location",
    ] {
        fields.insert(name.to_string(), AttributeType::String);
    }
    fields.insert("status_code".to_string(), AttributeType::Number);
    AttributeType::List(Box::new(AttributeType::Object(fields)))
}

fn resolve_property_id(data: &DynamicValue) -> Result<String, ToolsError> {
    let property_id = match tools::get_string_value("property_id", data) {
        Err(ToolsError::NotFound(_)) => tools::get_string_value("property", data)?,
        other => other?,
    };
    Ok(tools::add_prefix(&property_id, PROPERTY_PREFIX))
}

fn resolve_network(data: &DynamicValue) -> Result<Network, Diagnostic> {
    let network = tools::get_string_value("network", data)
        .optional()?
        .unwrap_or_else(|| Network::Staging.to_string());

    Network::from_alias(&network).ok_or_else(|| {
        Diagnostic::error(
            "Invalid network",
            format!(
                "network {:?} is not valid, expected one of STAGING (STAG, S) or PRODUCTION (PROD, P)",
                network
            ),
        )
        .with_attribute(AttributePath::new("network"))
    })
}

/// Configured version, or the latest version activated on the network
async fn resolve_version(
    data: &DynamicValue,
    papi: &PapiApi<'_>,
    property_id: &str,
    network: Network,
) -> Result<i64, Diagnostic> {
    if let Some(version) = tools::get_int_value("version", data).optional()? {
        return Ok(version);
    }

    let latest = papi
        .get_latest_version(property_id, Some(network))
        .await
        .map_err(|e| api_error("Failed to get latest property version", &e))?;
    Ok(latest.property_version)
}

async fn resolve_target(
    data: &DynamicValue,
    papi: &PapiApi<'_>,
) -> Result<ActivationTarget, Diagnostic> {
    let property_id = resolve_property_id(data)?;
    let network = resolve_network(data)?;
    let version = resolve_version(data, papi, &property_id, network).await?;
    Ok(ActivationTarget {
        property_id,
        network,
        version,
    })
}

fn operation_timeout(data: &DynamicValue) -> Result<Duration, Diagnostic> {
    let path = AttributePath::new("timeouts").attribute("default");
    match data.get_string(&path) {
        Ok(value) if !value.is_empty() => humantime::parse_duration(&value).map_err(|e| {
            Diagnostic::error(
                "Invalid timeout",
                format!("timeouts.default {:?} is not a duration: {}", value, e),
            )
            .with_attribute(path)
        }),
        _ => Ok(DEFAULT_TIMEOUT),
    }
}

fn flatten_errors(errors: &[PapiError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn set_errors_and_warnings(
    state: &mut DynamicValue,
    errors: &[PapiError],
    warnings: &[PapiError],
) -> Result<(), ToolsError> {
    tools::set_value(state, "errors", Dynamic::String(flatten_errors(errors)))?;
    tools::set_value(state, "warnings", Dynamic::String(flatten_errors(warnings)))
}

fn papi_errors_to_json(errors: &[PapiError]) -> Vec<serde_json::Value> {
    errors
        .iter()
        .map(|e| {
            serde_json::json!({
                "type": e.error_type,
                "title": e.title,
                "detail": e.detail,
                "instance": e.instance,
                "behavior_name": e.behavior_name,
                "error_location": e.error_location,
                "status_code": e.status_code,
            })
        })
        .collect()
}

fn to_indented_json(values: &[serde_json::Value]) -> String {
    use serde::Serialize;

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    match values.serialize(&mut serializer) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => serde_json::Value::from(values.to_vec()).to_string(),
    }
}

/// Records rule errors in state; an error diagnostic stops the activation
fn check_rule_tree(
    state: &mut DynamicValue,
    errors: &[PapiError],
    warnings: &[PapiError],
) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];

    if !errors.is_empty() {
        let json = papi_errors_to_json(errors);
        let list: Vec<Dynamic> = json
            .iter()
            .filter_map(|v| serde_json::from_value::<Dynamic>(v.clone()).ok())
            .collect();
        if let Err(e) = tools::set_value(state, "rule_errors", Dynamic::List(list)) {
            return vec![e.into()];
        }

        let msg = to_indented_json(&json);
        tracing::error!("Property has rule errors {}", msg);
        diagnostics.push(Diagnostic::error(
            "Rule errors",
            format!("activation cannot continue due to rule errors: {}", msg),
        ));
    }

    if !warnings.is_empty() {
        tracing::warn!(
            "Property has rule warnings {}",
            to_indented_json(&papi_errors_to_json(warnings))
        );
    }

    diagnostics
}

/// Most recent in-progress activation for the target among the given types
async fn lookup_activation(
    papi: &PapiApi<'_>,
    target: &ActivationTarget,
    types: &[ActivationType],
) -> Result<Option<Activation>, Diagnostic> {
    let response = papi
        .get_activations(&target.property_id)
        .await
        .map_err(|e| api_error("Failed to list activations", &e))?;

    let mut best: Option<(Activation, chrono::DateTime<chrono::Utc>)> = None;
    for activation in response.activations.items {
        if !activation.status.is_in_progress() {
            continue;
        }
        if activation.property_version != target.version
            || activation.network != target.network
            || !types.contains(&activation.activation_type)
        {
            continue;
        }

        let submitted = tools::parse_date(&activation.submit_date)?;
        let newer = match &best {
            Some((_, date)) => *date < submitted,
            None => true,
        };
        if newer {
            best = Some((activation, submitted));
        }
    }

    Ok(best.map(|(activation, _)| activation))
}

async fn version_status(
    papi: &PapiApi<'_>,
    target: &ActivationTarget,
) -> Result<Option<VersionStatus>, Diagnostic> {
    let version = papi
        .get_property_version(&target.property_id, target.version)
        .await
        .map_err(|e| api_error("Failed to get property version", &e))?;
    Ok(version.status_on(target.network).cloned())
}

/// Submits a new activation and fetches it for its initial status
async fn submit(
    papi: &PapiApi<'_>,
    target: &ActivationTarget,
    data: &DynamicValue,
    state: &mut DynamicValue,
    activation_type: ActivationType,
) -> Result<Activation, Diagnostic> {
    let contacts = tools::get_set_value("contact", data)?;
    let note = tools::get_string_value("note", data)
        .optional()?
        .unwrap_or_default();
    let acknowledge_all_warnings = data
        .get_bool(&AttributePath::new("auto_acknowledge_rule_warnings"))
        .unwrap_or(true);

    let request = CreateActivationRequest {
        property_version: target.version,
        network: target.network,
        activation_type,
        notify_emails: contacts,
        acknowledge_all_warnings,
        note,
    };

    let summary = match activation_type {
        ActivationType::Activate => "create activation failed",
        ActivationType::Deactivate => "create deactivation failed",
    };
    let created = papi
        .create_activation(&target.property_id, &request)
        .await
        .map_err(|e| api_error(summary, &e))?;
    tracing::info!(
        "Submitted {:?} {} for {} version {}",
        activation_type,
        created.activation_id,
        target.property_id,
        target.version
    );

    let fetched = papi
        .get_activation(&target.property_id, &created.activation_id)
        .await
        .map_err(|e| api_error("Failed to get activation", &e))?;
    set_errors_and_warnings(state, &fetched.errors, &fetched.warnings)?;

    Ok(fetched.activation)
}

impl PropertyActivationResource {
    async fn poll(
        &self,
        ctx: &Context,
        papi: &PapiApi<'_>,
        property_id: &str,
        mut activation: Activation,
        operation: Operation,
        state: &mut DynamicValue,
    ) -> Result<Activation, PollError> {
        // deactivations also report ACTIVE once they are fully processed
        while activation.status != ActivationStatus::Active {
            match activation.status {
                ActivationStatus::Aborted => {
                    return Err(PollError::Failed(format!("{} request aborted", operation)))
                }
                ActivationStatus::Failed => {
                    return Err(PollError::Failed(format!(
                        "{} request failed in downstream system",
                        operation
                    )))
                }
                _ => {}
            }

            tracing::debug!(
                "{} {} is {}, checking again in {:?}",
                operation,
                activation.activation_id,
                activation.status.as_str(),
                self.poll.effective_interval()
            );

            tokio::select! {
                _ = tokio::time::sleep(self.poll.effective_interval()) => {
                    let fetched = papi
                        .get_activation(property_id, &activation.activation_id)
                        .await
                        .map_err(PollError::Api)?;
                    set_errors_and_warnings(state, &fetched.errors, &fetched.warnings)
                        .map_err(PollError::State)?;
                    activation = fetched.activation;
                }
                reason = ctx.cancelled() => {
                    return Err(PollError::Interrupted { reason, activation });
                }
            }
        }

        Ok(activation)
    }

    /// Shared by create and update; `prior` is set for updates
    async fn activate(
        &self,
        ctx: &Context,
        client: &Client,
        config: &DynamicValue,
        state: &mut DynamicValue,
        prior: Option<&DynamicValue>,
    ) -> Vec<Diagnostic> {
        let timeout = match operation_timeout(state) {
            Ok(timeout) => timeout,
            Err(diag) => return vec![diag],
        };
        let ctx = ctx.with_timeout(timeout);
        tracing::debug!("activation with deadline in {:?}", timeout);

        let papi = client.papi();
        let target = match resolve_target(state, &papi).await {
            Ok(target) => target,
            Err(diag) => return vec![diag],
        };

        let rules = match papi
            .get_rule_tree(&target.property_id, target.version, true)
            .await
        {
            Ok(rules) => rules,
            Err(e) => return vec![api_error("Failed to get rule tree", &e)],
        };
        let diagnostics = check_rule_tree(state, &rules.errors, &rules.warnings);
        if has_errors(&diagnostics) {
            return diagnostics;
        }

        let types: &[ActivationType] = if prior.is_some() {
            &[ActivationType::Activate]
        } else {
            &[ActivationType::Activate, ActivationType::Deactivate]
        };
        let existing = match lookup_activation(&papi, &target, types).await {
            Ok(existing) => existing,
            Err(diag) => return vec![diag],
        };

        let needs_activation = match (&existing, prior) {
            (None, _) => true,
            (Some(a), None) => a.activation_type == ActivationType::Deactivate,
            (Some(_), Some(_)) => match version_status(&papi, &target).await {
                Ok(status) => status == Some(VersionStatus::Deactivated),
                Err(diag) => return vec![diag],
            },
        };

        let activation = match existing {
            Some(activation) if !needs_activation => {
                let note = AttributePath::new("note");
                if let Some(prior) = prior {
                    if prior.get(&note) != state.get(&note) {
                        return vec![Diagnostic::error(
                            "Invalid update",
                            "cannot update activation attribute note after creation",
                        )
                        .with_attribute(note)];
                    }
                }
                tracing::debug!(
                    "Reusing activation {} for {} version {}",
                    activation.activation_id,
                    target.property_id,
                    target.version
                );
                activation
            }
            _ => {
                match submit(&papi, &target, config, state, ActivationType::Activate).await {
                    Ok(activation) => activation,
                    Err(diag) => return vec![diag],
                }
            }
        };

        if let Err(e) = tools::set_value(
            state,
            "activation_id",
            Dynamic::String(activation.activation_id.clone()),
        ) {
            return vec![e.into()];
        }

        let mut diagnostics = diagnostics;
        let activation = match self
            .poll(
                &ctx,
                &papi,
                &target.property_id,
                activation,
                Operation::Activation,
                state,
            )
            .await
        {
            Ok(activation) => activation,
            Err(PollError::Interrupted { reason, .. }) if prior.is_some() => {
                return vec![Diagnostic::error(
                    "Activation interrupted",
                    format!("activation context terminated: {}", reason),
                )]
            }
            Err(PollError::Interrupted { reason, activation }) => {
                let (summary, verb) = match reason {
                    ContextError::DeadlineExceeded => ("Activation timeout", "Timed out waiting"),
                    ContextError::Canceled => ("Activation canceled", "Stopped waiting"),
                };
                diagnostics.push(Diagnostic::warning(
                    summary,
                    format!(
                        "{} for activation {} to complete, last status {}",
                        verb,
                        activation.activation_id,
                        activation.status.as_str()
                    ),
                ));
                activation
            }
            Err(PollError::Failed(message)) => {
                return vec![Diagnostic::error("Activation failed", message)]
            }
            Err(PollError::Api(e)) => return vec![api_error("Failed to get activation", &e)],
            Err(PollError::State(e)) => return vec![e.into()],
        };

        if let Err(e) = finish_state(state, &target, &activation, prior) {
            diagnostics.push(e.into());
        }
        diagnostics
    }

    async fn deactivate(&self, ctx: &Context, client: &Client, prior: &DynamicValue) -> Vec<Diagnostic> {
        let timeout = match operation_timeout(prior) {
            Ok(timeout) => timeout,
            Err(diag) => return vec![diag],
        };
        let ctx = ctx.with_timeout(timeout);

        let papi = client.papi();
        let target = match resolve_target(prior, &papi).await {
            Ok(target) => target,
            Err(diag) => return vec![diag],
        };

        let existing = match lookup_activation(
            &papi,
            &target,
            &[ActivationType::Deactivate, ActivationType::Activate],
        )
        .await
        {
            Ok(existing) => existing,
            Err(diag) => return vec![diag],
        };

        let mut scratch = prior.clone();
        let activation = match existing {
            Some(activation) if activation.activation_type == ActivationType::Deactivate => {
                activation
            }
            _ => match submit(&papi, &target, prior, &mut scratch, ActivationType::Deactivate).await
            {
                Ok(activation) => activation,
                Err(diag) => return vec![diag],
            },
        };

        match self
            .poll(
                &ctx,
                &papi,
                &target.property_id,
                activation,
                Operation::Deactivation,
                &mut scratch,
            )
            .await
        {
            Ok(_) => vec![],
            Err(PollError::Interrupted { reason, .. }) => vec![Diagnostic::error(
                "Deactivation interrupted",
                format!("activation context terminated: {}", reason),
            )],
            Err(PollError::Failed(message)) => {
                vec![Diagnostic::error("Deactivation failed", message)]
            }
            Err(PollError::Api(e)) => vec![api_error("Failed to get activation", &e)],
            Err(PollError::State(e)) => vec![e.into()],
        }
    }

    async fn read_activation(&self, client: &Client, state: &mut DynamicValue) -> Result<bool, Diagnostic> {
        let papi = client.papi();
        let target = resolve_target(state, &papi).await?;

        let response = match papi.get_activations(&target.property_id).await {
            Ok(response) => response,
            Err(ApiError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(api_error("failed to get activations for property", &e)),
        };

        set_errors_and_warnings(state, &response.errors, &response.warnings)?;

        let matching = response
            .activations
            .items
            .into_iter()
            .find(|a| a.network == target.network && a.property_version == target.version);
        if let Some(activation) = matching {
            tracing::debug!(
                "Found existing activation {} version {}",
                target.network,
                target.version
            );
            tools::set_value(
                state,
                "status",
                Dynamic::String(activation.status.as_str().to_string()),
            )?;
            tools::set_value(
                state,
                "activation_id",
                Dynamic::String(activation.activation_id),
            )?;
            tools::set_value(state, "id", Dynamic::String(target.resource_id()))?;
        }

        Ok(true)
    }
}

/// Writes the final status and ID, and resolves anything still unknown
fn finish_state(
    state: &mut DynamicValue,
    target: &ActivationTarget,
    activation: &Activation,
    prior: Option<&DynamicValue>,
) -> Result<(), ToolsError> {
    tools::set_value(
        state,
        "status",
        Dynamic::String(activation.status.as_str().to_string()),
    )?;
    tools::set_value(state, "id", Dynamic::String(target.resource_id()))?;

    if state
        .get(&AttributePath::new("property_id"))
        .is_some_and(Dynamic::is_unknown)
    {
        tools::set_value(
            state,
            "property_id",
            Dynamic::String(target.property_id.clone()),
        )?;
    }
    // a reused activation reports nothing new
    if let Some(prior) = prior {
        for name in ["errors", "warnings"] {
            let path = AttributePath::new(name);
            if state.get(&path).is_some_and(Dynamic::is_unknown) {
                let value = prior.get(&path).cloned().unwrap_or(Dynamic::Null);
                tools::set_value(state, name, value)?;
            }
        }
    }
    for list in ["rule_errors", "rule_warnings"] {
        if state
            .get(&AttributePath::new(list))
            .is_some_and(Dynamic::is_unknown)
        {
            tools::set_value(state, list, Dynamic::List(vec![]))?;
        }
    }
    tools::unknowns_to_null(state);
    Ok(())
}

#[async_trait]
impl Resource for PropertyActivationResource {
    fn type_name(&self) -> &str {
        "akamai_property_activation"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Activates a property version on the staging or production network")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Property ID and network, e.g. prp_173136:STAGING")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("property", AttributeType::String)
                    .optional()
                    .computed()
                    .deprecated("The setting \"property\" has been deprecated. Use \"property_id\" instead.")
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("property_id", AttributeType::String)
                    .description("Property to activate, with or without the prp_ prefix")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("activation_id", AttributeType::String)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("errors", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("warnings", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("rule_errors", papi_error_attribute_type())
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("rule_warnings", papi_error_attribute_type())
                    .optional()
                    .computed()
                    .deprecated("Rule warnings will not be set in state anymore")
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("auto_acknowledge_rule_warnings", AttributeType::Bool)
                    .description("automatically acknowledge all rule warnings for activation to continue. default is true")
                    .optional()
                    .computed()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("version", AttributeType::Number)
                    .description("Property version to activate")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("network", AttributeType::String)
                    .description("STAGING or PRODUCTION; STAG, S, PROD and P are accepted too")
                    .optional()
                    .computed()
                    .default(StaticDefault::string("STAGING"))
                    .validator(StringOneOf::ignore_case(&[
                        "STAGING",
                        "STAG",
                        "S",
                        "PRODUCTION",
                        "PROD",
                        "P",
                    ]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("contact", AttributeType::Set(Box::new(AttributeType::String)))
                    .description("Email addresses notified about the activation")
                    .required()
                    .validator(ListLengthValidator::not_empty())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("note", AttributeType::String)
                    .description("assigns a log message to the activation request")
                    .optional()
                    .build(),
            )
            .block(timeouts_block())
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];

        let set = |name: &str| match request.config.get(&AttributePath::new(name)) {
            None | Some(Dynamic::Null) => Some(false),
            Some(Dynamic::Unknown) => None,
            Some(_) => Some(true),
        };
        if let (Some(property), Some(property_id)) = (set("property"), set("property_id")) {
            if property == property_id {
                diagnostics.push(Diagnostic::error(
                    "Invalid combination of arguments",
                    "exactly one of \"property_id\" or \"property\" must be specified",
                ));
            }
        }

        if let Err(diag) = operation_timeout(&request.config) {
            diagnostics.push(diag);
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut new_state = request.planned_state;

        let diagnostics = match &self.provider_data {
            Some(data) => {
                self.activate(&ctx, &data.papi, &request.config, &mut new_state, None)
                    .instrument(tracing::info_span!("PAPI", operation = "resourcePropertyActivationCreate"))
                    .await
            }
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
            .read_activation(&data.papi, &mut new_state)
            .instrument(tracing::info_span!("PAPI", operation = "resourcePropertyActivationRead"))
            .await
        {
            Ok(true) => ReadResourceResponse {
                new_state: Some(new_state),
                diagnostics: vec![],
                private: request.private,
            },
            Ok(false) => ReadResourceResponse {
                new_state: None,
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

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };

        let mut new_state = request.planned_state.clone();
        let diagnostics = self
            .activate(
                &ctx,
                &data.papi,
                &request.config,
                &mut new_state,
                Some(&request.prior_state),
            )
            .instrument(tracing::info_span!("PAPI", operation = "resourcePropertyActivationUpdate"))
            .await;

        let new_state = if has_errors(&diagnostics) {
            request.prior_state
        } else {
            new_state
        };

        UpdateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let diagnostics = match &self.provider_data {
            Some(data) => {
                self.deactivate(&ctx, &data.papi, &request.prior_state)
                    .instrument(tracing::info_span!("PAPI", operation = "resourcePropertyActivationDelete"))
                    .await
            }
            None => vec![not_configured()],
        };

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for PropertyActivationResource {
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

    fn state(pairs: Vec<(&str, Dynamic)>) -> DynamicValue {
        DynamicValue::new(Dynamic::Map(
            pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        ))
    }

    fn activation(id: &str, activation_type: ActivationType, status: ActivationStatus, submitted: &str) -> Activation {
        Activation {
            activation_id: id.to_string(),
            property_id: "prp_1".to_string(),
            property_name: "example".to_string(),
            property_version: 3,
            network: Network::Staging,
            activation_type,
            status,
            submit_date: submitted.to_string(),
            update_date: submitted.to_string(),
            note: None,
            notify_emails: vec![],
        }
    }

    #[test]
    fn property_id_falls_back_to_legacy_attribute() {
        let s = state(vec![
            ("property_id", Dynamic::Null),
            ("property", Dynamic::String("173136".into())),
        ]);
        assert_eq!(resolve_property_id(&s).unwrap(), "prp_173136");

        let s = state(vec![("property_id", Dynamic::String("prp_1".into()))]);
        assert_eq!(resolve_property_id(&s).unwrap(), "prp_1");

        assert!(resolve_property_id(&state(vec![])).unwrap_err().is_not_found());
    }

    #[test]
    fn network_defaults_to_staging() {
        assert_eq!(resolve_network(&state(vec![])).unwrap(), Network::Staging);
        assert_eq!(
            resolve_network(&state(vec![("network", Dynamic::String("prod".into()))])).unwrap(),
            Network::Production
        );
        assert!(resolve_network(&state(vec![("network", Dynamic::String("qa".into()))])).is_err());
    }

    #[test]
    fn timeouts_are_parsed() {
        assert_eq!(operation_timeout(&state(vec![])).unwrap(), DEFAULT_TIMEOUT);

        let mut timeouts = HashMap::new();
        timeouts.insert("default".to_string(), Dynamic::String("5m".into()));
        let s = state(vec![("timeouts", Dynamic::Map(timeouts))]);
        assert_eq!(operation_timeout(&s).unwrap(), Duration::from_secs(300));

        let mut timeouts = HashMap::new();
        timeouts.insert("default".to_string(), Dynamic::String("soon".into()));
        assert!(operation_timeout(&state(vec![("timeouts", Dynamic::Map(timeouts))])).is_err());
    }

    #[test]
    fn poll_interval_never_below_minimum() {
        let poll = PollConfig {
            interval: Duration::from_secs(1),
            minimum: Duration::from_secs(60),
        };
        assert_eq!(poll.effective_interval(), Duration::from_secs(60));
        assert_eq!(PollConfig::default().effective_interval(), POLL_MINIMUM);
    }

    #[test]
    fn rule_errors_are_recorded_and_fail() {
        let mut s = state(vec![("rule_errors", Dynamic::Unknown)]);
        let errors = vec![PapiError {
            error_type: "/papi/v1/errors/validation.required_behavior".into(),
            title: "Missing required behavior in default rule".into(),
            detail: "The default rule requires a cpCode behavior".into(),
            behavior_name: "cpCode".into(),
            ..PapiError::default()
        }];

        let diagnostics = check_rule_tree(&mut s, &errors, &[]);

        assert!(has_errors(&diagnostics));
        assert!(diagnostics[0]
            .detail
            .starts_with("activation cannot continue due to rule errors: [\n\t{"));
        let recorded = s.get_list(&AttributePath::new("rule_errors")).unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(
            recorded[0].as_map().unwrap().get("behavior_name"),
            Some(&Dynamic::String("cpCode".into()))
        );
    }

    #[test]
    fn rule_warnings_alone_do_not_fail() {
        let mut s = state(vec![]);
        let warnings = vec![PapiError {
            title: "Unstable rule format".into(),
            ..PapiError::default()
        }];
        assert!(check_rule_tree(&mut s, &[], &warnings).is_empty());
        assert!(s.get(&AttributePath::new("rule_errors")).is_none());
    }

    #[test]
    fn errors_are_flattened_one_per_line() {
        let errors = vec![
            PapiError {
                title: "a".into(),
                ..PapiError::default()
            },
            PapiError {
                title: "b".into(),
                ..PapiError::default()
            },
        ];
        assert_eq!(flatten_errors(&errors).lines().count(), 2);
        assert_eq!(flatten_errors(&[]), "");
    }

    #[test]
    fn finish_state_resolves_unknowns() {
        let mut s = state(vec![
            ("property_id", Dynamic::Unknown),
            ("property", Dynamic::Unknown),
            ("rule_warnings", Dynamic::Unknown),
            ("errors", Dynamic::Unknown),
            ("status", Dynamic::Unknown),
        ]);
        let target = ActivationTarget {
            property_id: "prp_1".into(),
            network: Network::Production,
            version: 3,
        };

        finish_state(
            &mut s,
            &target,
            &activation("atv_1", ActivationType::Activate, ActivationStatus::Active, "2020-10-28T15:04:05Z"),
            None,
        )
        .unwrap();

        assert!(s.value.is_fully_known());
        assert_eq!(s.get_string(&AttributePath::new("id")).unwrap(), "prp_1:PRODUCTION");
        assert_eq!(s.get_string(&AttributePath::new("property_id")).unwrap(), "prp_1");
        assert_eq!(s.get(&AttributePath::new("property")), Some(&Dynamic::Null));
        assert_eq!(s.get_list(&AttributePath::new("rule_warnings")).unwrap(), vec![]);
        assert_eq!(s.get_string(&AttributePath::new("status")).unwrap(), "ACTIVE");
    }
}

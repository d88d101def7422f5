//! gRPC service implementation of the tfplugin6 Provider protocol
//!
//! Translates protocol messages into calls on the framework's Provider and
//! Resource traits. Planning (defaults, unknown computed values, plan
//! modifiers) happens here so resources only implement CRUD.

use crate::context::Context;
use crate::proto;
use crate::proto::provider_server::Provider as ProviderService;
use crate::provider::{
    ConfigureProviderRequest, Provider, ProviderMetadataRequest, ProviderSchemaRequest,
    StopProviderRequest, ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest, ResourceSchemaRequest, ResourceWithConfigure,
    UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::{
    Attribute, Block, DefaultRequest, NestedBlock, NestingMode, PlanModifierRequest, Schema,
    StringKind,
};
use crate::types::{
    has_errors, AttributePath, AttributePathStep, ClientCapabilities, Diagnostic,
    DiagnosticSeverity, Dynamic, DynamicValue,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tonic::{Request, Response, Status};

type ProviderData = Option<Arc<dyn Any + Send + Sync>>;

/// Schemas are computed once per process and reused for every RPC
struct Schemas {
    provider: Schema,
    resources: HashMap<String, Schema>,
    diagnostics: Vec<Diagnostic>,
}

pub struct GrpcProviderServer<P: Provider> {
    provider: Arc<RwLock<P>>,
    provider_data: Arc<RwLock<ProviderData>>,
    schemas: Arc<OnceCell<Schemas>>,
    stop_ctx: Context,
}

impl<P: Provider + 'static> GrpcProviderServer<P> {
    pub fn new(provider: P) -> Self {
        Self::with_context(provider, Context::new())
    }

    /// Stopping the provider cancels `root` and everything derived from it
    pub fn with_context(provider: P, root: Context) -> Self {
        Self {
            provider: Arc::new(RwLock::new(provider)),
            provider_data: Arc::new(RwLock::new(None)),
            schemas: Arc::new(OnceCell::new()),
            stop_ctx: root,
        }
    }

    fn request_context(&self) -> Context {
        self.stop_ctx.child()
    }

    async fn schemas(&self) -> &Schemas {
        self.schemas
            .get_or_init(|| async {
                let provider = self.provider.read().await;
                let provider_schema = provider
                    .schema(self.request_context(), ProviderSchemaRequest)
                    .await;
                let mut diagnostics = provider_schema.diagnostics;

                let mut resources = HashMap::new();
                for (type_name, factory) in provider.resources() {
                    let resource = factory();
                    let response = resource
                        .schema(self.request_context(), ResourceSchemaRequest)
                        .await;
                    diagnostics.extend(response.diagnostics);
                    resources.insert(type_name, response.schema);
                }

                Schemas {
                    provider: provider_schema.schema,
                    resources,
                    diagnostics,
                }
            })
            .await
    }

    async fn resource_schema(&self, type_name: &str) -> Result<&Schema, Vec<Diagnostic>> {
        self.schemas()
            .await
            .resources
            .get(type_name)
            .ok_or_else(|| vec![unknown_resource(type_name)])
    }

    /// New resource instance, configured with the provider data
    async fn resource(
        &self,
        type_name: &str,
    ) -> Result<Box<dyn ResourceWithConfigure>, Vec<Diagnostic>> {
        let mut resource = self.unconfigured_resource(type_name).await?;

        let provider_data = self.provider_data.read().await.clone();
        let response = resource
            .configure(
                self.request_context(),
                ConfigureResourceRequest { provider_data },
            )
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }

        Ok(resource)
    }

    async fn unconfigured_resource(
        &self,
        type_name: &str,
    ) -> Result<Box<dyn ResourceWithConfigure>, Vec<Diagnostic>> {
        let provider = self.provider.read().await;
        let factories = provider.resources();
        match factories.get(type_name) {
            Some(factory) => Ok(factory()),
            None => Err(vec![unknown_resource(type_name)]),
        }
    }
}

fn unknown_resource(type_name: &str) -> Diagnostic {
    Diagnostic::error(
        "Resource type not found",
        format!("The provider does not support resource type {:?}", type_name),
    )
}

#[tonic::async_trait]
impl<P: Provider + 'static> ProviderService for GrpcProviderServer<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> std::result::Result<Response<proto::get_metadata::Response>, Status> {
        let metadata = self
            .provider
            .read()
            .await
            .metadata(self.request_context(), ProviderMetadataRequest)
            .await;
        let schemas = self.schemas().await;

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities_to_proto(
                &metadata.server_capabilities,
            )),
            diagnostics: diagnostics_to_proto(&schemas.diagnostics),
            data_sources: vec![],
            resources: schemas
                .resources
                .keys()
                .map(|type_name| proto::get_metadata::ResourceMetadata {
                    type_name: type_name.clone(),
                })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> std::result::Result<Response<proto::get_provider_schema::Response>, Status> {
        let metadata = self
            .provider
            .read()
            .await
            .metadata(self.request_context(), ProviderMetadataRequest)
            .await;
        let schemas = self.schemas().await;

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(schema_to_proto(&schemas.provider)),
            resource_schemas: schemas
                .resources
                .iter()
                .map(|(name, schema)| (name.clone(), schema_to_proto(schema)))
                .collect(),
            data_source_schemas: HashMap::new(),
            diagnostics: diagnostics_to_proto(&schemas.diagnostics),
            provider_meta: None,
            server_capabilities: Some(server_capabilities_to_proto(
                &metadata.server_capabilities,
            )),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> std::result::Result<Response<proto::validate_provider_config::Response>, Status> {
        let req = request.into_inner();
        let config = decode_dynamic_value(req.config.as_ref())?;

        let mut diagnostics = self.schemas().await.provider.validate(&config);
        let response = self
            .provider
            .read()
            .await
            .validate(
                self.request_context(),
                ValidateProviderConfigRequest { config },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        let config = decode_dynamic_value(req.config.as_ref())?;

        let mut diagnostics = match self.resource_schema(&req.type_name).await {
            Ok(schema) => schema.validate(&config),
            Err(diags) => {
                return Ok(Response::new(proto::validate_resource_config::Response {
                    diagnostics: diagnostics_to_proto(&diags),
                }))
            }
        };

        // Validation runs before ConfigureProvider, so the resource has no provider data
        match self.unconfigured_resource(&req.type_name).await {
            Ok(resource) => {
                let response = resource
                    .validate(
                        self.request_context(),
                        ValidateResourceConfigRequest {
                            type_name: req.type_name.clone(),
                            config,
                            client_capabilities: client_capabilities_from_proto(
                                req.client_capabilities.as_ref(),
                            ),
                        },
                    )
                    .await;
                diagnostics.extend(response.diagnostics);
            }
            Err(diags) => diagnostics.extend(diags),
        }

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_data_resource_config::Response>, Status>
    {
        let req = request.into_inner();
        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: diagnostics_to_proto(&[unknown_data_source(&req.type_name)]),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> std::result::Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();
        tracing::debug!(
            "UpgradeResourceState for {} from version {}",
            req.type_name,
            req.version
        );

        let schema = match self.resource_schema(&req.type_name).await {
            Ok(schema) => schema,
            Err(diags) => {
                return Ok(Response::new(proto::upgrade_resource_state::Response {
                    upgraded_state: None,
                    diagnostics: diagnostics_to_proto(&diags),
                }))
            }
        };

        let raw_state = req.raw_state.unwrap_or_default();
        let mut diagnostics = vec![];
        if req.version > schema.version {
            diagnostics.push(Diagnostic::error(
                "Unable to upgrade resource state",
                format!(
                    "state version {} is newer than the provider's schema version {}",
                    req.version, schema.version
                ),
            ));
        } else if raw_state.json.is_empty() && !raw_state.flatmap.is_empty() {
            diagnostics.push(Diagnostic::error(
                "Unable to upgrade resource state",
                "flatmap state from Terraform 0.11 and earlier is not supported",
            ));
        }
        if has_errors(&diagnostics) {
            return Ok(Response::new(proto::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: diagnostics_to_proto(&diagnostics),
            }));
        }

        let mut state = DynamicValue::decode_json(&raw_state.json)?;
        schema.conform(&mut state);

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(encode_dynamic_value(&state)?),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> std::result::Result<Response<proto::configure_provider::Response>, Status> {
        let req = request.into_inner();
        let config = decode_dynamic_value(req.config.as_ref())?;
        tracing::debug!(
            "ConfigureProvider called by Terraform {}",
            req.terraform_version
        );

        let response = self
            .provider
            .write()
            .await
            .configure(
                self.request_context(),
                ConfigureProviderRequest {
                    terraform_version: req.terraform_version,
                    config,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;

        if !has_errors(&response.diagnostics) {
            *self.provider_data.write().await = response.provider_data;
        }

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: diagnostics_to_proto(&response.diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> std::result::Result<Response<proto::read_resource::Response>, Status> {
        let req = request.into_inner();
        let current_state = decode_dynamic_value(req.current_state.as_ref())?;

        if current_state.is_null() {
            return Ok(Response::new(proto::read_resource::Response {
                new_state: Some(encode_dynamic_value(&current_state)?),
                diagnostics: vec![],
                private: req.private,
                deferred: None,
            }));
        }

        let (resource, schema) = match self.configured(&req.type_name).await {
            Ok(pair) => pair,
            Err(diags) => {
                return Ok(Response::new(proto::read_resource::Response {
                    new_state: req.current_state,
                    diagnostics: diagnostics_to_proto(&diags),
                    private: req.private,
                    deferred: None,
                }))
            }
        };

        let response = resource
            .read(
                self.request_context(),
                ReadResourceRequest {
                    type_name: req.type_name,
                    current_state,
                    private: req.private,
                    provider_meta: optional_dynamic_value(req.provider_meta.as_ref())?,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;

        let mut new_state = response.new_state.unwrap_or_else(DynamicValue::null);
        schema.conform(&mut new_state);

        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            diagnostics: diagnostics_to_proto(&response.diagnostics),
            private: response.private,
            deferred: None,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> std::result::Result<Response<proto::plan_resource_change::Response>, Status> {
        let req = request.into_inner();

        let schema = match self.resource_schema(&req.type_name).await {
            Ok(schema) => schema,
            Err(diags) => {
                return Ok(Response::new(proto::plan_resource_change::Response {
                    planned_state: None,
                    requires_replace: vec![],
                    planned_private: vec![],
                    diagnostics: diagnostics_to_proto(&diags),
                    legacy_type_system: false,
                    deferred: None,
                }))
            }
        };

        let prior_state = decode_dynamic_value(req.prior_state.as_ref())?;
        let proposed_new_state = decode_dynamic_value(req.proposed_new_state.as_ref())?;
        let config = decode_dynamic_value(req.config.as_ref())?;

        let plan = plan_resource_change(schema, &prior_state, &proposed_new_state, &config);

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_dynamic_value(&plan.planned_state)?),
            requires_replace: plan.requires_replace.iter().map(path_to_proto).collect(),
            planned_private: req.prior_private,
            diagnostics: diagnostics_to_proto(&plan.diagnostics),
            legacy_type_system: false,
            deferred: None,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> std::result::Result<Response<proto::apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        let prior_state = decode_dynamic_value(req.prior_state.as_ref())?;
        let planned_state = decode_dynamic_value(req.planned_state.as_ref())?;
        let config = decode_dynamic_value(req.config.as_ref())?;
        let provider_meta = optional_dynamic_value(req.provider_meta.as_ref())?;

        let (resource, schema) = match self.configured(&req.type_name).await {
            Ok(pair) => pair,
            Err(diags) => {
                return Ok(Response::new(proto::apply_resource_change::Response {
                    new_state: req.prior_state,
                    private: vec![],
                    diagnostics: diagnostics_to_proto(&diags),
                    legacy_type_system: false,
                }))
            }
        };

        let ctx = self.request_context();
        let (mut new_state, private, diagnostics) = if prior_state.is_null() {
            tracing::debug!("ApplyResourceChange: create {}", req.type_name);
            let response = resource
                .create(
                    ctx,
                    CreateResourceRequest {
                        type_name: req.type_name.clone(),
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            // a failed create without a usable object leaves nothing in state
            let new_state = if has_errors(&response.diagnostics)
                && !response.new_state.value.is_fully_known()
            {
                DynamicValue::null()
            } else {
                response.new_state
            };
            (new_state, response.private, response.diagnostics)
        } else if planned_state.is_null() {
            tracing::debug!("ApplyResourceChange: delete {}", req.type_name);
            let response = resource
                .delete(
                    ctx,
                    DeleteResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state: prior_state.clone(),
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            let new_state = if has_errors(&response.diagnostics) {
                prior_state
            } else {
                DynamicValue::null()
            };
            (new_state, vec![], response.diagnostics)
        } else {
            tracing::debug!("ApplyResourceChange: update {}", req.type_name);
            let response = resource
                .update(
                    ctx,
                    UpdateResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state,
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            (response.new_state, response.private, response.diagnostics)
        };

        schema.conform(&mut new_state);

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            private,
            diagnostics: diagnostics_to_proto(&diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> std::result::Result<Response<proto::import_resource_state::Response>, Status> {
        let req = request.into_inner();

        let (resource, schema) = match self.configured(&req.type_name).await {
            Ok(pair) => pair,
            Err(diags) => {
                return Ok(Response::new(proto::import_resource_state::Response {
                    imported_resources: vec![],
                    diagnostics: diagnostics_to_proto(&diags),
                    deferred: None,
                }))
            }
        };

        let response = resource
            .import_state(
                self.request_context(),
                ImportResourceStateRequest {
                    type_name: req.type_name,
                    id: req.id,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;

        let mut imported_resources = Vec::with_capacity(response.imported_resources.len());
        for imported in response.imported_resources {
            let mut state = imported.state;
            schema.conform(&mut state);
            imported_resources.push(proto::import_resource_state::ImportedResource {
                type_name: imported.type_name,
                state: Some(encode_dynamic_value(&state)?),
                private: imported.private,
            });
        }

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: diagnostics_to_proto(&response.diagnostics),
            deferred: None,
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> std::result::Result<Response<proto::read_data_source::Response>, Status> {
        let req = request.into_inner();
        Ok(Response::new(proto::read_data_source::Response {
            state: None,
            diagnostics: diagnostics_to_proto(&[unknown_data_source(&req.type_name)]),
            deferred: None,
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> std::result::Result<Response<proto::stop_provider::Response>, Status> {
        tracing::info!("StopProvider: cancelling in-flight operations");
        self.stop_ctx.cancel();

        let response = self
            .provider
            .read()
            .await
            .stop(Context::new(), StopProviderRequest)
            .await;

        Ok(Response::new(proto::stop_provider::Response {
            error: response.error.unwrap_or_default(),
        }))
    }
}

impl<P: Provider + 'static> GrpcProviderServer<P> {
    async fn configured(
        &self,
        type_name: &str,
    ) -> Result<(Box<dyn ResourceWithConfigure>, &Schema), Vec<Diagnostic>> {
        let schema = self.resource_schema(type_name).await?;
        let resource = self.resource(type_name).await?;
        Ok((resource, schema))
    }
}

fn unknown_data_source(type_name: &str) -> Diagnostic {
    Diagnostic::error(
        "Data source type not found",
        format!(
            "The provider does not support data source type {:?}",
            type_name
        ),
    )
}

/// Outcome of planning a single resource instance
pub struct PlannedChange {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Plan a resource change the way terraform-plugin-framework does:
/// 1. destroy plans stay null
/// 2. schema defaults fill attributes whose configuration is null
/// 3. computed attributes without configuration become unknown on create,
///    and on update when anything in the resource changes
/// 4. attribute plan modifiers run last
pub fn plan_resource_change(
    schema: &Schema,
    prior_state: &DynamicValue,
    proposed_new_state: &DynamicValue,
    config: &DynamicValue,
) -> PlannedChange {
    let mut plan = PlannedChange {
        planned_state: proposed_new_state.clone(),
        requires_replace: vec![],
        diagnostics: vec![],
    };

    if proposed_new_state.is_null() {
        return plan;
    }
    schema.conform(&mut plan.planned_state);

    let attributes = &schema.block.attributes;
    let config_value = |attr: &Attribute| -> Dynamic {
        config
            .get(&AttributePath::new(&attr.name))
            .cloned()
            .unwrap_or(Dynamic::Null)
    };

    for attr in attributes {
        if let Some(default) = &attr.default {
            if config_value(attr).is_null() {
                let path = AttributePath::new(&attr.name);
                let value = default.default_value(DefaultRequest { path: path.clone() });
                if let Err(e) = plan.planned_state.set(&path, value.value.value) {
                    plan.diagnostics
                        .push(Diagnostic::error("Failed to apply default", e.to_string()));
                }
            }
        }
    }

    let is_create = prior_state.is_null();
    let changed = is_create
        || !crate::plan_modifier::values_equal(&plan.planned_state.value, &prior_state.value);

    if changed {
        for attr in attributes {
            if attr.computed && attr.default.is_none() && config_value(attr).is_null() {
                let _ = plan
                    .planned_state
                    .mark_unknown(&AttributePath::new(&attr.name));
            }
        }
    }

    for attr in attributes {
        if attr.plan_modifiers.is_empty() {
            continue;
        }
        let path = AttributePath::new(&attr.name);
        let state_value = prior_state.get(&path).cloned().unwrap_or(Dynamic::Null);
        let mut plan_value = plan
            .planned_state
            .get(&path)
            .cloned()
            .unwrap_or(Dynamic::Null);

        for modifier in &attr.plan_modifiers {
            let response = modifier.modify(PlanModifierRequest {
                config_value: DynamicValue::new(config_value(attr)),
                state_value: DynamicValue::new(state_value.clone()),
                plan_value: DynamicValue::new(plan_value),
                path: path.clone(),
            });
            plan_value = response.plan_value.value;
            if response.requires_replace && !plan.requires_replace.contains(&path) {
                plan.requires_replace.push(path.clone());
            }
            plan.diagnostics.extend(response.diagnostics);
        }

        let _ = plan.planned_state.set(&path, plan_value);
    }

    schema.conform(&mut plan.planned_state);
    plan
}

// Helper functions

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> proto::schema::Block {
    proto::schema::Block {
        version: block.version,
        attributes: block.attributes.iter().map(attribute_to_proto).collect(),
        block_types: block.block_types.iter().map(nested_block_to_proto).collect(),
        description: block.description.clone(),
        description_kind: string_kind_to_proto(block.description_kind) as i32,
        deprecated: block.deprecated,
    }
}

fn attribute_to_proto(attr: &Attribute) -> proto::schema::Attribute {
    proto::schema::Attribute {
        name: attr.name.clone(),
        r#type: attr.r#type.to_bytes(),
        nested_type: None,
        description: attr.description.clone(),
        required: attr.required,
        optional: attr.optional,
        computed: attr.computed,
        sensitive: attr.sensitive,
        description_kind: proto::StringKind::Plain as i32,
        deprecated: attr.deprecated,
        write_only: false,
    }
}

fn nested_block_to_proto(nested: &NestedBlock) -> proto::schema::NestedBlock {
    use proto::schema::nested_block::NestingMode as ProtoNesting;

    let nesting = match nested.nesting {
        NestingMode::Invalid => ProtoNesting::Invalid,
        NestingMode::Single => ProtoNesting::Single,
        NestingMode::List => ProtoNesting::List,
        NestingMode::Set => ProtoNesting::Set,
        NestingMode::Map => ProtoNesting::Map,
        NestingMode::Group => ProtoNesting::Group,
    };

    proto::schema::NestedBlock {
        type_name: nested.type_name.clone(),
        block: Some(block_to_proto(&nested.block)),
        nesting: nesting as i32,
        min_items: nested.min_items,
        max_items: nested.max_items,
    }
}

fn string_kind_to_proto(kind: StringKind) -> proto::StringKind {
    match kind {
        StringKind::Plain => proto::StringKind::Plain,
        StringKind::Markdown => proto::StringKind::Markdown,
    }
}

fn server_capabilities_to_proto(
    caps: &crate::types::ServerCapabilities,
) -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: caps.plan_destroy,
        get_provider_schema_optional: caps.get_provider_schema_optional,
        move_resource_state: caps.move_resource_state,
    }
}

fn client_capabilities_from_proto(caps: Option<&proto::ClientCapabilities>) -> ClientCapabilities {
    caps.map(|c| ClientCapabilities {
        deferral_allowed: c.deferral_allowed,
        write_only_attributes_allowed: c.write_only_attributes_allowed,
    })
    .unwrap_or_default()
}

fn diagnostics_to_proto(diagnostics: &[Diagnostic]) -> Vec<proto::Diagnostic> {
    diagnostics
        .iter()
        .map(|d| proto::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid,
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
            } as i32,
            summary: d.summary.clone(),
            detail: d.detail.clone(),
            attribute: d.attribute.as_ref().map(path_to_proto),
        })
        .collect()
}

fn path_to_proto(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::step::Selector;

    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| proto::attribute_path::Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}

#[allow(clippy::result_large_err)]
fn decode_dynamic_value(
    value: Option<&proto::DynamicValue>,
) -> std::result::Result<DynamicValue, Status> {
    let Some(value) = value else {
        return Ok(DynamicValue::null());
    };

    if !value.msgpack.is_empty() {
        Ok(DynamicValue::decode_msgpack(&value.msgpack)?)
    } else {
        Ok(DynamicValue::decode_json(&value.json)?)
    }
}

#[allow(clippy::result_large_err)]
fn optional_dynamic_value(
    value: Option<&proto::DynamicValue>,
) -> std::result::Result<Option<DynamicValue>, Status> {
    match value {
        Some(v) => decode_dynamic_value(Some(v)).map(Some),
        None => Ok(None),
    }
}

#[allow(clippy::result_large_err)]
fn encode_dynamic_value(value: &DynamicValue) -> std::result::Result<proto::DynamicValue, Status> {
    Ok(proto::DynamicValue {
        msgpack: value.encode_msgpack()?,
        json: vec![],
    })
}

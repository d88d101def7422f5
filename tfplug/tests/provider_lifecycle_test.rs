//! End-to-end lifecycle tests through the gRPC service layer

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tfplug::context::ContextError;
use tfplug::grpc::GrpcProviderServer;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::proto::{self, ProviderService};
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::*;
use tfplug::schema::timeouts_block;
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::{import_state_passthrough_id, AttributeBuilder, AttributeType, Context, SchemaBuilder};
use tfplug::{Provider, Resource, ResourceWithConfigure};
use tonic::Request;

/// Provider data shared with every resource instance
struct JobBackend {
    finished: tokio::sync::Mutex<Vec<String>>,
}

struct JobProvider {
    backend: Arc<JobBackend>,
}

#[async_trait]
impl Provider for JobProvider {
    fn type_name(&self) -> &str {
        "jobs"
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(
                    AttributeBuilder::new("region", AttributeType::String)
                        .optional()
                        .build(),
                )
                .build(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        _request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(self.backend.clone() as Arc<dyn Any + Send + Sync>),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "jobs_job".to_string(),
            Box::new(|| Box::new(JobResource { backend: None }) as Box<dyn ResourceWithConfigure>),
        );
        factories
    }
}

struct JobResource {
    backend: Option<Arc<JobBackend>>,
}

#[async_trait]
impl Resource for JobResource {
    fn type_name(&self) -> &str {
        "jobs_job"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(
                    AttributeBuilder::new("id", AttributeType::String)
                        .computed()
                        .plan_modifier(UseStateForUnknown::create())
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("name", AttributeType::String)
                        .required()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("wait_ms", AttributeType::Number)
                        .optional()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("status", AttributeType::String)
                        .computed()
                        .build(),
                )
                .block(timeouts_block())
                .build(),
            diagnostics: vec![],
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut state = request.planned_state;
        let name = state.get_string(&AttributePath::new("name")).unwrap();
        let wait = state.get_number(&AttributePath::new("wait_ms")).unwrap_or(0.0);
        state.set_string(&AttributePath::new("id"), format!("job-{}", name)).unwrap();

        let mut diagnostics = vec![];
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(wait as u64)) => {
                state.set_string(&AttributePath::new("status"), "DONE".into()).unwrap();
                if let Some(backend) = &self.backend {
                    backend.finished.lock().await.push(name);
                }
            }
            err = ctx.cancelled() => {
                state.set_string(&AttributePath::new("status"), "RUNNING".into()).unwrap();
                let summary = match err {
                    ContextError::Canceled => "Job canceled",
                    ContextError::DeadlineExceeded => "Job timeout",
                };
                diagnostics.push(Diagnostic::warning(summary, "state saved while still running"));
            }
        }

        CreateResourceResponse {
            new_state: state,
            private: vec![],
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut state = request.current_state;
        if state.get_string(&AttributePath::new("name")).is_err() {
            let id = state.get_string(&AttributePath::new("id")).unwrap();
            let name = id.trim_start_matches("job-").to_string();
            state.set_string(&AttributePath::new("name"), name).unwrap();
            state.set_string(&AttributePath::new("status"), "DONE".into()).unwrap();
        }
        ReadResourceResponse {
            new_state: Some(state),
            diagnostics: vec![],
            private: request.private,
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut state = request.planned_state;
        state.set_string(&AttributePath::new("status"), "DONE".into()).unwrap();
        UpdateResourceResponse {
            new_state: state,
            private: vec![],
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, _request: DeleteResourceRequest) -> DeleteResourceResponse {
        DeleteResourceResponse { diagnostics: vec![] }
    }

    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_state_passthrough_id(AttributePath::new("id"), &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for JobResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];
        match request.provider_data {
            Some(data) => match data.downcast::<JobBackend>() {
                Ok(backend) => self.backend = Some(backend),
                Err(_) => diagnostics.push(Diagnostic::error("Invalid provider data", "")),
            },
            None => diagnostics.push(Diagnostic::error("No provider data", "")),
        }
        ConfigureResourceResponse { diagnostics }
    }
}

fn encode(value: &DynamicValue) -> Option<proto::DynamicValue> {
    Some(proto::DynamicValue {
        msgpack: value.encode_msgpack().unwrap(),
        json: vec![],
    })
}

fn decode(value: Option<proto::DynamicValue>) -> DynamicValue {
    DynamicValue::decode_msgpack(&value.unwrap().msgpack).unwrap()
}

fn job_config(name: &str, wait_ms: f64) -> DynamicValue {
    let mut config = DynamicValue::object();
    config.set_string(&AttributePath::new("name"), name.to_string()).unwrap();
    config.set_number(&AttributePath::new("wait_ms"), wait_ms).unwrap();
    config
}

async fn configured(root: Context) -> (GrpcProviderServer<JobProvider>, Arc<JobBackend>) {
    let backend = Arc::new(JobBackend {
        finished: tokio::sync::Mutex::new(vec![]),
    });
    let server = GrpcProviderServer::with_context(
        JobProvider {
            backend: backend.clone(),
        },
        root,
    );
    let response = server
        .configure_provider(Request::new(proto::configure_provider::Request {
            terraform_version: "1.9.0".to_string(),
            config: encode(&DynamicValue::object()),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.diagnostics.is_empty());
    (server, backend)
}

async fn plan(
    server: &GrpcProviderServer<JobProvider>,
    prior: &DynamicValue,
    config: &DynamicValue,
) -> DynamicValue {
    let mut proposed = config.clone();
    if let Some(id) = prior.get(&AttributePath::new("id")) {
        proposed.set(&AttributePath::new("id"), id.clone()).unwrap();
    }
    if let Some(status) = prior.get(&AttributePath::new("status")) {
        proposed.set(&AttributePath::new("status"), status.clone()).unwrap();
    }
    let response = server
        .plan_resource_change(Request::new(proto::plan_resource_change::Request {
            type_name: "jobs_job".to_string(),
            prior_state: encode(prior),
            proposed_new_state: encode(&proposed),
            config: encode(config),
            prior_private: vec![],
            provider_meta: None,
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    decode(response.planned_state)
}

async fn apply(
    server: &GrpcProviderServer<JobProvider>,
    prior: &DynamicValue,
    planned: &DynamicValue,
    config: &DynamicValue,
) -> proto::apply_resource_change::Response {
    server
        .apply_resource_change(Request::new(proto::apply_resource_change::Request {
            type_name: "jobs_job".to_string(),
            prior_state: encode(prior),
            planned_state: encode(planned),
            config: encode(config),
            planned_private: vec![],
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner()
}

#[tokio::test]
async fn create_update_delete_roundtrip() {
    let (server, backend) = configured(Context::new()).await;
    let config = job_config("build", 0.0);

    let planned = plan(&server, &DynamicValue::null(), &config).await;
    assert!(planned.get(&AttributePath::new("id")).unwrap().is_unknown());

    let created = apply(&server, &DynamicValue::null(), &planned, &config).await;
    assert!(created.diagnostics.is_empty());
    let state = decode(created.new_state);
    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "job-build");
    assert_eq!(backend.finished.lock().await.as_slice(), ["build".to_string()]);

    // Unchanged configuration plans no differences
    let replanned = plan(&server, &state, &config).await;
    assert_eq!(replanned, state);

    let changed = job_config("build", 5.0);
    let planned = plan(&server, &state, &changed).await;
    assert_eq!(planned.get_string(&AttributePath::new("id")).unwrap(), "job-build");
    assert!(planned.get(&AttributePath::new("status")).unwrap().is_unknown());

    let updated = apply(&server, &state, &planned, &changed).await;
    let state = decode(updated.new_state);
    assert_eq!(state.get_number(&AttributePath::new("wait_ms")).unwrap(), 5.0);

    let deleted = apply(&server, &state, &DynamicValue::null(), &DynamicValue::null()).await;
    assert!(deleted.diagnostics.is_empty());
    assert!(decode(deleted.new_state).is_null());
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_provider_interrupts_running_create() {
    let root = Context::new();
    let (server, backend) = configured(root.clone()).await;
    let server = Arc::new(server);
    let config = job_config("slow", 60_000.0);
    let planned = plan(&server, &DynamicValue::null(), &config).await;

    let apply_server = server.clone();
    let handle = tokio::spawn(async move {
        apply(&apply_server, &DynamicValue::null(), &planned, &config).await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    server
        .stop_provider(Request::new(proto::stop_provider::Request {}))
        .await
        .unwrap();

    let response = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].summary, "Job canceled");
    let state = decode(response.new_state);
    assert_eq!(state.get_string(&AttributePath::new("status")).unwrap(), "RUNNING");
    assert!(backend.finished.lock().await.is_empty());
}

#[tokio::test]
async fn import_then_read_fills_state() {
    let (server, _) = configured(Context::new()).await;

    let imported = server
        .import_resource_state(Request::new(proto::import_resource_state::Request {
            type_name: "jobs_job".to_string(),
            id: "job-nightly".to_string(),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(imported.imported_resources.len(), 1);
    let state = imported.imported_resources[0].state.clone();

    let read = server
        .read_resource(Request::new(proto::read_resource::Request {
            type_name: "jobs_job".to_string(),
            current_state: state,
            private: vec![],
            provider_meta: None,
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();

    let state = decode(read.new_state);
    assert_eq!(state.get_string(&AttributePath::new("name")).unwrap(), "nightly");
    assert_eq!(
        state.get(&AttributePath::new("timeouts")),
        Some(&Dynamic::Null)
    );
}

#[tokio::test]
async fn unknown_resource_type_is_a_diagnostic() {
    let (server, _) = configured(Context::new()).await;

    let response = server
        .read_resource(Request::new(proto::read_resource::Request {
            type_name: "jobs_missing".to_string(),
            current_state: encode(&job_config("x", 0.0)),
            private: vec![],
            provider_meta: None,
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.diagnostics[0].summary, "Resource type not found");
}

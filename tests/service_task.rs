use ruleway::{
    rules::{RuleEngine, RuleSetRegistry},
    runtime::{
        checkpoint::InMemoryCheckpointStore,
        executor::NodeExecutor,
        instance::{InstanceStatus, LogStatus, WorkflowInstance},
        service::{AdapterConfig, AdapterRegistry, HttpServiceInvoker},
        WorkflowEngine,
    },
    workflow::WorkflowDefinition,
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine(adapters: Vec<Value>, timeout: Duration) -> WorkflowEngine {
    let adapters: Vec<AdapterConfig> = serde_json::from_value(Value::Array(adapters)).unwrap();
    let executor = NodeExecutor::new(
        Arc::new(RuleSetRegistry::new()),
        Arc::new(RuleEngine::new()),
        Arc::new(AdapterRegistry::from_adapters(adapters)),
        Arc::new(HttpServiceInvoker::new()),
        timeout,
    );
    WorkflowEngine::new(executor, Arc::new(InMemoryCheckpointStore::new()), 200)
}

fn service_flow(service_data: Value) -> WorkflowDefinition {
    serde_json::from_value(json!({
        "nodes": [
            { "id": "start", "type": "start" },
            { "id": "call", "type": "serviceTask", "data": service_data },
            { "id": "end", "type": "end" }
        ],
        "edges": [
            { "id": "e1", "source": "start", "target": "call" },
            { "id": "e2", "source": "call", "target": "end" }
        ]
    }))
    .unwrap()
}

async fn run(engine: &WorkflowEngine, service_data: Value, input: Value) -> WorkflowInstance {
    engine.execute(&service_flow(service_data), input).await
}

#[tokio::test]
async fn object_response_is_merged_into_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/score"))
        .and(body_json(json!({ "applicant": "ada" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "creditScore": 710 })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(vec![json!({ "id": "bureau", "baseUrl": server.uri() })], Duration::from_secs(5));
    let instance = run(
        &engine,
        json!({ "adapterId": "bureau", "method": "POST", "path": "/score" }),
        json!({ "applicant": "ada" }),
    )
    .await;

    assert_eq!(instance.status, InstanceStatus::Completed);
    assert_eq!(instance.state, json!({ "applicant": "ada", "creditScore": 710 }));
}

#[tokio::test]
async fn response_goes_to_output_field_and_transform_runs_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/7"))
        .and(header("authorization", "Bearer secret-token"))
        .and(header("x-tenant", "acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tier": "gold" })))
        .mount(&server)
        .await;

    let engine = engine(
        vec![json!({
            "id": "crm",
            "baseUrl": format!("{}/", server.uri()),
            "auth": { "type": "bearer", "token": "secret-token" },
            "headers": { "x-tenant": "acme" }
        })],
        Duration::from_secs(5),
    );
    let instance = run(
        &engine,
        json!({
            "adapterId": "crm",
            "method": "GET",
            "path": "/customers/7",
            "outputField": "customer.profile",
            "transform": [{ "field": "tier", "value": "{{customer.profile.tier}}" }]
        }),
        json!({ "id": 7 }),
    )
    .await;

    assert_eq!(instance.status, InstanceStatus::Completed, "{:?}", instance.error);
    assert_eq!(instance.state["customer"]["profile"], json!({ "tier": "gold" }));
    assert_eq!(instance.state["tier"], json!("gold"));
}

#[tokio::test]
async fn non_success_status_fails_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let engine = engine(vec![json!({ "id": "bureau", "baseUrl": server.uri() })], Duration::from_secs(5));
    let instance = run(&engine, json!({ "adapterId": "bureau" }), json!({})).await;

    assert_eq!(instance.status, InstanceStatus::Failed);
    let error = instance.error.as_deref().unwrap();
    assert!(error.contains("503"), "{error}");
    assert_eq!(instance.logs.last().unwrap().status, LogStatus::Error);
}

#[tokio::test]
async fn malformed_response_fails_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let engine = engine(vec![json!({ "id": "bureau", "baseUrl": server.uri() })], Duration::from_secs(5));
    let instance = run(&engine, json!({ "adapterId": "bureau" }), json!({})).await;

    assert_eq!(instance.status, InstanceStatus::Failed);
    assert!(instance.error.as_deref().unwrap().contains("non-JSON"));
}

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let engine = engine(vec![json!({ "id": "slow", "baseUrl": server.uri() })], Duration::from_millis(200));
    let instance = run(&engine, json!({ "adapterId": "slow" }), json!({})).await;

    assert_eq!(instance.status, InstanceStatus::Failed);
    assert_eq!(
        instance.error.as_deref(),
        Some("service call to adapter 'slow' timed out after 200ms")
    );
}

#[tokio::test]
async fn unknown_adapter_fails_the_run() {
    let engine = engine(vec![], Duration::from_secs(5));
    let instance = run(&engine, json!({ "adapterId": "missing" }), json!({})).await;

    assert_eq!(instance.status, InstanceStatus::Failed);
    assert_eq!(instance.error.as_deref(), Some("adapter not found: missing"));
}

#[tokio::test]
async fn non_rest_adapter_is_not_called() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine(
        vec![json!({ "id": "legacy", "type": "soap", "baseUrl": server.uri() })],
        Duration::from_secs(5),
    );
    let instance = run(
        &engine,
        json!({ "adapterId": "legacy", "transform": [{ "field": "routed", "value": true }] }),
        json!({ "n": 1 }),
    )
    .await;

    assert_eq!(instance.status, InstanceStatus::Completed);
    assert_eq!(instance.state, json!({ "n": 1, "routed": true }));
}

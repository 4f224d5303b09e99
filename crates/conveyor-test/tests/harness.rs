//! End-to-end tests of the test harness against real applications.

use conveyor_core::PipelineError;
use conveyor_pipeline::CancellationToken;
use conveyor_server::{create_plugin, ApplicationCall, CallPhase, SendPhase};
use conveyor_test::{CallTrace, TestApplication, TestError};
use http::StatusCode;
use serde_json::json;

fn echo_json(application: &mut conveyor_server::Application) -> conveyor_core::PipelineResult<()> {
    application
        .call_pipeline_mut()
        .intercept(&CallPhase::CALL, |ctx| {
            Box::pin(async move {
                let call = ctx.context_mut();
                let body: serde_json::Value = call.receive().await?;
                call.respond(body).await
            })
        })
}

#[tokio::test]
async fn test_json_round_trip_through_application() {
    let app = TestApplication::build(echo_json).unwrap();

    let response = app.post("/echo").json(&json!({ "name": "Alice" })).send().await;

    response
        .assert_completed()
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "application/json")
        .assert_json_eq(&json!({ "name": "Alice" }));
}

#[tokio::test]
async fn test_unhandled_path_is_not_found() {
    let app = TestApplication::build(|_| Ok(())).unwrap();

    app.get("/nothing")
        .send()
        .await
        .assert_completed()
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_json_fails_with_cannot_transform() {
    let app = TestApplication::build(echo_json).unwrap();

    let response = app.post("/echo").text("{not json").send().await;

    response
        .assert_failed_with("cannot_transform")
        .assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_trace_records_phase_order() {
    let trace = CallTrace::new();
    let app = TestApplication::build(|application| {
        let call = application.call_pipeline_mut();
        call.intercept_shared(&CallPhase::MONITORING, trace.around("monitoring"))?;
        call.intercept_shared(&CallPhase::PLUGINS, trace.marker("plugins"))?;
        call.intercept_shared(&CallPhase::SETUP, trace.marker("setup"))?;
        application
            .send_pipeline_mut()
            .intercept_shared(&SendPhase::BEFORE, trace.marker("send"))
    })
    .unwrap();

    app.get("/").send().await.assert_status(StatusCode::NOT_FOUND);

    assert_eq!(
        trace.entries(),
        ["setup", "monitoring:before", "plugins", "send", "monitoring:after"]
    );
}

#[tokio::test]
async fn test_default_headers_reach_plugins() {
    let plugin = create_plugin("Tenant", |builder| {
        builder.on_call(|mut ctx| {
            Box::pin(async move {
                let tenant = ctx
                    .call()
                    .request()
                    .headers()
                    .get("x-tenant")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("none")
                    .to_string();
                ctx.call_mut().respond(tenant).await
            })
        });
    });
    let app = TestApplication::build(|application| {
        application.install_default(&plugin).map(|_| ())
    })
    .unwrap()
    .with_default_header("x-tenant", "acme");

    app.get("/").send().await.assert_body_eq("acme");
    app.get("/")
        .header("x-tenant", "globex")
        .send()
        .await
        .assert_body_eq("globex");
}

#[tokio::test]
async fn test_cancelled_call() {
    let app = TestApplication::build(echo_json).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let response = app.get("/").cancellation(token).send().await;

    response
        .assert_failed_with("cancelled")
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_invalid_header_is_an_error() {
    let app = TestApplication::build(|_| Ok(())).unwrap();

    let result = app.get("/").header("bad header", "x").try_send().await;

    assert!(matches!(result, Err(TestError::InvalidHeader(_))));
}

#[tokio::test]
async fn test_setup_error_is_reported() {
    let result = TestApplication::build(|application| {
        application
            .call_pipeline_mut()
            .add_phase(CallPhase::CALL)
            .map(|_| ())
    });

    assert!(matches!(
        result,
        Err(TestError::Setup(PipelineError::DuplicatePhase { .. }))
    ));
}

#[tokio::test]
async fn test_stopped_application_refuses_calls() {
    let app = TestApplication::build(echo_json).unwrap();
    assert!(app.stop().await);

    app.get("/").send().await.assert_failed_with("cancelled");
}

#[test]
fn test_marker_is_usable_on_any_pipeline() {
    let trace = CallTrace::new();
    let mut pipeline: conveyor_pipeline::Pipeline<String, ApplicationCall> =
        conveyor_pipeline::PipelineBuilder::new()
            .phase(conveyor_core::PipelinePhase::new("Only"))
            .build();

    pipeline
        .intercept_shared(&conveyor_core::PipelinePhase::new("Only"), trace.marker("only"))
        .unwrap();

    assert_eq!(pipeline.interceptors_count(), 1);
    assert!(trace.is_empty());
}

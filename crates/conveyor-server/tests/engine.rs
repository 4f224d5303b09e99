//! Engine lifecycle, cancellation and concurrency tests for conveyor-server.

use bytes::Bytes;
use conveyor_config::ConveyorConfig;
use conveyor_core::{AttributeKey, PipelineError};
use conveyor_server::{
    call_handler, create_plugin, Application, ApplicationEngine, CallPhase, CallSetup,
    CallStatus, EngineState, APPLICATION_STARTED, APPLICATION_STARTING, APPLICATION_STOPPED,
    APPLICATION_STOPPING, APPLICATION_STOP_PREPARING,
};
use conveyor_pipeline::CancellationToken;
use http::StatusCode;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Helpers
// ============================================================================

const USER: AttributeKey<String> = AttributeKey::new("user");

fn application() -> Application {
    Application::with_config(ConveyorConfig::default()).unwrap()
}

fn get(path: &str) -> http::Request<Bytes> {
    http::Request::builder().uri(path).body(Bytes::new()).unwrap()
}

fn echo_path(app: &mut Application) {
    app.call_pipeline_mut()
        .intercept(&CallPhase::CALL, |ctx| {
            Box::pin(async move {
                let call = ctx.context_mut();
                let path = call.request().path().to_string();
                call.respond(path).await
            })
        })
        .unwrap();
}

fn gated(app: &mut Application, gate: Arc<Notify>) {
    app.call_pipeline_mut()
        .intercept(&CallPhase::CALL, move |ctx| {
            let gate = Arc::clone(&gate);
            Box::pin(async move {
                gate.notified().await;
                ctx.context_mut().respond("done").await
            })
        })
        .unwrap();
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_lifecycle_events_in_order() {
    let events: Arc<Mutex<Vec<&'static str>>> = Arc::default();
    let mut app = application();

    for definition in [
        APPLICATION_STARTING,
        APPLICATION_STARTED,
        APPLICATION_STOP_PREPARING,
        APPLICATION_STOPPING,
        APPLICATION_STOPPED,
    ] {
        let events = Arc::clone(&events);
        let name = definition.name();
        app.monitor_mut().subscribe(
            &definition,
            Arc::new(move |_: &Application| events.lock().push(name)),
        );
    }

    let engine = ApplicationEngine::new(app);
    assert_eq!(engine.state(), EngineState::Created);

    assert!(engine.start());
    assert!(!engine.start());
    assert_eq!(engine.state(), EngineState::Running);

    assert!(engine.stop().await);
    assert!(!engine.stop().await);
    assert_eq!(engine.state(), EngineState::Stopped);

    assert_eq!(
        *events.lock(),
        vec![
            "ApplicationStarting",
            "ApplicationStarted",
            "ApplicationStopPreparing",
            "ApplicationStopping",
            "ApplicationStopped",
        ]
    );
}

#[test]
fn test_concurrent_start_raises_events_once() {
    let starting: Arc<Mutex<usize>> = Arc::default();
    let mut app = application();
    {
        let starting = Arc::clone(&starting);
        app.monitor_mut().subscribe(
            &APPLICATION_STARTING,
            Arc::new(move |_: &Application| *starting.lock() += 1),
        );
    }
    let engine = ApplicationEngine::new(app);

    let started = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| engine.start())).collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|won| *won)
            .count()
    });

    assert_eq!(started, 1);
    assert_eq!(*starting.lock(), 1);
    assert_eq!(engine.state(), EngineState::Running);
}

#[tokio::test]
async fn test_start_after_stop_is_refused() {
    let engine = ApplicationEngine::new(application());

    assert!(engine.stop().await);
    assert!(!engine.start());
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[tokio::test]
async fn test_stopped_engine_refuses_calls() {
    let mut app = application();
    echo_path(&mut app);
    let engine = ApplicationEngine::new(app);
    engine.start();
    engine.stop().await;

    let outcome = engine.handle(get("/late")).await;

    assert!(matches!(outcome.status(), CallStatus::Failed(PipelineError::Cancelled)));
    assert_eq!(
        outcome.call().response().status(),
        Some(StatusCode::SERVICE_UNAVAILABLE)
    );
}

#[tokio::test]
async fn test_stop_waits_for_in_flight_calls() {
    let gate = Arc::new(Notify::new());
    let mut app = application();
    gated(&mut app, Arc::clone(&gate));
    let engine = Arc::new(ApplicationEngine::new(app));
    engine.start();

    let call = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.handle(get("/slow")).await }
    });
    while engine.active_calls() == 0 {
        tokio::task::yield_now().await;
    }

    let stop = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.stop().await }
    });
    tokio::task::yield_now().await;

    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(!stop.is_finished());

    gate.notify_one();

    assert!(stop.await.unwrap());
    let outcome = call.await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.into_http().body().as_ref(), b"done");
    assert_eq!(engine.active_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_gives_up_after_grace_period() {
    let gate = Arc::new(Notify::new());
    let mut app = application();
    gated(&mut app, Arc::clone(&gate));
    let engine = Arc::new(ApplicationEngine::new(app).with_grace_period(Duration::from_secs(1)));
    engine.start();

    let call = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.handle(get("/stuck")).await }
    });
    while engine.active_calls() == 0 {
        tokio::task::yield_now().await;
    }

    assert!(engine.stop().await);
    assert_eq!(engine.active_calls(), 1);

    call.abort();
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancelled_token_runs_nothing() {
    let trace: Arc<Mutex<Vec<&'static str>>> = Arc::default();
    let mut app = application();
    let handler_trace = Arc::clone(&trace);
    app.call_pipeline_mut()
        .intercept(&CallPhase::SETUP, move |_ctx| {
            let trace = Arc::clone(&handler_trace);
            Box::pin(async move {
                trace.lock().push("setup");
                Ok(())
            })
        })
        .unwrap();
    let engine = ApplicationEngine::new(app);

    let token = CancellationToken::new();
    token.cancel();
    let outcome = engine.handle_with_cancellation(get("/"), token).await;

    assert!(matches!(outcome.status().error(), Some(PipelineError::Cancelled)));
    assert!(trace.lock().is_empty());
}

#[tokio::test]
async fn test_cancel_during_call_stops_next_interceptor() {
    let reached: Arc<Mutex<bool>> = Arc::default();
    let mut app = application();

    let plugin = create_plugin("Canceller", |builder| {
        builder.on_call(|ctx| {
            Box::pin(async move {
                ctx.call().cancellation().cancel();
                Ok(())
            })
        });
    });
    app.install_default(&plugin).unwrap();

    let flag = Arc::clone(&reached);
    app.call_pipeline_mut()
        .intercept(&CallPhase::CALL, move |_ctx| {
            let flag = Arc::clone(&flag);
            Box::pin(async move {
                *flag.lock() = true;
                Ok(())
            })
        })
        .unwrap();

    let outcome = ApplicationEngine::new(app).handle(get("/")).await;

    assert!(matches!(outcome.status(), CallStatus::Failed(PipelineError::Cancelled)));
    assert_eq!(outcome.status().label(), "failed");
    assert!(!*reached.lock());
    assert_eq!(
        outcome.call().response().status(),
        Some(StatusCode::SERVICE_UNAVAILABLE)
    );
}

// ============================================================================
// Calls
// ============================================================================

#[tokio::test]
async fn test_concurrent_calls_are_isolated() {
    let mut app = application();
    echo_path(&mut app);
    let engine = Arc::new(ApplicationEngine::new(app));
    engine.start();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.handle(get(&format!("/item/{i}"))).await })
        })
        .collect();

    let mut ids = HashSet::new();
    for (i, handle) in handles.into_iter().enumerate() {
        let outcome = handle.await.unwrap();
        ids.insert(outcome.call().id());
        let response = outcome.into_http();
        assert_eq!(response.body().as_ref(), format!("/item/{i}").as_bytes());
    }

    assert_eq!(ids.len(), 16);
    assert_eq!(engine.active_calls(), 0);
}

#[tokio::test]
async fn test_call_attributes_flow_between_phases() {
    let mut app = application();

    let plugin = create_plugin("Auth", |builder| {
        builder.on(
            CallSetup,
            call_handler(|call| {
                Box::pin(async move {
                    let user = call
                        .request()
                        .headers()
                        .get("x-user")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("anonymous")
                        .to_string();
                    call.attributes_mut().put(&USER, user);
                    Ok(())
                })
            }),
        );
    });
    app.install_default(&plugin).unwrap();

    app.call_pipeline_mut()
        .intercept(&CallPhase::CALL, |ctx| {
            Box::pin(async move {
                let call = ctx.context_mut();
                let user = call.attributes().get(&USER)?.clone();
                call.respond(format!("hello {user}")).await
            })
        })
        .unwrap();

    let engine = ApplicationEngine::new(app);
    let request = http::Request::builder()
        .uri("/")
        .header("x-user", "ada")
        .body(Bytes::new())
        .unwrap();

    let named = engine.handle(request).await.into_http();
    let anonymous = engine.handle(get("/")).await.into_http();

    assert_eq!(named.body().as_ref(), b"hello ada");
    assert_eq!(anonymous.body().as_ref(), b"hello anonymous");
}

#[tokio::test]
async fn test_application_is_shared_with_calls() {
    let config = ConveyorConfig::builder()
        .application(conveyor_config::ApplicationConfig {
            name: "orders".to_string(),
            environment: "test".to_string(),
        })
        .build();
    let mut app = Application::with_config(config).unwrap();
    app.call_pipeline_mut()
        .intercept(&CallPhase::CALL, |ctx| {
            Box::pin(async move {
                let call = ctx.context_mut();
                let name = call.application().environment().name().to_string();
                call.respond(name).await
            })
        })
        .unwrap();

    let outcome = ApplicationEngine::new(app).handle(get("/")).await;

    let (call, status) = outcome.into_parts();
    assert!(matches!(status, CallStatus::Completed));
    assert_eq!(call.into_response().into_http().body().as_ref(), b"orders");
}

//! Builds a small application using only the prelude.

use conveyor::prelude::*;
use conveyor_test::TestApplication;
use http::StatusCode;

const GREETING: AttributeKey<String> = AttributeKey::new("greeting");

#[derive(Debug, Clone)]
struct GreetingConfig {
    greeting: String,
}

fn greeting_plugin() -> ApplicationPlugin<GreetingConfig> {
    create_application_plugin(
        "Greeting",
        || GreetingConfig {
            greeting: "hello".to_string(),
        },
        |builder| {
            builder.on_call(|mut ctx| {
                Box::pin(async move {
                    let greeting = ctx.plugin_config().greeting.clone();
                    ctx.call_mut().attributes_mut().put(&GREETING, greeting);
                    Ok(())
                })
            });
        },
    )
}

#[tokio::test]
async fn test_prelude_application() {
    let app = TestApplication::build(|application| {
        application.install(&greeting_plugin(), |config| config.greeting = "hi".to_string())?;
        application.install_default(&call_telemetry())?;
        application
            .call_pipeline_mut()
            .intercept(&CallPhase::CALL, |ctx| {
                Box::pin(async move {
                    let call = ctx.context_mut();
                    let greeting = call.attributes().get(&GREETING)?.clone();
                    let name: String = call.receive().await?;
                    call.respond(format!("{greeting}, {name}")).await
                })
            })
    })
    .unwrap();

    app.post("/greet")
        .text("Ada")
        .send()
        .await
        .assert_completed()
        .assert_status(StatusCode::OK)
        .assert_body_eq("hi, Ada");
}

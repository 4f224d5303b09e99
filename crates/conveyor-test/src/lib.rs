//! # Conveyor Test
//!
//! Test utilities for Conveyor applications. Calls are driven through a
//! started [`ApplicationEngine`](conveyor_server::ApplicationEngine) in
//! memory, so every phase, plugin and hook runs exactly as in production.
//!
//! ## Example
//!
//! ```ignore
//! use conveyor_server::CallPhase;
//! use conveyor_test::{CallTrace, TestApplication};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_echo() {
//!     let trace = CallTrace::new();
//!     let app = TestApplication::build(|application| {
//!         application
//!             .call_pipeline_mut()
//!             .intercept_shared(&CallPhase::PLUGINS, trace.marker("plugins"))?;
//!         application.call_pipeline_mut().intercept(&CallPhase::CALL, |ctx| {
//!             Box::pin(async move {
//!                 let call = ctx.context_mut();
//!                 let body: serde_json::Value = call.receive().await?;
//!                 call.respond(body).await
//!             })
//!         })
//!     })
//!     .unwrap();
//!
//!     app.post("/echo")
//!         .json(&json!({ "name": "Alice" }))
//!         .send()
//!         .await
//!         .assert_completed()
//!         .assert_json_eq(&json!({ "name": "Alice" }));
//!
//!     assert_eq!(trace.entries(), ["plugins"]);
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/conveyor-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;
mod trace;

pub use client::{TestApplication, TestCall};
pub use error::TestError;
pub use request::TestRequestBuilder;
pub use response::TestResponse;
pub use trace::CallTrace;

//! Default transformations installed on every application.
//!
//! - Receive `After`: raw `Bytes` into `String`, `Vec<u8>` or
//!   `serde_json::Value` when one of those was requested.
//! - Send `Render`: common response values into [`OutgoingContent`].
//! - Send `Engine`: commits the content to the call response.
//! - Call `Fallback`: responds `404 Not Found` when nothing responded.

use crate::application::Application;
use crate::content::OutgoingContent;
use crate::phases::{CallPhase, ReceivePhase, SendPhase};
use crate::value::{AnyValue, ApplicationReceiveRequest};
use bytes::Bytes;
use conveyor_core::{PipelineError, PipelineResult};
use http::StatusCode;
use tracing::trace;

pub(crate) fn install_defaults(application: &mut Application) -> PipelineResult<()> {
    application.receive_pipeline_mut().intercept_named(
        &ReceivePhase::AFTER,
        "DefaultReceiveTransform",
        |ctx| Box::pin(async move { transform_received(ctx.subject_mut()) }),
    )?;

    application.send_pipeline_mut().intercept_named(
        &SendPhase::RENDER,
        "DefaultRender",
        |ctx| {
            Box::pin(async move {
                let value = ctx.replace_subject(AnyValue::unit());
                ctx.set_subject(render(value)?);
                Ok(())
            })
        },
    )?;

    application.send_pipeline_mut().intercept_named(
        &SendPhase::ENGINE,
        "EngineWriter",
        |ctx| {
            Box::pin(async move {
                let value = ctx.replace_subject(AnyValue::unit());
                let content = match value.downcast::<OutgoingContent>() {
                    Ok(content) => content,
                    Err(other) => {
                        let type_name = other.type_name();
                        ctx.set_subject(other);
                        return Err(PipelineError::unsupported_response(type_name));
                    }
                };
                let call = ctx.context_mut();
                trace!(call_id = %call.id(), length = content.content_length(), "Committing response");
                call.response_mut().commit(content.clone())?;
                ctx.set_subject(AnyValue::new(content));
                Ok(())
            })
        },
    )?;

    application.call_pipeline_mut().intercept_named(
        &CallPhase::FALLBACK,
        "Fallback",
        |ctx| {
            Box::pin(async move {
                let call = ctx.context_mut();
                if call.response().is_committed() {
                    return Ok(());
                }
                trace!(call_id = %call.id(), "No handler responded");
                call.respond(StatusCode::NOT_FOUND).await
            })
        },
    )?;

    Ok(())
}

/// Converts a raw body into the requested type, if it is one of the
/// built-in targets. Anything else is left for the caller to reject.
fn transform_received(request: &mut ApplicationReceiveRequest) -> PipelineResult<()> {
    let requested = request.type_info;
    if requested.is::<Bytes>() {
        return Ok(());
    }
    let Some(body) = request.value.downcast_ref::<Bytes>() else {
        return Ok(());
    };

    let value = if requested.is::<String>() {
        let text = String::from_utf8(body.to_vec())
            .map_err(|_| PipelineError::cannot_transform("String: body is not valid UTF-8"))?;
        AnyValue::new(text)
    } else if requested.is::<Vec<u8>>() {
        AnyValue::new(body.to_vec())
    } else if requested.is::<serde_json::Value>() {
        let json: serde_json::Value = serde_json::from_slice(body)
            .map_err(|err| PipelineError::cannot_transform(format!("serde_json::Value: {err}")))?;
        AnyValue::new(json)
    } else {
        return Ok(());
    };

    request.value = value;
    Ok(())
}

/// Renders built-in response types into [`OutgoingContent`]. Unknown types
/// are returned unchanged.
fn render(value: AnyValue) -> PipelineResult<AnyValue> {
    if value.is::<OutgoingContent>() {
        return Ok(value);
    }
    let value = match value.downcast::<String>() {
        Ok(text) => return Ok(AnyValue::new(OutgoingContent::text(text))),
        Err(value) => value,
    };
    let value = match value.downcast::<&'static str>() {
        Ok(text) => return Ok(AnyValue::new(OutgoingContent::text(text))),
        Err(value) => value,
    };
    let value = match value.downcast::<Bytes>() {
        Ok(body) => return Ok(AnyValue::new(OutgoingContent::binary(body))),
        Err(value) => value,
    };
    let value = match value.downcast::<Vec<u8>>() {
        Ok(body) => return Ok(AnyValue::new(OutgoingContent::binary(body))),
        Err(value) => value,
    };
    let value = match value.downcast::<serde_json::Value>() {
        Ok(json) => return Ok(AnyValue::new(OutgoingContent::json(&json)?)),
        Err(value) => value,
    };
    match value.downcast::<StatusCode>() {
        Ok(status) => Ok(AnyValue::new(OutgoingContent::status_only(status))),
        Err(value) => Ok(value),
    }
}

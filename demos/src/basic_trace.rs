//! Thin driver demonstrating the OpenTracing façade end to end: start a
//! root span, start a child span from it, tag both, and inspect what the
//! reporter would have shipped to a collector.
//!
//! Analogous to the original C++ implementation's `tutorial.cc`, but
//! against an in-memory reporter instead of a live Zipkin collector so the
//! demo runs standalone.

use std::sync::Arc;

use anyhow::{Context, Result};
use zipkin_opentracing::{
    Config, SpanContext, SpanReferenceType, StartSpanOptions, TagValue, Tracer, TracerBuilder,
};
use zipkin_reporter::InMemoryTransport;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_json(
        r#"{
            "service_name": "basic-trace-demo",
            "service_address": "127.0.0.1",
            "collector_host": "localhost",
            "collector_port": 9411,
            "sample_rate": 1.0
        }"#,
    )?;

    let transport = Arc::new(InMemoryTransport::new());
    let tracer = TracerBuilder::build_with_transport(&config, transport.clone());

    let root = tracer.start_span_with_options(
        "handle-request",
        StartSpanOptions {
            tags: vec![("span.kind".to_string(), TagValue::from("server"))],
            ..Default::default()
        },
    );
    root.set_baggage_item("request-id", "demo-1");

    let root_context: Arc<dyn SpanContext> = {
        let ctx = root.context();
        let zipkin_ctx = ctx
            .as_any()
            .downcast_ref::<zipkin_opentracing::ZipkinSpanContext>()
            .context("root span always yields a ZipkinSpanContext")?;
        Arc::new(zipkin_opentracing::ZipkinSpanContext::new(
            zipkin_ctx.inner().clone(),
        ))
    };

    let child = tracer.start_span_with_options(
        "call-downstream",
        StartSpanOptions {
            references: vec![(SpanReferenceType::ChildOf, root_context)],
            tags: vec![("span.kind".to_string(), TagValue::from("client"))],
            ..Default::default()
        },
    );
    child.set_tag("peer.service", TagValue::from("downstream-svc"));
    child.finish();
    root.finish();

    tracer.close();

    for span in transport.spans() {
        tracing::info!(
            name = %span.name,
            trace_id = %span.trace_id,
            id = %span.id,
            parent_id = ?span.parent_id,
            "recorded span"
        );
    }

    Ok(())
}

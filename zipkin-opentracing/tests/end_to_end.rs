#![cfg(test)]

//! End-to-end scenarios from the spec's testable-properties section,
//! driven through the public façade against an in-memory transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use zipkin_core::AnnotationValue;
use zipkin_opentracing::{
    Config, SpanContext, SpanReferenceType, StartSpanOptions, TagValue, Tracer, TracerBuilder,
    ZipkinSpanContext,
};
use zipkin_reporter::InMemoryTransport;

fn config(sample_rate: f64) -> Config {
    Config::from_json(&format!(
        r#"{{"service_name": "svc", "collector_host": "h", "collector_port": 1,
             "sample_rate": {sample_rate}, "reporting_period": 1000}}"#
    ))
    .expect("valid config")
}

#[tokio::test]
async fn tagged_span_round_trips_with_matching_annotation_types() {
    let transport = Arc::new(InMemoryTransport::new());
    let tracer = TracerBuilder::build_with_transport(&config(1.0), transport.clone());

    let span = tracer.start_span_with_options("a", StartSpanOptions::default());
    span.set_tag("abc", TagValue::I64(123));
    span.set_tag("xyz", TagValue::Bool(true));
    span.finish();
    tracer.close();

    let spans = transport.spans();
    assert_eq!(spans.len(), 1);
    let reported = &spans[0];
    assert_eq!(reported.name, "a");
    let by_key: HashMap<_, _> = reported.binary_annotations.iter().cloned().collect();
    assert_eq!(by_key.get("abc"), Some(&AnnotationValue::I64(123)));
    assert_eq!(by_key.get("xyz"), Some(&AnnotationValue::Bool(true)));
}

#[tokio::test]
async fn child_span_links_to_parent_trace_and_span_id() {
    let transport = Arc::new(InMemoryTransport::new());
    let tracer = TracerBuilder::build_with_transport(&config(1.0), transport.clone());

    let a = tracer.start_span_with_options("a", StartSpanOptions::default());
    let a_ctx: Arc<dyn SpanContext> = {
        let zctx = a
            .context()
            .as_any()
            .downcast_ref::<ZipkinSpanContext>()
            .unwrap();
        Arc::new(ZipkinSpanContext::new(zctx.inner().clone()))
    };

    let b = tracer.start_span_with_options(
        "b",
        StartSpanOptions {
            references: vec![(SpanReferenceType::ChildOf, a_ctx)],
            ..Default::default()
        },
    );
    b.finish();
    a.finish();
    tracer.close();

    let spans = transport.spans();
    assert_eq!(spans.len(), 2);
    let a_reported = spans.iter().find(|s| s.name == "a").unwrap();
    let b_reported = spans.iter().find(|s| s.name == "b").unwrap();
    assert_eq!(b_reported.trace_id, a_reported.trace_id);
    assert_eq!(b_reported.parent_id.as_deref(), Some(a_reported.id.as_str()));
}

#[tokio::test]
async fn zero_sample_rate_reports_nothing() {
    let transport = Arc::new(InMemoryTransport::new());
    let tracer = TracerBuilder::build_with_transport(&config(0.0), transport.clone());

    for _ in 0..100 {
        let span = tracer.start_span_with_options("op", StartSpanOptions::default());
        span.finish();
    }
    tracer.close();

    assert!(transport.spans().is_empty());
}

#[tokio::test]
async fn child_inherits_parent_unsampled_decision_regardless_of_local_sampler() {
    let transport = Arc::new(InMemoryTransport::new());
    // Local sampler would sample everything, but the parent said no.
    let tracer = TracerBuilder::build_with_transport(&config(1.0), transport.clone());

    let unsampled_parent_ctx: Arc<dyn SpanContext> = Arc::new(ZipkinSpanContext::new(
        zipkin_core::SpanContext::new(zipkin_core::TraceId::from_low(42), 7, None, 0),
    ));

    let child = tracer.start_span_with_options(
        "child",
        StartSpanOptions {
            references: vec![(SpanReferenceType::ChildOf, unsampled_parent_ctx)],
            ..Default::default()
        },
    );
    child.finish();
    tracer.close();

    assert!(transport.spans().is_empty());
}

#[tokio::test]
async fn inject_then_extract_round_trips_ids_and_baggage_over_a_map_carrier() {
    let transport = Arc::new(InMemoryTransport::new());
    let tracer = TracerBuilder::build_with_transport(&config(1.0), transport);

    let span = tracer.start_span_with_options("op", StartSpanOptions::default());
    span.set_baggage_item("a", "1");

    let mut carrier: HashMap<String, String> = HashMap::new();
    tracer.inject(span.context(), &mut carrier).unwrap();

    let extracted = tracer.extract(&carrier).unwrap().expect("context present");
    let mut baggage = Vec::new();
    extracted.foreach_baggage_item(&mut |k, v| {
        baggage.push((k.to_string(), v.to_string()));
        true
    });
    assert_eq!(baggage, vec![("a".to_string(), "1".to_string())]);
    span.finish();
}

#[tokio::test]
async fn extract_with_only_trace_id_header_is_corrupted() {
    let transport = Arc::new(InMemoryTransport::new());
    let tracer = TracerBuilder::build_with_transport(&config(1.0), transport);

    let mut carrier = HashMap::new();
    carrier.insert("x-b3-traceid".to_string(), "123".to_string());
    let err = tracer.extract(&carrier).unwrap_err();
    assert!(matches!(
        err,
        zipkin_opentracing::Error::SpanContextCorrupted(_)
    ));
}

#[tokio::test]
async fn flush_with_timeout_observes_spans_reported_before_the_call() {
    let transport = Arc::new(InMemoryTransport::new());
    let config = Config::from_json(
        r#"{"service_name": "svc", "collector_host": "h", "collector_port": 1,
            "sample_rate": 1.0, "reporting_period": 3600000000, "max_buffered_spans": 100}"#,
    )
    .unwrap();
    let tracer = TracerBuilder::build_with_transport(&config, transport.clone());

    for i in 0..5 {
        let span = tracer.start_span_with_options(&format!("op-{i}"), StartSpanOptions::default());
        span.finish();
    }

    // `close()` blocks on a flush-with-timeout internally, so by the time it
    // returns the spans above are guaranteed to have reached the transport
    // even though the reporting period is set far in the future.
    tracer.close();

    assert_eq!(transport.spans().len(), 5);
}

#[tokio::test]
async fn invalid_span_context_rejected_on_inject() {
    struct ForeignContext;
    impl SpanContext for ForeignContext {
        fn foreach_baggage_item(&self, _f: &mut dyn FnMut(&str, &str) -> bool) {}
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    let transport = Arc::new(InMemoryTransport::new());
    let tracer = TracerBuilder::build_with_transport(&config(1.0), transport);

    let foreign = ForeignContext;
    let mut carrier = HashMap::new();
    let err = tracer.inject(&foreign, &mut carrier).unwrap_err();
    assert!(matches!(err, zipkin_opentracing::Error::InvalidSpanContext));
}

#[tokio::test]
async fn builder_degrades_gracefully_when_collector_is_unreachable() {
    // `build` (not `build_with_transport`) exercises the real HttpTransport
    // construction path; an http/https URL always builds successfully even
    // if the collector itself is never reachable, matching the spec's
    // "HTTP/transport errors are swallowed by the writer task" contract.
    let config = config(1.0);
    let tracer = TracerBuilder::build(&config).unwrap();
    assert!(tracer.is_some());

    let tracer = tracer.unwrap();
    let span = tracer.start_span_with_options("op", StartSpanOptions::default());
    span.finish();
    tokio::time::sleep(Duration::from_millis(50)).await;
    tracer.close();
}

//! Zipkin v1 JSON wire encoding.
//!
//! Produces the `POST /api/v1/spans` body: a JSON array of span objects,
//! each shaped like
//!
//! ```json
//! {
//!   "traceId": "...", "name": "...", "id": "...", "parentId": "...",
//!   "timestamp": 0, "duration": 0, "debug": true,
//!   "annotations": [{"timestamp":0,"value":"cs","endpoint":{...}}],
//!   "binaryAnnotations": [{"key":"...","value":..., "endpoint":{...}}]
//! }
//! ```
//!
//! Optional fields (`parentId`, `timestamp`, `duration`, `debug` when
//! false, `endpoint`) are omitted rather than emitted as `null`, matching
//! the original's `toJson` which only writes members that are set.

use serde_json::{json, Map, Value};

use crate::annotation::AnnotationValue;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::{Annotation, BinaryAnnotation, Span};

fn endpoint_to_json(endpoint: &Endpoint) -> Value {
    let mut obj = Map::new();
    obj.insert("serviceName".into(), json!(endpoint.service_name()));
    if let Some(v4) = endpoint.address().as_v4() {
        obj.insert("ipv4".into(), json!(v4.to_string()));
    }
    if let Some(v6) = endpoint.address().as_v6() {
        obj.insert("ipv6".into(), json!(v6.to_string()));
    }
    obj.insert("port".into(), json!(endpoint.address().port()));
    Value::Object(obj)
}

fn annotation_to_json(annotation: &Annotation) -> Value {
    let mut obj = Map::new();
    obj.insert("timestamp".into(), json!(annotation.timestamp));
    obj.insert("value".into(), json!(annotation.value));
    if let Some(endpoint) = &annotation.endpoint {
        obj.insert("endpoint".into(), endpoint_to_json(endpoint));
    }
    Value::Object(obj)
}

fn annotation_value_to_json(value: &AnnotationValue) -> Value {
    match value {
        AnnotationValue::Bool(b) => json!(b),
        AnnotationValue::I64(i) => json!(i),
        AnnotationValue::Double(d) => json!(d),
        AnnotationValue::Str(s) => json!(s),
    }
}

fn binary_annotation_to_json(annotation: &BinaryAnnotation) -> Value {
    let mut obj = Map::new();
    obj.insert("key".into(), json!(annotation.key));
    obj.insert("value".into(), annotation_value_to_json(&annotation.value));
    if let Some(endpoint) = &annotation.endpoint {
        obj.insert("endpoint".into(), endpoint_to_json(endpoint));
    }
    Value::Object(obj)
}

/// Encodes a single finished span as a Zipkin v1 JSON object.
pub fn span_to_json(span: &Span) -> Value {
    let mut obj = Map::new();
    obj.insert("traceId".into(), json!(span.trace_id().to_hex()));
    obj.insert("name".into(), json!(span.name()));
    obj.insert("id".into(), json!(crate::ids::span_id_to_hex(span.id())));
    if let Some(parent_id) = span.parent_id() {
        obj.insert(
            "parentId".into(),
            json!(crate::ids::span_id_to_hex(parent_id)),
        );
    }
    if let Some(timestamp) = span.timestamp() {
        obj.insert("timestamp".into(), json!(timestamp));
    }
    if let Some(duration) = span.duration() {
        obj.insert("duration".into(), json!(duration));
    }
    if span.debug() {
        obj.insert("debug".into(), json!(true));
    }
    obj.insert(
        "annotations".into(),
        Value::Array(span.annotations().iter().map(annotation_to_json).collect()),
    );
    obj.insert(
        "binaryAnnotations".into(),
        Value::Array(
            span.binary_annotations()
                .iter()
                .map(binary_annotation_to_json)
                .collect(),
        ),
    );
    Value::Object(obj)
}

/// Encodes a batch of finished spans as the JSON array body expected by
/// `POST /api/v1/spans`.
pub fn batch_to_json(spans: &[Span]) -> String {
    let array: Vec<Value> = spans.iter().map(span_to_json).collect();
    Value::Array(array).to_string()
}

/// Same as [`batch_to_json`] but surfaces serialization failure instead of
/// panicking; `serde_json::Value` construction here cannot actually fail,
/// but this mirrors the fallible `toJson` signature used elsewhere in the
/// data model for API consistency.
pub fn try_batch_to_json(spans: &[Span]) -> Result<String> {
    Ok(batch_to_json(spans))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::IpAddress;
    use crate::{Annotation, BinaryAnnotation, TraceId};

    #[test]
    fn span_to_json_omits_absent_optional_fields() {
        let span = Span::new("op");
        let value = span_to_json(&span);
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("parentId"));
        assert!(!obj.contains_key("timestamp"));
        assert!(!obj.contains_key("duration"));
        assert!(!obj.contains_key("debug"));
    }

    #[test]
    fn span_to_json_includes_hex_ids_and_annotations() {
        let mut span = Span::new("op");
        span.set_trace_id(TraceId::from_low(255));
        span.set_id(1);
        span.set_parent_id(2);
        span.set_debug(true);
        span.add_annotation(Annotation::new(1, "cs"));
        let endpoint = Endpoint::new("svc", IpAddress::parse("127.0.0.1", 9411));
        span.add_binary_annotation(BinaryAnnotation::with_endpoint(
            "http.status_code",
            200i64,
            endpoint,
        ));

        let value = span_to_json(&span);
        assert_eq!(value["traceId"], json!("00000000000000ff"));
        assert_eq!(value["parentId"], json!("0000000000000002"));
        assert_eq!(value["debug"], json!(true));
        assert_eq!(value["annotations"][0]["value"], json!("cs"));
        assert_eq!(value["binaryAnnotations"][0]["value"], json!(200));
        assert_eq!(
            value["binaryAnnotations"][0]["endpoint"]["serviceName"],
            json!("svc")
        );
    }

    #[test]
    fn batch_to_json_produces_an_array() {
        let spans = vec![Span::new("a"), Span::new("b")];
        let out = batch_to_json(&spans);
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }
}

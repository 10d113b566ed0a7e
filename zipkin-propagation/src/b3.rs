//! The B3 single-header-family text-map codec: `x-b3-traceid`,
//! `x-b3-spanid`, `x-b3-parentspanid`, `x-b3-sampled`, `x-b3-flags`, and
//! `ot-baggage-<key>` for baggage items.

use std::collections::HashMap;

use zipkin_core::{SpanContext, SpanId, TraceId};

use crate::error::{Error, Result};

/// Trace id header.
pub const TRACE_ID: &str = "x-b3-traceid";
/// Span id header.
pub const SPAN_ID: &str = "x-b3-spanid";
/// Parent span id header.
pub const PARENT_SPAN_ID: &str = "x-b3-parentspanid";
/// Sampled-decision header.
pub const SAMPLED: &str = "x-b3-sampled";
/// Debug-flag header.
pub const FLAGS: &str = "x-b3-flags";
/// Prefix for per-item baggage headers.
pub const BAGGAGE_PREFIX: &str = "ot-baggage-";

/// Writes key/value pairs into a carrier. Implemented for any text-map-like
/// sink, e.g. outgoing HTTP headers.
pub trait Writer {
    /// Sets `key` to `value`, overwriting any previous value.
    fn set(&mut self, key: &str, value: &str);
}

/// Reads key/value pairs out of a carrier. Implemented for any text-map-like
/// source, e.g. incoming HTTP headers.
pub trait Reader {
    /// Invokes `f` once per entry. Order is unspecified.
    fn for_each_entry(&self, f: &mut dyn FnMut(&str, &str));
}

impl Writer for HashMap<String, String> {
    fn set(&mut self, key: &str, value: &str) {
        self.insert(key.to_string(), value.to_string());
    }
}

impl Reader for HashMap<String, String> {
    fn for_each_entry(&self, f: &mut dyn FnMut(&str, &str)) {
        for (k, v) in self {
            f(k, v);
        }
    }
}

fn bool_to_header(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Parses a `x-b3-sampled` value per the common truthy/falsy spellings
/// (`1`/`t`/`T`/`true`/`True`/`TRUE` and `0`/`f`/`F`/`false`/`False`/`FALSE`).
fn header_to_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "True" | "TRUE" => Some(true),
        "0" | "f" | "F" | "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Writes a span context and its baggage into a carrier as B3 headers.
pub fn inject(
    context: &SpanContext,
    baggage: &HashMap<String, String>,
    writer: &mut dyn Writer,
) -> Result<()> {
    writer.set(TRACE_ID, &context.trace_id().to_hex());
    writer.set(SPAN_ID, &zipkin_core::span_id_to_hex(context.id()));
    if let Some(parent_id) = context.parent_id() {
        writer.set(PARENT_SPAN_ID, &zipkin_core::span_id_to_hex(parent_id));
    }
    match context.sampled() {
        zipkin_core::Sampled::Yes => writer.set(SAMPLED, bool_to_header(true)),
        zipkin_core::Sampled::No => writer.set(SAMPLED, bool_to_header(false)),
        zipkin_core::Sampled::Unknown => {}
    }
    if context.debug() {
        writer.set(FLAGS, "1");
    }
    for (key, value) in baggage {
        writer.set(&format!("{BAGGAGE_PREFIX}{key}"), value);
    }
    Ok(())
}

/// The result of a successful extract: the reconstructed context (absent
/// when the carrier held no B3 headers at all) plus any baggage items
/// found.
pub struct Extracted {
    /// The reconstructed span context, or `None` if the carrier had
    /// neither a trace id nor a span id header.
    pub context: Option<SpanContext>,
    /// Baggage items read from `ot-baggage-*` headers.
    pub baggage: HashMap<String, String>,
}

/// Reads a span context and baggage items out of a carrier's B3 headers.
///
/// Returns `Ok(Extracted { context: None, .. })` when neither
/// `x-b3-traceid` nor `x-b3-spanid` is present. Returns
/// [`Error::SpanContextCorrupted`] if exactly one of that pair is present,
/// or if a present header fails to parse.
pub fn extract(reader: &dyn Reader) -> Result<Extracted> {
    let mut trace_id: Option<String> = None;
    let mut span_id: Option<String> = None;
    let mut parent_span_id: Option<String> = None;
    let mut sampled: Option<String> = None;
    let mut flags_raw: Option<String> = None;
    let mut baggage = HashMap::new();

    reader.for_each_entry(&mut |key, value| {
        let lower = key.to_ascii_lowercase();
        match lower.as_str() {
            TRACE_ID => trace_id = Some(value.to_string()),
            SPAN_ID => span_id = Some(value.to_string()),
            PARENT_SPAN_ID => parent_span_id = Some(value.to_string()),
            SAMPLED => sampled = Some(value.to_string()),
            FLAGS => flags_raw = Some(value.to_string()),
            other if other.starts_with(BAGGAGE_PREFIX) => {
                let name = &key[BAGGAGE_PREFIX.len()..];
                baggage.insert(name.to_string(), value.to_string());
            }
            _ => {}
        }
    });

    match (trace_id, span_id) {
        (None, None) => Ok(Extracted {
            context: None,
            baggage,
        }),
        (Some(trace_id_hex), Some(span_id_hex)) => {
            let trace_id =
                TraceId::from_hex(&trace_id_hex).map_err(|_| Error::SpanContextCorrupted)?;
            let span_id: SpanId =
                zipkin_core::span_id_from_hex(&span_id_hex).map_err(|_| Error::SpanContextCorrupted)?;
            let parent_id = match parent_span_id {
                Some(hex) => Some(
                    zipkin_core::span_id_from_hex(&hex).map_err(|_| Error::SpanContextCorrupted)?,
                ),
                None => None,
            };

            let mut flags = 0u64;
            if let Some(raw) = flags_raw {
                let parsed: u64 = raw.parse().map_err(|_| Error::SpanContextCorrupted)?;
                if parsed & zipkin_core::DEBUG != 0 {
                    flags |= zipkin_core::DEBUG;
                }
            }
            if let Some(raw) = sampled {
                let value = header_to_bool(&raw).ok_or(Error::SpanContextCorrupted)?;
                flags |= zipkin_core::SAMPLING_SET;
                if value {
                    flags |= zipkin_core::SAMPLED;
                }
            }

            let context = SpanContext::new(trace_id, span_id, parent_id, flags);
            Ok(Extracted {
                context: Some(context),
                baggage,
            })
        }
        _ => Err(Error::SpanContextCorrupted),
    }
}

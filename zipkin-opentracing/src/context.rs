//! The OpenTracing-facing span context: a Zipkin [`zipkin_core::SpanContext`]
//! plus a mutex-protected baggage map, shared between a span and any
//! contexts extracted from or injected by it.

use std::any::Any;
use std::collections::HashMap;

use parking_lot::Mutex;

/// The vendor-neutral span context surface: baggage iteration plus a
/// downcast hook so a tracer can recognize its own contexts (and reject
/// contexts from another vendor when injecting).
pub trait SpanContext: Send + Sync {
    /// Invokes `f` once per baggage item; stops early if `f` returns
    /// `false`.
    fn foreach_baggage_item(&self, f: &mut dyn FnMut(&str, &str) -> bool);

    /// For downcasting to a concrete implementation (e.g. so `Inject` can
    /// reject a context that did not originate from this tracer).
    fn as_any(&self) -> &dyn Any;
}

/// The concrete, Zipkin-backed [`SpanContext`].
///
/// Baggage is behind its own lock (distinct from the span's tag/name
/// lock) because OpenTracing permits concurrent baggage reads and writes
/// on the same context object, including after the owning span has
/// finished.
pub struct ZipkinSpanContext {
    inner: zipkin_core::SpanContext,
    baggage: Mutex<HashMap<String, String>>,
}

impl ZipkinSpanContext {
    /// Wraps a core span context with no baggage.
    pub fn new(inner: zipkin_core::SpanContext) -> Self {
        Self {
            inner,
            baggage: Mutex::new(HashMap::new()),
        }
    }

    /// Wraps a core span context, seeding its baggage (typically copied
    /// from a parent context).
    pub fn with_baggage(inner: zipkin_core::SpanContext, baggage: HashMap<String, String>) -> Self {
        Self {
            inner,
            baggage: Mutex::new(baggage),
        }
    }

    /// The wrapped core span context.
    pub fn inner(&self) -> &zipkin_core::SpanContext {
        &self.inner
    }

    /// Sets a baggage item, overwriting any previous value for `key`.
    pub fn set_baggage_item(&self, key: &str, value: &str) {
        self.baggage.lock().insert(key.to_string(), value.to_string());
    }

    /// Reads a single baggage item.
    pub fn baggage_item(&self, key: &str) -> Option<String> {
        self.baggage.lock().get(key).cloned()
    }

    /// A point-in-time copy of the full baggage map, e.g. to seed a child
    /// span's context or to inject over B3.
    pub fn baggage_snapshot(&self) -> HashMap<String, String> {
        self.baggage.lock().clone()
    }
}

impl SpanContext for ZipkinSpanContext {
    fn foreach_baggage_item(&self, f: &mut dyn FnMut(&str, &str) -> bool) {
        let snapshot = self.baggage.lock().clone();
        for (k, v) in &snapshot {
            if !f(k, v) {
                return;
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baggage_round_trips() {
        let ctx = ZipkinSpanContext::new(zipkin_core::SpanContext::default());
        ctx.set_baggage_item("a", "1");
        assert_eq!(ctx.baggage_item("a"), Some("1".to_string()));
        assert_eq!(ctx.baggage_item("missing"), None);
    }

    #[test]
    fn foreach_baggage_item_can_short_circuit() {
        let ctx = ZipkinSpanContext::new(zipkin_core::SpanContext::default());
        ctx.set_baggage_item("a", "1");
        ctx.set_baggage_item("b", "2");
        let mut seen = 0;
        ctx.foreach_baggage_item(&mut |_, _| {
            seen += 1;
            false
        });
        assert_eq!(seen, 1);
    }
}

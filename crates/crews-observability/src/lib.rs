//! Structured-logging bridge from the crew event bus to pluggable
//! observability backends.
//!
//! `ObservabilityHandler` is a `crews_eventbus::EventHandler`: subscribe it
//! to a crew's `EventBus` to have every emitted event converted into an
//! `ObservabilityEvent` and recorded on each configured `ObservabilityBackend`.
//! `TracingBackend` satisfies this without any external service; additional
//! backends (a metrics exporter, a vendor trace sink) implement the same
//! trait.

pub mod backend;
pub mod emitter;

pub use backend::{NoopBackend, ObservabilityBackend, ObservabilityError, ObservabilityEvent, TracingBackend};
pub use emitter::ObservabilityHandler;

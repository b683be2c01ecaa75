//! Testing utilities for Attache.
//!
//! This module provides utilities to make testing factories, handlers, and
//! customizers easier.
//!
//! # Features
//!
//! - [`StubHandleSupplier`]: an in-memory supplier that records context
//!   scoping and counts handle acquisitions
//! - [`RecordingHandler`]: a handler that records invocations and returns a
//!   canned value
//! - [`handler_fn`]: wrap a closure as a shared handler

use attache_core::{
    Args, BoxError, ConfigSnapshot, ContextBody, ExtensionContext, ExtensionHandler,
    ExtensionObject, HandleSupplier, Value, into_value,
};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Stub Handle Supplier
// ============================================================================

/// An in-memory [`HandleSupplier`] for tests.
///
/// Records every context enter/exit (teardown is driven by a drop guard, so
/// an exit is recorded even when the handler fails or unwinds) and counts
/// how often the handle was acquired - useful for asserting that dispatch
/// never opens it speculatively.
///
/// # Example
///
/// ```rust,ignore
/// let supplier = Arc::new(StubHandleSupplier::new());
/// let shared: Arc<dyn HandleSupplier> = supplier.clone();
///
/// let greeter = registry.find_for_type::<Greeter>(&shared)?.unwrap();
/// greeter.invoke("say_hi", args![])?;
///
/// assert_eq!(supplier.handle_uses(), 0);
/// assert_eq!(supplier.contexts()[0], "enter Greeter.say_hi()");
/// ```
pub struct StubHandleSupplier {
    config: ConfigSnapshot,
    handle: Box<dyn Any + Send + Sync>,
    handle_uses: AtomicUsize,
    contexts: Mutex<Vec<String>>,
}

impl StubHandleSupplier {
    /// Create a supplier with an empty ambient configuration.
    pub fn new() -> Self {
        Self::with_config(ConfigSnapshot::new())
    }

    /// Create a supplier with the given ambient configuration.
    pub fn with_config(config: ConfigSnapshot) -> Self {
        Self {
            config,
            handle: Box::new(()),
            handle_uses: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// How often the handle was acquired.
    pub fn handle_uses(&self) -> usize {
        self.handle_uses.load(Ordering::SeqCst)
    }

    /// The recorded context transitions, in order.
    pub fn contexts(&self) -> Vec<String> {
        self.contexts.lock().unwrap().clone()
    }

    /// Clear the recorded context transitions.
    pub fn clear(&self) {
        self.contexts.lock().unwrap().clear();
    }
}

impl Default for StubHandleSupplier {
    fn default() -> Self {
        Self::new()
    }
}

// Records the exit on drop so teardown happens on every exit path,
// unwinding included.
struct ContextGuard<'a> {
    contexts: &'a Mutex<Vec<String>>,
    exit: String,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.contexts
            .lock()
            .unwrap()
            .push(std::mem::take(&mut self.exit));
    }
}

impl HandleSupplier for StubHandleSupplier {
    fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    fn handle(&self) -> Result<&dyn Any, BoxError> {
        self.handle_uses.fetch_add(1, Ordering::SeqCst);
        Ok(self.handle.as_ref())
    }

    fn invoke_in_context(
        &self,
        context: &ExtensionContext,
        body: ContextBody<'_>,
    ) -> Result<Value, BoxError> {
        self.contexts.lock().unwrap().push(format!("enter {context}"));
        let _guard = ContextGuard {
            contexts: &self.contexts,
            exit: format!("exit {context}"),
        };
        body()
    }
}

// ============================================================================
// Recording Handler
// ============================================================================

/// A handler that records its invocations and returns a canned value.
///
/// Clones share the same recording state.
///
/// # Example
///
/// ```rust,ignore
/// let handler = RecordingHandler::returning("hi".to_string());
/// let observer = handler.clone();
///
/// // bind `handler` through a factory, invoke the extension ...
///
/// assert_eq!(observer.calls(), 1);
/// ```
pub struct RecordingHandler {
    calls: Arc<Mutex<Vec<usize>>>,
    produce: Arc<dyn Fn() -> Result<Value, BoxError> + Send + Sync>,
}

impl RecordingHandler {
    /// A handler that records calls and yields `()`.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            produce: Arc::new(|| Ok(into_value(()))),
        }
    }

    /// A handler returning a clone of `value` on every call.
    pub fn returning<T: Any + Clone + Send + Sync>(value: T) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            produce: Arc::new(move || Ok(into_value(value.clone()))),
        }
    }

    /// A handler failing with `message` on every call.
    pub fn failing(message: &'static str) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            produce: Arc::new(move || Err(message.into())),
        }
    }

    /// Number of recorded invocations.
    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Argument counts of the recorded invocations, in order.
    pub fn call_arities(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RecordingHandler {
    fn clone(&self) -> Self {
        Self {
            calls: self.calls.clone(),
            produce: self.produce.clone(),
        }
    }
}

impl ExtensionHandler for RecordingHandler {
    fn invoke(
        &self,
        _handle: &dyn HandleSupplier,
        _target: Option<&dyn ExtensionObject>,
        args: Args,
    ) -> Result<Value, BoxError> {
        self.calls.lock().unwrap().push(args.len());
        (self.produce)()
    }
}

// ============================================================================
// Closure Handlers
// ============================================================================

/// Wrap a closure as a shared [`ExtensionHandler`].
pub fn handler_fn<F>(f: F) -> Arc<dyn ExtensionHandler>
where
    F: Fn(&dyn HandleSupplier, Option<&dyn ExtensionObject>, Args) -> Result<Value, BoxError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

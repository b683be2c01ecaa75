//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use attache::testing::{StubHandleSupplier, handler_fn};
use attache::{
    Args, ExtensionFactory, ExtensionHandler, ExtensionObject, ExtensionProxy, ExtensionType,
    HandleSupplier, HandlerFactory, MethodDecl, TypeDescriptor, into_value,
};
use std::any::TypeId;
use std::sync::{Arc, OnceLock};

/// The canonical single-method extension type used across suites.
pub struct Greeter;

impl ExtensionType for Greeter {
    fn descriptor() -> Arc<TypeDescriptor> {
        static DESCRIPTOR: OnceLock<Arc<TypeDescriptor>> = OnceLock::new();
        DESCRIPTOR
            .get_or_init(|| {
                TypeDescriptor::builder::<Greeter>("Greeter")
                    .method(MethodDecl::new("say_hi"))
                    .build()
            })
            .clone()
    }
}

/// Builds `say_hi` handlers returning a fixed reply.
pub struct ReplyHandlerFactory {
    pub reply: &'static str,
}

impl HandlerFactory for ReplyHandlerFactory {
    fn accepts(&self, _ty: &TypeDescriptor, method: &MethodDecl) -> bool {
        method.name() == "say_hi"
    }

    fn build(
        &self,
        _ty: &TypeDescriptor,
        _method: &MethodDecl,
    ) -> Option<Arc<dyn ExtensionHandler>> {
        let reply = self.reply;
        Some(handler_fn(
            move |_: &dyn HandleSupplier, _: Option<&dyn ExtensionObject>, _: Args| {
                Ok(into_value(reply.to_string()))
            },
        ))
    }
}

/// A virtual factory for [`Greeter`] answering `say_hi` with a fixed reply.
pub struct GreeterFactory {
    reply: &'static str,
}

impl GreeterFactory {
    pub fn replying(reply: &'static str) -> Self {
        Self { reply }
    }
}

impl ExtensionFactory for GreeterFactory {
    fn accepts(&self, ty: &TypeDescriptor) -> bool {
        ty.id() == TypeId::of::<Greeter>()
    }

    fn handler_factories(&self) -> Vec<Arc<dyn HandlerFactory>> {
        vec![Arc::new(ReplyHandlerFactory { reply: self.reply })]
    }
}

/// A stub supplier plus its trait-object alias for registry calls.
pub fn supplier() -> (Arc<StubHandleSupplier>, Arc<dyn HandleSupplier>) {
    let stub = Arc::new(StubHandleSupplier::new());
    let shared: Arc<dyn HandleSupplier> = stub.clone();
    (stub, shared)
}

/// Invoke a no-argument method expected to yield a `String`.
pub fn call_string(proxy: &ExtensionProxy, method: &str) -> String {
    let value = proxy
        .invoke(method, Args::new())
        .unwrap_or_else(|err| panic!("{method} failed: {err}"));
    *value
        .downcast::<String>()
        .unwrap_or_else(|_| panic!("{method} did not yield a String"))
}

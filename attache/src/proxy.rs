//! The synthesized dispatch surface handed back to callers.
//!
//! An [`ExtensionProxy`] implements an extension type's capability surface
//! purely from metadata: a dispatch table from [`MethodKey`] to a bound
//! [`HandlerInvoker`], built eagerly at attachment time. No hand-written
//! backing type is required; non-virtual factories contribute a backing
//! instance that the invokers carry along.
//!
//! Every call scopes itself: the invoker computes the method-scoped
//! configuration from a fresh copy of the instance snapshot, constructs an
//! [`ExtensionContext`] identifying the extension type and method, and runs
//! the handler inside the supplier's context call so teardown is guaranteed
//! on every exit path.

use attache_core::{
    Args, ConfigSnapshot, ExtensionContext, ExtensionError, ExtensionHandler, ExtensionMetadata,
    ExtensionObject, HandleSupplier, MethodKey, ResolvedHandler, TypeDescriptor, Value,
    into_value, noop_handler,
};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of one proxy instance.
///
/// Synthesized `equals` dispatch compares tokens, so two structurally equal
/// proxies are never equal unless the extension type declares its own
/// equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyToken(u64);

fn to_string_key() -> MethodKey {
    MethodKey::new("to_string", Vec::new())
}

fn equals_key() -> MethodKey {
    MethodKey::new("equals", vec![TypeId::of::<ProxyToken>()])
}

fn hash_code_key() -> MethodKey {
    MethodKey::new("hash_code", Vec::new())
}

fn finalize_key() -> MethodKey {
    MethodKey::new("finalize", Vec::new())
}

/// One bound entry of a proxy's dispatch table.
///
/// Holds everything a call needs: the resolved handler, the shared handle
/// supplier, the instance-scoped configuration, and the backing instance
/// when one was attached.
pub struct HandlerInvoker {
    metadata: Arc<ExtensionMetadata>,
    method: MethodKey,
    handler: ResolvedHandler,
    handle: Arc<dyn HandleSupplier>,
    instance_config: Arc<ConfigSnapshot>,
    target: Option<Arc<dyn ExtensionObject>>,
}

impl HandlerInvoker {
    /// Execute the bound handler with `args`.
    ///
    /// The method-scoped configuration is computed here, per call, from a
    /// fresh copy of the instance snapshot; handler failures pass through
    /// with their identity intact.
    pub fn invoke(&self, args: Args) -> Result<Value, ExtensionError> {
        let type_name = self.metadata.extension_type().name();
        if args.len() != self.method.arity() {
            return Err(ExtensionError::ArityMismatch {
                type_name,
                method: self.method.to_string(),
                expected: self.method.arity(),
                actual: args.len(),
            });
        }

        let method_config = self
            .metadata
            .create_method_config(&self.method, &self.instance_config);
        let context = ExtensionContext::for_method(method_config, type_name, self.method.clone());

        let _span = tracing::trace_span!(
            "extension_call",
            extension = type_name,
            method = %self.method,
        )
        .entered();

        let handler = &self.handler;
        let handle = &*self.handle;
        let target = self.target.as_deref();
        self.handle
            .invoke_in_context(&context, Box::new(move || handler.invoke(handle, target, args)))
            .map_err(ExtensionError::from_boxed)
    }

    /// The method this invoker is bound to.
    pub fn method(&self) -> &MethodKey {
        &self.method
    }

    /// Identity of the bound handler, if one was resolved.
    pub fn handler_identity(&self) -> Option<usize> {
        self.handler.handler_identity()
    }
}

/// The synthesized extension object returned by the registry.
///
/// Owned exclusively by the caller. The table is frozen at construction:
/// registrations made afterwards never change an existing proxy's bindings.
pub struct ExtensionProxy {
    metadata: Arc<ExtensionMetadata>,
    token: ProxyToken,
    invokers: HashMap<MethodKey, HandlerInvoker>,
}

impl ExtensionProxy {
    pub(crate) fn new(
        metadata: Arc<ExtensionMetadata>,
        handle: Arc<dyn HandleSupplier>,
        instance_config: ConfigSnapshot,
        target: Option<Arc<dyn ExtensionObject>>,
    ) -> Self {
        let token = ProxyToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed));
        let instance_config = Arc::new(instance_config);
        let mut invokers = HashMap::new();

        for (key, resolved) in metadata.handlers() {
            invokers.insert(
                key.clone(),
                HandlerInvoker {
                    metadata: metadata.clone(),
                    method: key.clone(),
                    handler: resolved.clone(),
                    handle: handle.clone(),
                    instance_config: instance_config.clone(),
                    target: target.clone(),
                },
            );
        }

        // Object methods the type did not declare itself get identity-based
        // defaults; declared signatures are never overridden.
        for (key, handler) in object_method_handlers(metadata.extension_type().name(), token) {
            if invokers.contains_key(&key) {
                continue;
            }
            invokers.insert(
                key.clone(),
                HandlerInvoker {
                    metadata: metadata.clone(),
                    method: key,
                    handler: ResolvedHandler::Bound(handler),
                    handle: handle.clone(),
                    instance_config: instance_config.clone(),
                    target: target.clone(),
                },
            );
        }

        Self {
            metadata,
            token,
            invokers,
        }
    }

    /// The extension type this proxy implements.
    pub fn extension_type(&self) -> &Arc<TypeDescriptor> {
        self.metadata.extension_type()
    }

    /// This proxy's identity token.
    pub fn token(&self) -> ProxyToken {
        self.token
    }

    /// The dispatch-table entry for an exact method key.
    pub fn invoker(&self, method: &MethodKey) -> Option<&HandlerInvoker> {
        self.invokers.get(method)
    }

    /// Invoke a method by exact key.
    pub fn invoke_method(&self, method: &MethodKey, args: Args) -> Result<Value, ExtensionError> {
        match self.invokers.get(method) {
            Some(invoker) => invoker.invoke(args),
            None => Err(ExtensionError::UnknownMethod {
                type_name: self.metadata.extension_type().name(),
                method: method.to_string(),
            }),
        }
    }

    /// Invoke a method by name, selecting among overloads by argument count
    /// and the concrete runtime types of `args`.
    ///
    /// First declared, first matched.
    pub fn invoke(&self, name: &str, args: Args) -> Result<Value, ExtensionError> {
        let ty = self.metadata.extension_type().clone();
        let arg_types = args.value_types();

        for decl in ty.methods() {
            if decl.is_static() || decl.name() != name {
                continue;
            }
            let key = decl.key();
            if key.arity() != args.len() || !self.invokers.contains_key(&key) {
                continue;
            }
            let compatible = key
                .params()
                .iter()
                .zip(&arg_types)
                .all(|(param, arg)| ty.assignable(*arg, *param));
            if compatible {
                return self.invoke_method(&key, args);
            }
        }

        // Synthesized entries live only in the table, not on the descriptor.
        for key in self.invokers.keys() {
            if key.name() != name || key.arity() != args.len() || ty.method(key).is_some() {
                continue;
            }
            let compatible = key
                .params()
                .iter()
                .zip(&arg_types)
                .all(|(param, arg)| ty.assignable(*arg, *param));
            if compatible {
                let key = key.clone();
                return self.invoke_method(&key, args);
            }
        }

        Err(ExtensionError::UnknownMethod {
            type_name: ty.name(),
            method: format!("{name}({} arguments)", args.len()),
        })
    }
}

impl fmt::Display for ExtensionProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .invoke_method(&to_string_key(), Args::new())
            .ok()
            .and_then(|value| value.downcast::<String>().ok());
        match rendered {
            Some(text) => f.write_str(&text),
            None => write!(
                f,
                "attache extension proxy for {}@{:x}",
                self.metadata.extension_type().name(),
                self.token.0
            ),
        }
    }
}

impl fmt::Debug for ExtensionProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionProxy")
            .field("type", &self.metadata.extension_type().name())
            .field("token", &self.token.0)
            .field("methods", &self.invokers.len())
            .finish()
    }
}

impl PartialEq for ExtensionProxy {
    fn eq(&self, other: &Self) -> bool {
        self.invoke_method(&equals_key(), Args::new().with(other.token))
            .ok()
            .and_then(|value| value.downcast::<bool>().ok())
            .map(|equal| *equal)
            .unwrap_or(self.token == other.token)
    }
}

impl Eq for ExtensionProxy {}

impl Hash for ExtensionProxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let code = self
            .invoke_method(&hash_code_key(), Args::new())
            .ok()
            .and_then(|value| value.downcast::<u64>().ok())
            .map(|code| *code)
            .unwrap_or(self.token.0);
        state.write_u64(code);
    }
}

impl Drop for ExtensionProxy {
    fn drop(&mut self) {
        // The finalize entry is a no-op unless the type declared one.
        let _ = self.invoke_method(&finalize_key(), Args::new());
    }
}

fn object_method_handlers(
    type_name: &'static str,
    token: ProxyToken,
) -> Vec<(MethodKey, Arc<dyn ExtensionHandler>)> {
    let to_string: Arc<dyn ExtensionHandler> = Arc::new(
        move |_: &dyn HandleSupplier, _: Option<&dyn ExtensionObject>, _: Args| {
            Ok(into_value(format!(
                "attache extension proxy for {type_name}@{:x}",
                token.0
            )))
        },
    );
    let equals: Arc<dyn ExtensionHandler> = Arc::new(
        move |_: &dyn HandleSupplier, _: Option<&dyn ExtensionObject>, args: Args| {
            let equal = args
                .get::<ProxyToken>(0)
                .map(|other| *other == token)
                .unwrap_or(false);
            Ok(into_value(equal))
        },
    );
    let hash_code: Arc<dyn ExtensionHandler> = Arc::new(
        move |_: &dyn HandleSupplier, _: Option<&dyn ExtensionObject>, _: Args| {
            Ok(into_value(token.0))
        },
    );

    vec![
        (to_string_key(), to_string),
        (equals_key(), equals),
        (hash_code_key(), hash_code),
        (finalize_key(), noop_handler()),
    ]
}

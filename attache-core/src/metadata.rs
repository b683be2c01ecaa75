//! Resolved, immutable dispatch metadata for one extension type.
//!
//! [`ExtensionMetadata`] is built once per extension type and cached by the
//! registry: a mapping from every invocable method to exactly one
//! [`ResolvedHandler`], the instance-level config customizer chain, and the
//! per-method customizer chains. It is never mutated after construction and
//! is freely shared across threads.
//!
//! [`MetadataBuilder`] owns resolution *mechanics*; resolution *order* is
//! the caller's: the registry composes the handler-factory chain (explicit
//! handlers, then factory-local factories, then global ones, then the
//! backstops) and passes it in.

use crate::config::{ConfigCustomizer, ConfigCustomizerChain, ConfigSnapshot};
use crate::descriptor::{MethodDecl, MethodKey, TypeDescriptor};
use crate::error::ExtensionError;
use crate::handler::{ExtensionHandler, HandlerCustomizer, HandlerFactory, ResolvedHandler};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// The fully resolved dispatch record for one extension type.
pub struct ExtensionMetadata {
    ty: Arc<TypeDescriptor>,
    instance_customizer: ConfigCustomizerChain,
    method_customizers: HashMap<MethodKey, ConfigCustomizerChain>,
    handlers: HashMap<MethodKey, ResolvedHandler>,
}

impl ExtensionMetadata {
    /// Start building metadata for `ty`.
    ///
    /// Fails immediately when the type declares ambiguous methods - the
    /// same name and parameter types more than once with no overriding
    /// declaration - since dispatch could never be consistent for it.
    pub fn builder(ty: Arc<TypeDescriptor>) -> Result<MetadataBuilder, ExtensionError> {
        let mut seen = HashSet::new();
        for decl in ty.methods().iter().filter(|d| !d.is_bridge() && !d.is_static()) {
            if !seen.insert(decl.key()) {
                return Err(ExtensionError::AmbiguousMethods {
                    type_name: ty.name(),
                    signature: decl.signature(),
                });
            }
        }
        Ok(MetadataBuilder {
            ty,
            instance_customizer: ConfigCustomizerChain::new(),
            method_customizers: HashMap::new(),
            explicit: HashMap::new(),
        })
    }

    /// The described extension type.
    pub fn extension_type(&self) -> &Arc<TypeDescriptor> {
        &self.ty
    }

    /// Apply the instance-level customizer chain to a copy of `ambient`.
    ///
    /// The ambient snapshot is never changed.
    pub fn create_instance_config(&self, ambient: &ConfigSnapshot) -> ConfigSnapshot {
        let mut config = ambient.create_copy();
        self.instance_customizer.customize(&mut config);
        config
    }

    /// Apply the method-level customizer chain for `method` to a fresh copy
    /// of `instance`.
    ///
    /// Computed per invocation so per-call changes never accumulate.
    pub fn create_method_config(
        &self,
        method: &MethodKey,
        instance: &ConfigSnapshot,
    ) -> ConfigSnapshot {
        let mut config = instance.create_copy();
        if let Some(chain) = self.method_customizers.get(method) {
            chain.customize(&mut config);
        }
        config
    }

    /// The resolved binding for every invocable method.
    pub fn handlers(&self) -> &HashMap<MethodKey, ResolvedHandler> {
        &self.handlers
    }

    /// The resolved binding for one method.
    pub fn handler_for(&self, method: &MethodKey) -> Option<&ResolvedHandler> {
        self.handlers.get(method)
    }
}

impl fmt::Debug for ExtensionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionMetadata")
            .field("type", &self.ty.name())
            .field("methods", &self.handlers.len())
            .finish()
    }
}

/// Builder for [`ExtensionMetadata`].
///
/// Handed to the owning factory's
/// [`build_metadata`](crate::factory::ExtensionFactory::build_metadata) so
/// it can seed explicit handlers and config customizers before resolution.
pub struct MetadataBuilder {
    ty: Arc<TypeDescriptor>,
    instance_customizer: ConfigCustomizerChain,
    method_customizers: HashMap<MethodKey, ConfigCustomizerChain>,
    explicit: HashMap<MethodKey, Arc<dyn ExtensionHandler>>,
}

impl MetadataBuilder {
    /// The extension type being built.
    pub fn extension_type(&self) -> &Arc<TypeDescriptor> {
        &self.ty
    }

    /// Append a customizer applied once per extension instance.
    pub fn add_instance_config_customizer(
        &mut self,
        customizer: Arc<dyn ConfigCustomizer>,
    ) -> &mut Self {
        self.instance_customizer.add(customizer);
        self
    }

    /// Append a customizer applied on every invocation of `method`.
    pub fn add_method_config_customizer(
        &mut self,
        method: MethodKey,
        customizer: Arc<dyn ConfigCustomizer>,
    ) -> &mut Self {
        self.method_customizers
            .entry(method)
            .or_default()
            .add(customizer);
        self
    }

    /// Bind `handler` to `method` directly, bypassing the resolution chain.
    pub fn add_method_handler(
        &mut self,
        method: MethodKey,
        handler: Arc<dyn ExtensionHandler>,
    ) -> &mut Self {
        self.explicit.insert(method, handler);
        self
    }

    /// Resolve every invocable method and freeze the metadata.
    ///
    /// `chain` is consulted per method in order; the first factory that
    /// accepts and builds wins. `customizers` wrap each resolved handler in
    /// order. Every bound handler's warm hook runs once here; under
    /// `fail_fast`, unresolvable methods become a build-time error instead
    /// of a deferred sentinel.
    pub fn build(
        self,
        chain: &[Arc<dyn HandlerFactory>],
        customizers: &[Arc<dyn HandlerCustomizer>],
        config: &ConfigSnapshot,
        fail_fast: bool,
    ) -> Result<ExtensionMetadata, ExtensionError> {
        let ty = self.ty;
        let mut handlers: HashMap<MethodKey, ResolvedHandler> = HashMap::new();

        // Explicit handlers bypass the chain but still warm.
        for (key, handler) in self.explicit {
            if ty.method(&key).is_none() {
                return Err(ExtensionError::UnknownMethod {
                    type_name: ty.name(),
                    method: key.to_string(),
                });
            }
            warm(&*handler, config, &ty, &key)?;
            handlers.insert(key, ResolvedHandler::Bound(handler));
        }

        // Non-bridge methods resolve through the chain.
        for decl in invocable(&ty).filter(|d| !d.is_bridge()) {
            let key = decl.key();
            if handlers.contains_key(&key) {
                continue;
            }
            let built = chain
                .iter()
                .filter(|factory| factory.accepts(&ty, decl))
                .find_map(|factory| factory.build(&ty, decl));
            let resolved = match built {
                Some(handler) => {
                    warm(&*handler, config, &ty, &key)?;
                    let mut handler = handler;
                    for customizer in customizers {
                        handler = customizer.customize(handler, &ty, decl);
                    }
                    ResolvedHandler::Bound(handler)
                }
                None => ResolvedHandler::Missing {
                    type_name: ty.name(),
                    method: key.clone(),
                },
            };
            handlers.insert(key, resolved);
        }

        // Bridge methods share the identical binding of their non-bridge
        // counterpart.
        for decl in invocable(&ty).filter(|d| d.is_bridge()) {
            let key = decl.key();
            if handlers.contains_key(&key) {
                continue;
            }
            let resolved = bridge_counterpart(&ty, decl)
                .and_then(|candidate| handlers.get(&candidate.key()).cloned())
                .unwrap_or(ResolvedHandler::Missing {
                    type_name: ty.name(),
                    method: key.clone(),
                });
            handlers.insert(key, resolved);
        }

        if fail_fast {
            for resolved in handlers.values() {
                if let Some(err) = resolved.missing_error() {
                    return Err(err);
                }
            }
        }

        Ok(ExtensionMetadata {
            ty,
            instance_customizer: self.instance_customizer,
            method_customizers: self.method_customizers,
            handlers,
        })
    }
}

fn invocable(ty: &TypeDescriptor) -> impl Iterator<Item = &MethodDecl> {
    ty.methods().iter().filter(|d| !d.is_static())
}

fn warm(
    handler: &dyn ExtensionHandler,
    config: &ConfigSnapshot,
    ty: &TypeDescriptor,
    key: &MethodKey,
) -> Result<(), ExtensionError> {
    handler.warm(config).map_err(|source| ExtensionError::Warm {
        type_name: ty.name(),
        method: key.to_string(),
        source,
    })
}

/// Locate the non-bridge declaration a bridge method stands in for.
///
/// Candidates match by name, arity, and per-parameter assignability into
/// the bridge's parameters; the most specific candidate wins (its
/// parameters assignable into every other candidate's), falling back to
/// declaration order when no candidate dominates.
fn bridge_counterpart<'a>(
    ty: &'a TypeDescriptor,
    bridge: &MethodDecl,
) -> Option<&'a MethodDecl> {
    let candidates: Vec<&MethodDecl> = ty
        .methods()
        .iter()
        .filter(|c| !c.is_bridge() && !c.is_static())
        .filter(|c| c.name() == bridge.name())
        .filter(|c| c.params().len() == bridge.params().len())
        .filter(|c| {
            c.params()
                .iter()
                .zip(bridge.params())
                .all(|(cp, bp)| ty.assignable(cp.id(), bp.id()))
        })
        .collect();

    candidates
        .iter()
        .find(|c| {
            candidates.iter().all(|other| {
                c.params()
                    .iter()
                    .zip(other.params())
                    .all(|(cp, op)| ty.assignable(cp.id(), op.id()))
            })
        })
        .copied()
        .or_else(|| candidates.first().copied())
}

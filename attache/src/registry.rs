//! The extension registry: ordered factory chains, metadata cache, and the
//! runtime entry point producing dispatch proxies.
//!
//! Registration is expected during setup, serialized by the caller; the
//! chains are immutable `Arc<Vec<_>>` snapshots swapped under a write lock,
//! so concurrent readers never observe a partially updated list. The
//! metadata cache tolerates concurrent first use of the same type: whichever
//! build finishes first wins, later ones observe the cached value, and
//! duplicate computation is acceptable where corruption is not.

use crate::backstop::{InstanceMethodHandlerFactory, ProvidedMethodHandlerFactory};
use crate::proxy::ExtensionProxy;
use attache_core::{
    ConfigCustomizerFactory, ConfigSnapshot, ExtensionError, ExtensionFactory, ExtensionMetadata,
    ExtensionType, FactoryFlags, HandleSupplier, HandlerCustomizer, HandlerFactory,
    TypeDescriptor,
};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

type Chain<T> = RwLock<Arc<Vec<Arc<T>>>>;

fn chain<T: ?Sized>() -> Chain<T> {
    RwLock::new(Arc::new(Vec::new()))
}

fn snapshot<T: ?Sized>(chain: &Chain<T>) -> Arc<Vec<Arc<T>>> {
    chain.read().unwrap().clone()
}

fn prepend<T: ?Sized>(chain: &Chain<T>, item: Arc<T>) {
    let mut guard = chain.write().unwrap();
    let mut next = Vec::with_capacity(guard.len() + 1);
    next.push(item);
    next.extend(guard.iter().cloned());
    *guard = Arc::new(next);
}

fn append<T: ?Sized>(chain: &Chain<T>, item: Arc<T>) {
    let mut guard = chain.write().unwrap();
    let mut next = Vec::with_capacity(guard.len() + 1);
    next.extend(guard.iter().cloned());
    next.push(item);
    *guard = Arc::new(next);
}

/// Owns the ordered extension-factory list, the globally registered handler
/// chains, and the per-type metadata cache.
///
/// Safe to share across threads; see the module docs for the concurrency
/// discipline.
pub struct ExtensionRegistry {
    factories: Chain<dyn ExtensionFactory>,
    handler_factories: Chain<dyn HandlerFactory>,
    handler_customizers: Chain<dyn HandlerCustomizer>,
    config_customizer_factories: Chain<dyn ConfigCustomizerFactory>,
    metadata_cache: RwLock<HashMap<TypeId, Arc<ExtensionMetadata>>>,
    allow_proxy: AtomicBool,
    fail_fast: AtomicBool,
}

impl ExtensionRegistry {
    /// Create an empty registry. Proxies are allowed and fail-fast is off.
    pub fn new() -> Self {
        Self {
            factories: chain(),
            handler_factories: chain(),
            handler_customizers: chain(),
            config_customizer_factories: chain(),
            metadata_cache: RwLock::new(HashMap::new()),
            allow_proxy: AtomicBool::new(true),
            fail_fast: AtomicBool::new(false),
        }
    }

    /// Register an extension factory at the head of the chain.
    ///
    /// The most recently registered factory is consulted first. Cached
    /// metadata for types the new factory accepts is dropped so the next
    /// attachment resolves through it; other types keep their cache.
    pub fn register<F: ExtensionFactory>(&self, factory: F) -> &Self {
        self.register_factory(Arc::new(factory))
    }

    /// Register an already-shared extension factory.
    pub fn register_factory(&self, factory: Arc<dyn ExtensionFactory>) -> &Self {
        {
            let mut cache = self.metadata_cache.write().unwrap();
            cache.retain(|_, metadata| !factory.accepts(metadata.extension_type()));
        }
        prepend(&self.factories, factory);
        tracing::debug!("registered extension factory");
        self
    }

    /// Register a global handler factory, consulted before previously
    /// registered ones.
    pub fn register_handler_factory<F: HandlerFactory>(&self, factory: F) -> &Self {
        prepend(&self.handler_factories, Arc::new(factory));
        self
    }

    /// Register a global handler customizer, consulted before previously
    /// registered ones.
    pub fn register_handler_customizer<C: HandlerCustomizer>(&self, customizer: C) -> &Self {
        prepend(&self.handler_customizers, Arc::new(customizer));
        self
    }

    /// Register a config customizer factory.
    ///
    /// Customizers derived from these factories append to the instance and
    /// method chains in registration order, first registered first applied.
    pub fn register_config_customizer_factory<F: ConfigCustomizerFactory>(
        &self,
        factory: F,
    ) -> &Self {
        append(&self.config_customizer_factories, Arc::new(factory));
        self
    }

    /// Allow or disallow synthesizing proxies for virtual factories.
    pub fn set_allow_proxy(&self, allow: bool) -> &Self {
        self.allow_proxy.store(allow, Ordering::Release);
        self
    }

    /// Whether proxy creation is currently allowed.
    pub fn is_allow_proxy(&self) -> bool {
        self.allow_proxy.load(Ordering::Acquire)
    }

    /// Turn fail-fast mode on or off.
    ///
    /// Under fail-fast, a method with no resolvable handler fails the whole
    /// type at metadata construction instead of at first invocation.
    pub fn set_fail_fast(&self, fail_fast: bool) -> &Self {
        self.fail_fast.store(fail_fast, Ordering::Release);
        self
    }

    /// Whether fail-fast mode is on.
    pub fn is_fail_fast(&self) -> bool {
        self.fail_fast.load(Ordering::Acquire)
    }

    /// True if a registered factory accepts the given extension type.
    pub fn has_extension_for(&self, ty: &TypeDescriptor) -> bool {
        self.find_factory_for(ty).is_some()
    }

    /// The first registered factory accepting the given extension type.
    pub fn find_factory_for(&self, ty: &TypeDescriptor) -> Option<Arc<dyn ExtensionFactory>> {
        snapshot(&self.factories)
            .iter()
            .find(|factory| factory.accepts(ty))
            .cloned()
    }

    /// Look up a registered factory by its concrete Rust type.
    pub fn find_factory<F: ExtensionFactory>(&self) -> Option<Arc<dyn ExtensionFactory>> {
        snapshot(&self.factories)
            .iter()
            .find(|factory| (factory.as_ref() as &dyn Any).is::<F>())
            .cloned()
    }

    /// Produce an extension instance for `ty`, if any factory accepts it.
    ///
    /// This is the sole runtime entry point. Construction-time failures -
    /// ambiguous methods, disallowed proxies, fail-fast resolution - surface
    /// here; `Ok(None)` means no registered factory accepts the type.
    pub fn find_for(
        &self,
        ty: &Arc<TypeDescriptor>,
        handle: &Arc<dyn HandleSupplier>,
    ) -> Result<Option<ExtensionProxy>, ExtensionError> {
        let Some(factory) = self.find_factory_for(ty) else {
            return Ok(None);
        };

        let non_virtual = factory.flags().contains(FactoryFlags::NON_VIRTUAL);
        if !non_virtual && !self.is_allow_proxy() {
            return Err(ExtensionError::ProxyDisallowed);
        }

        let metadata = self.metadata_for(ty, &factory, handle.config())?;
        let instance_config = metadata.create_instance_config(handle.config());

        let target = if non_virtual {
            let backing =
                factory
                    .attach(ty, handle)
                    .map_err(|source| ExtensionError::Attach {
                        type_name: ty.name(),
                        source,
                    })?;
            Some(Arc::from(backing))
        } else {
            None
        };

        Ok(Some(ExtensionProxy::new(
            metadata,
            handle.clone(),
            instance_config,
            target,
        )))
    }

    /// Typed variant of [`find_for`](Self::find_for).
    pub fn find_for_type<T: ExtensionType>(
        &self,
        handle: &Arc<dyn HandleSupplier>,
    ) -> Result<Option<ExtensionProxy>, ExtensionError> {
        self.find_for(&T::descriptor(), handle)
    }

    /// Derive an independent registry snapshot.
    ///
    /// Chains are shared by reference - they are immutable - while the
    /// metadata cache is copied entry-by-entry, so registrations in either
    /// lineage never leak into the other.
    pub fn create_copy(&self) -> Self {
        Self {
            factories: RwLock::new(snapshot(&self.factories)),
            handler_factories: RwLock::new(snapshot(&self.handler_factories)),
            handler_customizers: RwLock::new(snapshot(&self.handler_customizers)),
            config_customizer_factories: RwLock::new(snapshot(&self.config_customizer_factories)),
            metadata_cache: RwLock::new(self.metadata_cache.read().unwrap().clone()),
            allow_proxy: AtomicBool::new(self.is_allow_proxy()),
            fail_fast: AtomicBool::new(self.is_fail_fast()),
        }
    }

    fn metadata_for(
        &self,
        ty: &Arc<TypeDescriptor>,
        factory: &Arc<dyn ExtensionFactory>,
        ambient: &ConfigSnapshot,
    ) -> Result<Arc<ExtensionMetadata>, ExtensionError> {
        if let Some(metadata) = self.metadata_cache.read().unwrap().get(&ty.id()) {
            tracing::trace!(extension = ty.name(), "metadata cache hit");
            return Ok(metadata.clone());
        }

        // Built outside the lock; a concurrent build of the same type is
        // tolerated and the first insert wins.
        let metadata = Arc::new(self.build_metadata(ty, factory, ambient)?);
        tracing::debug!(
            extension = ty.name(),
            methods = metadata.handlers().len(),
            "built extension metadata"
        );
        let mut cache = self.metadata_cache.write().unwrap();
        Ok(cache.entry(ty.id()).or_insert(metadata).clone())
    }

    fn build_metadata(
        &self,
        ty: &Arc<TypeDescriptor>,
        factory: &Arc<dyn ExtensionFactory>,
        ambient: &ConfigSnapshot,
    ) -> Result<ExtensionMetadata, ExtensionError> {
        let mut builder = ExtensionMetadata::builder(ty.clone())?;
        factory.build_metadata(&mut builder);

        for customizer_factory in snapshot(&self.config_customizer_factories).iter() {
            for customizer in customizer_factory.for_type(ty) {
                builder.add_instance_config_customizer(customizer);
            }
            for decl in ty.methods().iter().filter(|decl| !decl.is_static()) {
                for customizer in customizer_factory.for_method(ty, decl) {
                    builder.add_method_config_customizer(decl.key(), customizer);
                }
            }
        }

        // Resolution order: the factory's own handler factories, then the
        // global chain, then the backstops.
        let mut handler_chain = factory.handler_factories();
        handler_chain.extend(snapshot(&self.handler_factories).iter().cloned());
        handler_chain.push(Arc::new(ProvidedMethodHandlerFactory));
        if factory.flags().contains(FactoryFlags::NON_VIRTUAL) {
            handler_chain.push(Arc::new(InstanceMethodHandlerFactory));
        }

        let mut customizers = factory.handler_customizers();
        customizers.extend(snapshot(&self.handler_customizers).iter().cloned());

        builder.build(&handler_chain, &customizers, ambient, self.is_fail_fast())
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

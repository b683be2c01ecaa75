//! Metadata construction: ambiguity, fail-fast, warm-up, explicit handlers.

mod common;

use attache::testing::handler_fn;
use attache::{
    Args, BoxError, ConfigSnapshot, ExtensionError, ExtensionFactory, ExtensionHandler,
    ExtensionObject, ExtensionRegistry, HandleSupplier, MetadataBuilder, MethodDecl,
    TypeDescriptor, Value, into_value,
};
use common::supplier;
use std::any::TypeId;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Conflicted;

struct AcceptAnything;

impl ExtensionFactory for AcceptAnything {
    fn accepts(&self, _ty: &TypeDescriptor) -> bool {
        true
    }
}

#[test]
fn ambiguous_declarations_fail_before_any_instance_exists() {
    let ty = TypeDescriptor::builder::<Conflicted>("Conflicted")
        .method(MethodDecl::new("run").declared_by("Job"))
        .method(MethodDecl::new("run").declared_by("Task"))
        .build();

    let registry = ExtensionRegistry::new();
    registry.register(AcceptAnything);

    let (_, shared) = supplier();
    let err = registry.find_for(&ty, &shared).err();
    assert!(matches!(
        err,
        Some(ExtensionError::AmbiguousMethods { type_name: "Conflicted", .. })
    ));
}

struct Ghostly;

#[test]
fn unresolvable_methods_defer_by_default_and_fail_fast_on_demand() {
    let ty = TypeDescriptor::builder::<Ghostly>("Ghostly")
        .method(MethodDecl::new("ghost"))
        .build();

    // Default: attachment succeeds, the error surfaces at first invocation.
    let deferred = ExtensionRegistry::new();
    deferred.register(AcceptAnything);
    let (_, shared) = supplier();
    let proxy = deferred
        .find_for(&ty, &shared)
        .expect("attachment succeeds without fail-fast")
        .expect("accepted");
    let err = proxy.invoke("ghost", Args::new()).err();
    match err {
        Some(ExtensionError::MissingHandler { type_name, method }) => {
            assert_eq!(type_name, "Ghostly");
            assert_eq!(method, "ghost()");
        }
        other => panic!("expected a missing-handler error, got {other:?}"),
    }

    // Fail-fast: the whole type fails at metadata construction.
    let eager = ExtensionRegistry::new();
    eager.register(AcceptAnything).set_fail_fast(true);
    let err = eager.find_for(&ty, &shared).err();
    assert!(matches!(
        err,
        Some(ExtensionError::MissingHandler { type_name: "Ghostly", .. })
    ));
}

struct WarmProbe {
    warms: Arc<AtomicUsize>,
    fail: bool,
}

impl ExtensionHandler for WarmProbe {
    fn invoke(
        &self,
        _handle: &dyn HandleSupplier,
        _target: Option<&dyn ExtensionObject>,
        _args: Args,
    ) -> Result<Value, BoxError> {
        Ok(into_value(()))
    }

    fn warm(&self, _config: &ConfigSnapshot) -> Result<(), BoxError> {
        self.warms.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err("bad wiring".into());
        }
        Ok(())
    }
}

struct Warmed;

struct WarmedFactory {
    warms: Arc<AtomicUsize>,
    fail: bool,
}

impl ExtensionFactory for WarmedFactory {
    fn accepts(&self, ty: &TypeDescriptor) -> bool {
        ty.id() == TypeId::of::<Warmed>()
    }

    fn build_metadata(&self, builder: &mut MetadataBuilder) {
        builder.add_method_handler(
            MethodDecl::new("poke").key(),
            Arc::new(WarmProbe {
                warms: self.warms.clone(),
                fail: self.fail,
            }),
        );
    }
}

fn warmed_descriptor() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder::<Warmed>("Warmed")
        .method(MethodDecl::new("poke"))
        .build()
}

#[test]
fn warm_hooks_run_once_per_metadata_build() {
    let warms = Arc::new(AtomicUsize::new(0));
    let registry = ExtensionRegistry::new();
    registry.register(WarmedFactory {
        warms: warms.clone(),
        fail: false,
    });

    let (_, shared) = supplier();
    let ty = warmed_descriptor();
    for _ in 0..3 {
        let proxy = registry
            .find_for(&ty, &shared)
            .expect("attachment")
            .expect("accepted");
        proxy.invoke("poke", Args::new()).expect("poke dispatches");
    }
    assert_eq!(warms.load(Ordering::SeqCst), 1);
}

#[test]
fn warm_failures_fail_the_whole_build() {
    let warms = Arc::new(AtomicUsize::new(0));
    let registry = ExtensionRegistry::new();
    registry.register(WarmedFactory {
        warms,
        fail: true,
    });

    let (_, shared) = supplier();
    let err = registry.find_for(&warmed_descriptor(), &shared).err();
    match err {
        Some(ExtensionError::Warm { type_name, method, .. }) => {
            assert_eq!(type_name, "Warmed");
            assert_eq!(method, "poke()");
        }
        other => panic!("expected a warm-up error, got {other:?}"),
    }
}

struct Seeded;

struct SeededFactory;

impl ExtensionFactory for SeededFactory {
    fn accepts(&self, ty: &TypeDescriptor) -> bool {
        ty.id() == TypeId::of::<Seeded>()
    }

    fn build_metadata(&self, builder: &mut MetadataBuilder) {
        builder.add_method_handler(
            MethodDecl::new("seeded").key(),
            handler_fn(|_: &dyn HandleSupplier, _: Option<&dyn ExtensionObject>, _: Args| {
                Ok(into_value("from the factory".to_string()))
            }),
        );
    }
}

#[test]
fn explicit_handlers_bypass_the_resolution_chain() {
    let ty = TypeDescriptor::builder::<Seeded>("Seeded")
        .method(MethodDecl::new("seeded"))
        .build();

    let registry = ExtensionRegistry::new();
    registry.register(SeededFactory);

    let (_, shared) = supplier();
    let proxy = registry
        .find_for(&ty, &shared)
        .expect("attachment")
        .expect("accepted");
    let value = proxy.invoke("seeded", Args::new()).expect("seeded dispatches");
    assert_eq!(
        value.downcast::<String>().ok().as_deref().map(String::as_str),
        Some("from the factory")
    );
}

struct Phantom;

struct PhantomFactory;

impl ExtensionFactory for PhantomFactory {
    fn accepts(&self, ty: &TypeDescriptor) -> bool {
        ty.id() == TypeId::of::<Phantom>()
    }

    fn build_metadata(&self, builder: &mut MetadataBuilder) {
        // Seeds a handler for a method the type does not declare.
        builder.add_method_handler(
            MethodDecl::new("vanish").key(),
            handler_fn(|_: &dyn HandleSupplier, _: Option<&dyn ExtensionObject>, _: Args| {
                Ok(into_value(()))
            }),
        );
    }
}

#[test]
fn explicit_handlers_for_undeclared_methods_are_rejected() {
    let ty = TypeDescriptor::builder::<Phantom>("Phantom").build();

    let registry = ExtensionRegistry::new();
    registry.register(PhantomFactory);

    let (_, shared) = supplier();
    let err = registry.find_for(&ty, &shared).err();
    assert!(matches!(
        err,
        Some(ExtensionError::UnknownMethod { type_name: "Phantom", .. })
    ));
}

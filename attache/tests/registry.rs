//! Registry behavior: priority, caching, derivation.

mod common;

use attache::{ExtensionRegistry, ExtensionType, MethodDecl};
use common::{Greeter, GreeterFactory, call_string, supplier};

#[test]
fn most_recently_registered_factory_wins() {
    let registry = ExtensionRegistry::new();
    registry
        .register(GreeterFactory::replying("hi"))
        .register(GreeterFactory::replying("hello"));

    let (_, shared) = supplier();
    let greeter = registry
        .find_for_type::<Greeter>(&shared)
        .expect("attachment")
        .expect("a factory accepts Greeter");
    assert_eq!(call_string(&greeter, "say_hi"), "hello");
}

#[test]
fn unknown_types_resolve_to_none() {
    struct Stranger;
    impl attache::ExtensionType for Stranger {
        fn descriptor() -> std::sync::Arc<attache::TypeDescriptor> {
            attache::TypeDescriptor::builder::<Stranger>("Stranger").build()
        }
    }

    let registry = ExtensionRegistry::new();
    registry.register(GreeterFactory::replying("hi"));

    assert!(registry.has_extension_for(&Greeter::descriptor()));
    assert!(!registry.has_extension_for(&Stranger::descriptor()));

    let (_, shared) = supplier();
    let found = registry
        .find_for_type::<Stranger>(&shared)
        .expect("no construction error for an unhandled type");
    assert!(found.is_none());
}

#[test]
fn metadata_is_built_once_and_reused() {
    let registry = ExtensionRegistry::new();
    registry.register(GreeterFactory::replying("hi"));

    let (_, shared) = supplier();
    let first = registry
        .find_for_type::<Greeter>(&shared)
        .expect("attachment")
        .expect("accepted");
    let second = registry
        .find_for_type::<Greeter>(&shared)
        .expect("attachment")
        .expect("accepted");

    // Distinct instances, identical resolved bindings.
    assert_ne!(first.token(), second.token());
    let key = MethodDecl::new("say_hi").key();
    let first_binding = first.invoker(&key).and_then(|i| i.handler_identity());
    let second_binding = second.invoker(&key).and_then(|i| i.handler_identity());
    assert!(first_binding.is_some());
    assert_eq!(first_binding, second_binding);
}

#[test]
fn registering_rebinds_new_instances_but_never_old_ones() {
    let registry = ExtensionRegistry::new();
    registry.register(GreeterFactory::replying("hi"));

    let (_, shared) = supplier();
    let first = registry
        .find_for_type::<Greeter>(&shared)
        .expect("attachment")
        .expect("accepted");
    assert_eq!(call_string(&first, "say_hi"), "hi");

    registry.register(GreeterFactory::replying("hello"));

    let second = registry
        .find_for_type::<Greeter>(&shared)
        .expect("attachment")
        .expect("accepted");
    assert_eq!(call_string(&second, "say_hi"), "hello");

    // Already-bound metadata is immutable.
    assert_eq!(call_string(&first, "say_hi"), "hi");
}

#[test]
fn factories_are_findable_by_concrete_type() {
    struct Unregistered;
    impl attache::ExtensionFactory for Unregistered {
        fn accepts(&self, _ty: &attache::TypeDescriptor) -> bool {
            false
        }
    }

    let registry = ExtensionRegistry::new();
    registry.register(GreeterFactory::replying("hi"));

    assert!(registry.find_factory::<GreeterFactory>().is_some());
    assert!(registry.find_factory::<Unregistered>().is_none());
}

#[test]
fn derived_registries_do_not_leak_registrations_either_way() {
    let parent = ExtensionRegistry::new();
    parent.register(GreeterFactory::replying("hi"));

    let (_, shared) = supplier();
    let before_copy = parent
        .find_for_type::<Greeter>(&shared)
        .expect("attachment")
        .expect("accepted");
    assert_eq!(call_string(&before_copy, "say_hi"), "hi");

    let child = parent.create_copy();

    // The child starts from the parent's chains and cache ...
    let inherited = child
        .find_for_type::<Greeter>(&shared)
        .expect("attachment")
        .expect("accepted");
    let key = MethodDecl::new("say_hi").key();
    assert_eq!(
        before_copy.invoker(&key).and_then(|i| i.handler_identity()),
        inherited.invoker(&key).and_then(|i| i.handler_identity()),
    );

    // ... but registrations in the child never leak upstream,
    child.register(GreeterFactory::replying("hello"));
    let child_greeter = child
        .find_for_type::<Greeter>(&shared)
        .expect("attachment")
        .expect("accepted");
    assert_eq!(call_string(&child_greeter, "say_hi"), "hello");

    let parent_greeter = parent
        .find_for_type::<Greeter>(&shared)
        .expect("attachment")
        .expect("accepted");
    assert_eq!(call_string(&parent_greeter, "say_hi"), "hi");

    // ... and vice versa.
    parent.register(GreeterFactory::replying("howdy"));
    let child_again = child
        .find_for_type::<Greeter>(&shared)
        .expect("attachment")
        .expect("accepted");
    assert_eq!(call_string(&child_again, "say_hi"), "hello");
}

#[test]
fn concurrent_first_use_converges_on_one_metadata() {
    use std::sync::Arc;

    let registry = Arc::new(ExtensionRegistry::new());
    registry.register(GreeterFactory::replying("hi"));

    let (_, shared) = supplier();
    let mut workers = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        let shared = shared.clone();
        workers.push(std::thread::spawn(move || {
            let greeter = registry
                .find_for_type::<Greeter>(&shared)
                .expect("attachment")
                .expect("accepted");
            let key = MethodDecl::new("say_hi").key();
            let binding = greeter.invoker(&key).and_then(|i| i.handler_identity());
            (call_string(&greeter, "say_hi"), binding)
        }));
    }

    let results: Vec<_> = workers
        .into_iter()
        .map(|worker| worker.join().expect("worker thread"))
        .collect();
    for (reply, _) in &results {
        assert_eq!(reply, "hi");
    }
    // Whichever build won, every thread observed the same cached bindings.
    let bindings: std::collections::HashSet<_> =
        results.iter().map(|(_, binding)| *binding).collect();
    assert_eq!(bindings.len(), 1);
}

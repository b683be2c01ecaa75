//! Runtime descriptions of extension interfaces.
//!
//! The dispatch core never sees a concrete implementation of an extension
//! type; it sees a [`TypeDescriptor`]: the type's name, its declared methods,
//! and the parameter-widening relation used to resolve bridge declarations.
//! Descriptors are built once through [`TypeDescriptorBuilder`] and shared
//! immutably behind an `Arc` for the life of the registry lineage that uses
//! them.
//!
//! Every method is addressed by a [`MethodKey`] - the method name plus its
//! erased parameter types. The key is the stable index of the dispatch table,
//! filling the role runtime reflection plays elsewhere.

use crate::handler::ExtensionHandler;
use bitflags::bitflags;
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

bitflags! {
    /// Declaration properties of one extension method.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodFlags: u8 {
        /// Static declaration, never part of the dispatch surface.
        const STATIC = 1 << 0;
        /// Synthetic covariant-return overload of another declaration.
        const BRIDGE = 1 << 1;
    }
}

/// Stable dispatch key: method name plus erased parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    name: &'static str,
    params: Vec<TypeId>,
}

impl MethodKey {
    /// Create a key from a name and erased parameter types.
    pub fn new(name: &'static str, params: Vec<TypeId>) -> Self {
        Self { name, params }
    }

    /// The method name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The erased parameter types, in declaration order.
    pub fn params(&self) -> &[TypeId] {
        &self.params
    }

    /// Number of declared parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for index in 0..self.params.len() {
            if index > 0 {
                f.write_str(", ")?;
            }
            f.write_str("_")?;
        }
        f.write_str(")")
    }
}

/// One declared parameter: its erased type and a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    id: TypeId,
    name: &'static str,
}

impl ParamSpec {
    /// Describe a parameter of type `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The erased parameter type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The parameter type's display name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// One method declared by an extension type.
#[derive(Clone)]
pub struct MethodDecl {
    name: &'static str,
    params: Vec<ParamSpec>,
    flags: MethodFlags,
    provided: Option<Arc<dyn ExtensionHandler>>,
    declared_by: &'static str,
}

impl MethodDecl {
    /// Declare a method with no parameters.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            params: Vec::new(),
            flags: MethodFlags::empty(),
            provided: None,
            declared_by: "",
        }
    }

    /// Append a parameter of type `T`.
    pub fn with_param<T: Any>(mut self) -> Self {
        self.params.push(ParamSpec::of::<T>());
        self
    }

    /// Set declaration flags.
    pub fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Attach an interface-provided body (a default method implementation).
    pub fn with_provided(mut self, body: Arc<dyn ExtensionHandler>) -> Self {
        self.provided = Some(body);
        self
    }

    /// Name the declaring interface, for diagnostics.
    ///
    /// Defaults to the descriptor's own name when left unset.
    pub fn declared_by(mut self, interface: &'static str) -> Self {
        self.declared_by = interface;
        self
    }

    /// The method name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The declared parameters, in order.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Declaration flags.
    pub fn flags(&self) -> MethodFlags {
        self.flags
    }

    /// True for static declarations.
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    /// True for bridge declarations.
    pub fn is_bridge(&self) -> bool {
        self.flags.contains(MethodFlags::BRIDGE)
    }

    /// The interface-provided body, if this is a default method.
    pub fn provided_body(&self) -> Option<&Arc<dyn ExtensionHandler>> {
        self.provided.as_ref()
    }

    /// The declaring interface name.
    pub fn declaring_interface(&self) -> &'static str {
        self.declared_by
    }

    /// The dispatch key for this declaration.
    pub fn key(&self) -> MethodKey {
        MethodKey::new(self.name, self.params.iter().map(ParamSpec::id).collect())
    }

    /// Human-readable signature, e.g. `concat(i32, alloc::string::String)`.
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.name()).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

impl fmt::Debug for MethodDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDecl")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("flags", &self.flags)
            .field("provided", &self.provided.is_some())
            .field("declared_by", &self.declared_by)
            .finish()
    }
}

/// Immutable runtime description of an extension interface.
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
    methods: Vec<MethodDecl>,
    widenings: Vec<(TypeId, TypeId)>,
}

impl TypeDescriptor {
    /// Start describing the extension type marked by `T`.
    pub fn builder<T: Any>(name: &'static str) -> TypeDescriptorBuilder {
        TypeDescriptorBuilder {
            id: TypeId::of::<T>(),
            name,
            methods: Vec::new(),
            widenings: Vec::new(),
        }
    }

    /// The identity of the described type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The type's display name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared methods, in declaration order.
    pub fn methods(&self) -> &[MethodDecl] {
        &self.methods
    }

    /// Look up a declaration by its dispatch key.
    pub fn method(&self, key: &MethodKey) -> Option<&MethodDecl> {
        self.methods.iter().find(|decl| decl.key() == *key)
    }

    /// True if a value of type `from` can stand in where `to` is declared.
    ///
    /// Reflexive, extended by the widening pairs recorded on the builder.
    pub fn assignable(&self, from: TypeId, to: TypeId) -> bool {
        from == to || self.widenings.contains(&(from, to))
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .finish()
    }
}

/// Builder for [`TypeDescriptor`].
pub struct TypeDescriptorBuilder {
    id: TypeId,
    name: &'static str,
    methods: Vec<MethodDecl>,
    widenings: Vec<(TypeId, TypeId)>,
}

impl TypeDescriptorBuilder {
    /// Declare a method.
    pub fn method(mut self, decl: MethodDecl) -> Self {
        self.methods.push(decl);
        self
    }

    /// Record that `From` values may stand in for `To` parameters.
    ///
    /// Bridge declarations use this relation to locate their non-bridge
    /// counterpart.
    pub fn widening<From: Any, To: Any>(mut self) -> Self {
        self.widenings.push((TypeId::of::<From>(), TypeId::of::<To>()));
        self
    }

    /// Finish the description.
    pub fn build(self) -> Arc<TypeDescriptor> {
        let name = self.name;
        let methods = self
            .methods
            .into_iter()
            .map(|mut decl| {
                if decl.declared_by.is_empty() {
                    decl.declared_by = name;
                }
                decl
            })
            .collect();
        Arc::new(TypeDescriptor {
            id: self.id,
            name,
            methods,
            widenings: self.widenings,
        })
    }
}

/// Marker trait tying a Rust type to its extension descriptor.
///
/// Implement this on a unit marker to get the typed lookup sugar:
///
/// ```rust,ignore
/// struct Greeter;
///
/// impl ExtensionType for Greeter {
///     fn descriptor() -> Arc<TypeDescriptor> {
///         static DESCRIPTOR: OnceLock<Arc<TypeDescriptor>> = OnceLock::new();
///         DESCRIPTOR
///             .get_or_init(|| {
///                 TypeDescriptor::builder::<Greeter>("Greeter")
///                     .method(MethodDecl::new("say_hi"))
///                     .build()
///             })
///             .clone()
///     }
/// }
/// ```
pub trait ExtensionType: Any {
    /// The runtime description of this extension interface.
    fn descriptor() -> Arc<TypeDescriptor>;
}

#[cfg(test)]
mod tests {
    use super::{MethodDecl, MethodFlags, MethodKey, TypeDescriptor};
    use std::any::TypeId;

    struct Marker;

    #[test]
    fn keys_are_stable_across_declarations() {
        let a = MethodDecl::new("concat").with_param::<i32>().key();
        let b = MethodKey::new("concat", vec![TypeId::of::<i32>()]);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "concat(_)");
    }

    #[test]
    fn builder_fills_declaring_interface() {
        let ty = TypeDescriptor::builder::<Marker>("Marker")
            .method(MethodDecl::new("run"))
            .method(MethodDecl::new("stop").declared_by("Lifecycle"))
            .build();
        assert_eq!(ty.methods()[0].declaring_interface(), "Marker");
        assert_eq!(ty.methods()[1].declaring_interface(), "Lifecycle");
    }

    #[test]
    fn assignability_is_reflexive_plus_widenings() {
        let ty = TypeDescriptor::builder::<Marker>("Marker")
            .widening::<i32, i64>()
            .build();
        assert!(ty.assignable(TypeId::of::<i32>(), TypeId::of::<i32>()));
        assert!(ty.assignable(TypeId::of::<i32>(), TypeId::of::<i64>()));
        assert!(!ty.assignable(TypeId::of::<i64>(), TypeId::of::<i32>()));
    }

    #[test]
    fn flags_classify_declarations() {
        let decl = MethodDecl::new("value").with_flags(MethodFlags::BRIDGE);
        assert!(decl.is_bridge());
        assert!(!decl.is_static());
    }
}

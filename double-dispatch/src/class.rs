//! Runtime class model for dispatch.
//!
//! Rust has neither class inheritance nor member reflection, so the type
//! hierarchy that dispatch walks is declared explicitly:
//!
//! - every dispatchable type implements [`Class`], usually through the
//!   [`class!`](crate::class!) macro;
//! - a derived type embeds its base type and exposes it through
//!   [`Class::superclass`], so a `File` *is an* `Item` by composition;
//! - each type has a [`ClassInfo`] descriptor whose superclass link forms the
//!   chain the resolver walks.
//!
//! Reference types without an explicit superclass derive from the universal
//! [`Object`]. Value types have no chain at all.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Upper bound on superclass links followed by assignability checks.
const ANCESTRY_LIMIT: usize = 256;

/// Whether a class carries identity or is copied by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Participates in a superclass chain.
    Reference,
    /// Standalone; falls back to the universal entry when unmatched.
    Value,
}

/// Descriptor of a class: identity, display name, kind and superclass link.
///
/// Two descriptors are equal when they describe the same Rust type.
#[derive(Clone, Copy)]
pub struct ClassInfo {
    id: TypeId,
    name: &'static str,
    kind: TypeKind,
    superclass: Option<fn() -> ClassInfo>,
}

impl ClassInfo {
    /// Descriptor for a reference class rooted directly at [`Object`].
    pub fn reference<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name,
            kind: TypeKind::Reference,
            superclass: None,
        }
    }

    /// Descriptor for a value class.
    pub fn value<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name,
            kind: TypeKind::Value,
            superclass: None,
        }
    }

    /// The universal class every reference class ultimately derives from.
    pub fn object() -> Self {
        Self::reference::<Object>("Object")
    }

    /// Sets the superclass of a reference class.
    pub fn extends(mut self, superclass: fn() -> ClassInfo) -> Self {
        debug_assert_eq!(self.kind, TypeKind::Reference, "value classes have no superclass");
        self.superclass = Some(superclass);
        self
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_value_type(&self) -> bool {
        self.kind == TypeKind::Value
    }

    /// True for the universal [`Object`] class.
    pub fn is_object(&self) -> bool {
        self.id == TypeId::of::<Object>()
    }

    /// The direct superclass, `None` at the universal boundary.
    pub fn superclass(&self) -> Option<ClassInfo> {
        self.superclass.map(|superclass| superclass())
    }

    /// Iterates the superclass chain, nearest first, excluding `self` and the
    /// universal boundary.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: self.superclass,
        }
    }

    /// Whether a value of this class can stand where `target` is expected.
    ///
    /// Holds when `target` is [`Object`], when both are the same class, or
    /// when `target` is a superclass of this reference class.
    pub fn is_assignable_to(&self, target: &ClassInfo) -> bool {
        if target.is_object() || self == target {
            return true;
        }
        if self.is_value_type() {
            return false;
        }
        self.ancestors()
            .take(ANCESTRY_LIMIT)
            .any(|ancestor| ancestor == *target)
    }
}

impl PartialEq for ClassInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClassInfo {}

impl Hash for ClassInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TypeKind::Reference => write!(f, "class {}", self.name),
            TypeKind::Value => write!(f, "value {}", self.name),
        }
    }
}

impl fmt::Display for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Iterator over a class's superclass chain.
#[derive(Debug, Clone)]
pub struct Ancestors {
    next: Option<fn() -> ClassInfo>,
}

impl Iterator for Ancestors {
    type Item = ClassInfo;

    fn next(&mut self) -> Option<ClassInfo> {
        let class = (self.next?)();
        self.next = class.superclass;
        Some(class)
    }
}

/// A type that can be dispatched on or returned from a dispatched function.
///
/// Implement it with [`class!`](crate::class!) rather than by hand.
pub trait Class: Any + Send + Sync {
    /// The declared class of the implementing type.
    fn static_class() -> ClassInfo
    where
        Self: Sized;

    /// The runtime class of this value.
    fn class(&self) -> ClassInfo;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;

    /// The embedded base part of a derived value.
    fn superclass(&self) -> Option<&dyn Class> {
        None
    }

    /// Moves out the embedded base part of a derived value.
    fn into_superclass(self: Box<Self>) -> Option<Box<dyn Class>> {
        None
    }
}

impl<'a> dyn Class + 'a {
    /// Views this value as `T`, descending through embedded base parts.
    pub fn upcast<T: Class>(&self) -> Option<&T> {
        let mut current: &dyn Class = self;
        loop {
            if let Some(view) = current.as_any().downcast_ref::<T>() {
                return Some(view);
            }
            current = current.superclass()?;
        }
    }

    /// Whether the value is, or derives from, `T`.
    pub fn is<T: Class>(&self) -> bool {
        self.upcast::<T>().is_some()
    }
}

impl<'a> fmt::Debug for dyn Class + 'a {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.class())
    }
}

/// Converts a boxed dispatch result into the caller's expected type.
///
/// `Object` wraps anything; otherwise derived layers are stripped until the
/// expected class is reached.
pub(crate) fn coerce<R: Class>(value: Box<dyn Class>) -> Option<R> {
    if TypeId::of::<R>() == TypeId::of::<Object>() {
        let wrapped: Box<dyn Any> = Box::new(Object::from_boxed(value));
        return wrapped.downcast::<R>().ok().map(|result| *result);
    }

    let target = R::static_class();
    let mut current = value;
    loop {
        if current.class() == target {
            return current.into_any().downcast::<R>().ok().map(|result| *result);
        }
        current = current.into_superclass()?;
    }
}

/// The universal class: an owned value of any class.
///
/// Dispatch sees through an `Object` to the class of its content.
pub struct Object(Box<dyn Class>);

impl Object {
    pub fn new<T: Class>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn from_boxed(value: Box<dyn Class>) -> Self {
        Self(value)
    }

    pub fn get(&self) -> &dyn Class {
        self.0.as_ref()
    }

    pub fn into_inner(self) -> Box<dyn Class> {
        self.0
    }

    pub fn downcast_ref<T: Class>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Takes the content back as `T` if it has exactly that class.
    pub fn downcast<T: Class>(self) -> Result<T, Self> {
        if self.0.as_any().is::<T>() {
            self.0
                .into_any()
                .downcast::<T>()
                .map(|value| *value)
                .map_err(|_| unreachable!("class checked above"))
        } else {
            Err(self)
        }
    }
}

impl Class for Object {
    fn static_class() -> ClassInfo {
        ClassInfo::object()
    }

    fn class(&self) -> ClassInfo {
        self.0.class()
    }

    fn as_any(&self) -> &dyn Any {
        self.0.as_any()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self.0.into_any()
    }

    fn superclass(&self) -> Option<&dyn Class> {
        self.0.superclass()
    }

    fn into_superclass(self: Box<Self>) -> Option<Box<dyn Class>> {
        self.0.into_superclass()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Object").field(&self.0.class()).finish()
    }
}

/// Implements [`Class`] for a type.
///
/// ```
/// use double_dispatch::class;
///
/// pub struct Entity { pub id: String }
/// pub struct Item { pub base: Entity }
/// pub struct File { pub base: Item }
/// pub struct Celsius(pub f64);
///
/// class!(Entity);
/// class!(Item: Entity => base);
/// class!(File: Item => base);
/// class!(value Celsius);
/// ```
#[macro_export]
macro_rules! class {
    (@impl $ty:ty, $info:expr) => {
        impl $crate::Class for $ty {
            fn static_class() -> $crate::ClassInfo {
                $info
            }

            fn class(&self) -> $crate::ClassInfo {
                <Self as $crate::Class>::static_class()
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn into_any(
                self: ::std::boxed::Box<Self>,
            ) -> ::std::boxed::Box<dyn ::std::any::Any + Send + Sync> {
                self
            }
        }
    };
    (value $ty:ty) => {
        $crate::class!(@impl $ty, $crate::ClassInfo::value::<$ty>(stringify!($ty)));
    };
    ($ty:ty : $base:ty => $field:ident) => {
        impl $crate::Class for $ty {
            fn static_class() -> $crate::ClassInfo {
                $crate::ClassInfo::reference::<$ty>(stringify!($ty))
                    .extends(<$base as $crate::Class>::static_class)
            }

            fn class(&self) -> $crate::ClassInfo {
                <Self as $crate::Class>::static_class()
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn into_any(
                self: ::std::boxed::Box<Self>,
            ) -> ::std::boxed::Box<dyn ::std::any::Any + Send + Sync> {
                self
            }

            fn superclass(&self) -> ::std::option::Option<&dyn $crate::Class> {
                ::std::option::Option::Some(&self.$field)
            }

            fn into_superclass(
                self: ::std::boxed::Box<Self>,
            ) -> ::std::option::Option<::std::boxed::Box<dyn $crate::Class>> {
                ::std::option::Option::Some(::std::boxed::Box::new(self.$field))
            }
        }
    };
    ($ty:ty) => {
        $crate::class!(@impl $ty, $crate::ClassInfo::reference::<$ty>(stringify!($ty)));
    };
}

class!(value bool);
class!(value char);
class!(value i8);
class!(value i16);
class!(value i32);
class!(value i64);
class!(value i128);
class!(value isize);
class!(value u8);
class!(value u16);
class!(value u32);
class!(value u64);
class!(value u128);
class!(value usize);
class!(value f32);
class!(value f64);
class!(value String);
class!(value &'static str);

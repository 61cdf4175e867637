//! Surrogates: self-dispatching callables built from bound methods.
//!
//! A [`Bound`] method names an operation on one particular subject. Wrapping
//! it in a [`Surrogate`] (procedures) or [`SurrogateFn`] (functions) yields a
//! callable that re-resolves every call through the argument's runtime
//! class, walking the full superclass chain. The subject does not need a
//! dispatcher of its own.

use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::Arc;

use crate::class::{Class, TypeKind};
use crate::config::DispatchConfig;
use crate::dispatch::{Dispatch, Dispatcher, ResolutionMode, StaticDispatch, TypeToken};
use crate::error::{DispatchError, Result};

/// An operation name bound to a specific subject.
pub struct Bound<'s, S> {
    target: Option<&'s S>,
    name: String,
}

impl<'s, S: Dispatch> Bound<'s, S> {
    pub fn new(target: &'s S, name: impl Into<String>) -> Self {
        Self {
            target: Some(target),
            name: name.into(),
        }
    }

    /// An operation name with no subject; wrapping it fails.
    pub fn unbound(name: impl Into<String>) -> Self {
        Self {
            target: None,
            name: name.into(),
        }
    }

    pub fn target(&self) -> Option<&'s S> {
        self.target
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks that this method is bound to `subject`.
    ///
    /// Identity is compared by address; value-kind subjects are exempt since
    /// they are expected to be copies.
    pub fn ensure_bound_to(&self, subject: &S) -> Result<()> {
        let same = self.target.is_some_and(|target| ptr::eq(target, subject));
        if same || S::kind() == TypeKind::Value {
            Ok(())
        } else {
            Err(DispatchError::InvalidOperation {
                method: self.name.clone(),
                target: std::any::type_name::<S>(),
            })
        }
    }

    fn into_target(self) -> Result<(Target<'s, S>, String)> {
        let target = self.target.ok_or_else(|| DispatchError::unbound(&self.name))?;
        if self.name.is_empty() {
            return Err(DispatchError::empty_name());
        }
        Ok((Target::Instance(target), self.name))
    }
}

impl<S> Clone for Bound<'_, S> {
    fn clone(&self) -> Self {
        Self {
            target: self.target,
            name: self.name.clone(),
        }
    }
}

impl<S> fmt::Debug for Bound<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bound")
            .field("subject", &std::any::type_name::<S>())
            .field("name", &self.name)
            .field("bound", &self.target.is_some())
            .finish()
    }
}

enum Target<'s, S> {
    Instance(&'s S),
    Type(S),
}

impl<S> Target<'_, S> {
    fn get(&self) -> &S {
        match self {
            Target::Instance(subject) => subject,
            Target::Type(token) => token,
        }
    }
}

fn type_target<'s, T: StaticDispatch>(name: &str) -> Result<(Target<'s, TypeToken<T>>, String)> {
    if name.is_empty() {
        return Err(DispatchError::empty_name());
    }
    Ok((Target::Type(TypeToken::new()), name.to_string()))
}

/// A self-dispatching procedure over a bound method.
///
/// `D` is the parameter class the wrapped method was declared with.
pub struct Surrogate<'s, S, D> {
    target: Target<'s, S>,
    name: String,
    dispatcher: Dispatcher<S>,
    fallback: Option<Box<dyn Fn() + 's>>,
    _declared: PhantomData<fn() -> D>,
}

impl<'s, S: Dispatch, D: Class> Surrogate<'s, S, D> {
    /// Wraps a bound method; fails if it is unbound or unnamed.
    pub fn wrap(method: Bound<'s, S>) -> Result<Self> {
        Self::wrap_with_config(method, DispatchConfig::shared())
    }

    pub fn wrap_with_config(method: Bound<'s, S>, config: Arc<DispatchConfig>) -> Result<Self> {
        let (target, name) = method.into_target()?;
        Ok(Self {
            target,
            name,
            dispatcher: Dispatcher::surrogate(config),
            fallback: None,
            _declared: PhantomData,
        })
    }

    /// Runs `fallback` when no candidate matches.
    pub fn or_else(mut self, fallback: impl Fn() + 's) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// The operation name recovered from the bound method.
    pub fn method_name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, arg: Option<&dyn Class>) {
        if !self.dispatch(arg) {
            if let Some(fallback) = &self.fallback {
                fallback()
            }
        }
    }

    /// Converts into a plain closure.
    pub fn into_fn(self) -> impl Fn(Option<&dyn Class>) + 's {
        move |arg| self.call(arg)
    }

    fn dispatch(&self, arg: Option<&dyn Class>) -> bool {
        self.dispatcher.invoke::<D>(self.target.get(), &self.name, arg)
    }
}

impl<'s, T: StaticDispatch, D: Class> Surrogate<'s, TypeToken<T>, D> {
    /// A surrogate over `T`'s type-level operation `name`.
    pub fn for_type(name: &str) -> Result<Self> {
        let (target, name) = type_target::<T>(name)?;
        Ok(Self {
            target,
            name,
            dispatcher: Dispatcher::for_type_in(ResolutionMode::Surrogate),
            fallback: None,
            _declared: PhantomData,
        })
    }
}

impl<S, D> fmt::Debug for Surrogate<'_, S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surrogate")
            .field("name", &self.name)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// A self-dispatching function over a bound method.
///
/// `D` is the declared parameter class, `R` the expected result class.
pub struct SurrogateFn<'s, S, D, R> {
    target: Target<'s, S>,
    name: String,
    dispatcher: Dispatcher<S>,
    fallback: Option<Box<dyn Fn() -> R + 's>>,
    _declared: PhantomData<fn() -> D>,
}

impl<'s, S: Dispatch, D: Class, R: Class> SurrogateFn<'s, S, D, R> {
    /// Wraps a bound method; fails if it is unbound or unnamed.
    pub fn wrap(method: Bound<'s, S>) -> Result<Self> {
        Self::wrap_with_config(method, DispatchConfig::shared())
    }

    pub fn wrap_with_config(method: Bound<'s, S>, config: Arc<DispatchConfig>) -> Result<Self> {
        let (target, name) = method.into_target()?;
        Ok(Self {
            target,
            name,
            dispatcher: Dispatcher::surrogate(config),
            fallback: None,
            _declared: PhantomData,
        })
    }

    /// Returns `default` when no candidate matches.
    pub fn or(self, default: R) -> Self
    where
        R: Clone,
    {
        self.or_else(move || default.clone())
    }

    /// Runs `fallback` when no candidate matches. Replaces any default.
    pub fn or_else(mut self, fallback: impl Fn() -> R + 's) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn method_name(&self) -> &str {
        &self.name
    }

    /// The match's result, else the fallback's, else `None`.
    pub fn try_call(&self, arg: Option<&dyn Class>) -> Option<R> {
        self.dispatcher
            .try_call::<D, R>(self.target.get(), &self.name, arg)
            .or_else(|| self.fallback.as_ref().map(|fallback| fallback()))
    }

    /// Like [`try_call`](Self::try_call), with `R::default()` as last resort.
    pub fn call(&self, arg: Option<&dyn Class>) -> R
    where
        R: Default,
    {
        self.try_call(arg).unwrap_or_default()
    }

    pub fn into_fn(self) -> impl Fn(Option<&dyn Class>) -> Option<R> + 's {
        move |arg| self.try_call(arg)
    }
}

impl<'s, T: StaticDispatch, D: Class, R: Class> SurrogateFn<'s, TypeToken<T>, D, R> {
    /// A surrogate over `T`'s type-level function `name`.
    pub fn for_type(name: &str) -> Result<Self> {
        let (target, name) = type_target::<T>(name)?;
        Ok(Self {
            target,
            name,
            dispatcher: Dispatcher::for_type_in(ResolutionMode::Surrogate),
            fallback: None,
            _declared: PhantomData,
        })
    }
}

impl<S, D, R> fmt::Debug for SurrogateFn<'_, S, D, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurrogateFn")
            .field("name", &self.name)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// Binding and one-shot surrogate invocation for any subject.
pub trait DispatchExt: Dispatch {
    /// Binds operation `name` to this subject.
    fn bind(&self, name: &str) -> Bound<'_, Self> {
        Bound::new(self, name)
    }

    /// Invokes `method` with double dispatch after checking it is bound to
    /// this subject.
    fn surrogate_invoke<D: Class>(
        &self,
        method: Bound<'_, Self>,
        arg: Option<&dyn Class>,
    ) -> Result<()> {
        method.ensure_bound_to(self)?;
        Surrogate::<Self, D>::wrap(method)?.call(arg);
        Ok(())
    }

    fn surrogate_invoke_or_else<D, F>(
        &self,
        method: Bound<'_, Self>,
        arg: Option<&dyn Class>,
        fallback: F,
    ) -> Result<()>
    where
        D: Class,
        F: FnOnce(),
    {
        method.ensure_bound_to(self)?;
        if !Surrogate::<Self, D>::wrap(method)?.dispatch(arg) {
            fallback()
        }
        Ok(())
    }

    /// Calls `method` with double dispatch, `R::default()` on a miss.
    fn surrogate_call<D, R>(&self, method: Bound<'_, Self>, arg: Option<&dyn Class>) -> Result<R>
    where
        D: Class,
        R: Class + Default,
    {
        method.ensure_bound_to(self)?;
        Ok(SurrogateFn::<Self, D, R>::wrap(method)?.call(arg))
    }

    fn surrogate_call_or_else<D, R, F>(
        &self,
        method: Bound<'_, Self>,
        arg: Option<&dyn Class>,
        fallback: F,
    ) -> Result<R>
    where
        D: Class,
        R: Class,
        F: FnOnce() -> R,
    {
        method.ensure_bound_to(self)?;
        Ok(SurrogateFn::<Self, D, R>::wrap(method)?
            .try_call(arg)
            .unwrap_or_else(fallback))
    }
}

impl<S: Dispatch> DispatchExt for S {}

//! The per-subject dispatch facade.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::class::{coerce, Class, ClassInfo};
use crate::config::DispatchConfig;

use super::resolver::{Request, Resolver};
use super::result::DispatchResult;
use super::table::{type_table, CandidateTable, Dispatch, StaticDispatch, TypeToken};
use super::types::{Callable, ResolutionMode};

/// Resolves and invokes a subject's operations by the runtime class of their
/// argument.
///
/// The candidate table is built on first use and never rebuilt. A dispatcher
/// does not hold its subject; every call passes it, so a subject can own its
/// own dispatcher:
///
/// ```
/// use std::sync::Mutex;
/// use double_dispatch::{class, Class, Dispatch, Dispatcher, TableBuilder};
///
/// struct Shape;
/// struct Triangle { base: Shape }
/// class!(Shape);
/// class!(Triangle: Shape => base);
///
/// struct Printer {
///     dispatch: Dispatcher<Printer>,
///     out: Mutex<Vec<String>>,
/// }
///
/// impl Dispatch for Printer {
///     fn register(table: &mut TableBuilder<'_, Self>) {
///         table.procedure("print", |p: &Printer, _: &Triangle| {
///             p.out.lock().unwrap().push("triangle".into())
///         });
///     }
/// }
///
/// impl Printer {
///     // Entry point declared for any `Shape`.
///     fn print(&self, shape: &dyn Class) {
///         self.dispatch.invoke_or_else::<Shape, _>(self, "print", Some(shape), || {
///             self.out.lock().unwrap().push("shape".into())
///         });
///     }
/// }
///
/// let printer = Printer { dispatch: Dispatcher::new(), out: Mutex::new(vec![]) };
/// printer.print(&Triangle { base: Shape });
/// printer.print(&Shape);
/// assert_eq!(*printer.out.lock().unwrap(), ["triangle", "shape"]);
/// ```
pub struct Dispatcher<S> {
    table: OnceCell<Arc<CandidateTable<S>>>,
    mode: ResolutionMode,
    config: Arc<DispatchConfig>,
}

impl<S: Dispatch> Dispatcher<S> {
    /// A lazily built dispatcher with the shared default configuration.
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::shared())
    }

    pub fn with_config(config: Arc<DispatchConfig>) -> Self {
        Self {
            table: OnceCell::new(),
            mode: ResolutionMode::Direct,
            config,
        }
    }

    /// A dispatcher whose table is built immediately, for subjects that
    /// create their dispatcher during construction.
    pub fn prepared() -> Self {
        let dispatcher = Self::new();
        dispatcher.table();
        dispatcher
    }

    pub(crate) fn surrogate(config: Arc<DispatchConfig>) -> Self {
        Self {
            table: OnceCell::new(),
            mode: ResolutionMode::Surrogate,
            config,
        }
    }

    pub fn mode(&self) -> ResolutionMode {
        self.mode
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// The subject's candidate table, built on first access.
    pub fn table(&self) -> &CandidateTable<S> {
        self.table.get_or_init(|| Arc::new(CandidateTable::build(&self.config)))
    }

    pub fn is_built(&self) -> bool {
        self.table.get().is_some()
    }

    /// Resolves without invoking.
    pub fn resolve(
        &self,
        name: &str,
        declared: ClassInfo,
        expected: Option<ClassInfo>,
        arg: Option<&dyn Class>,
    ) -> DispatchResult<'_, S> {
        let request = Request {
            name,
            declared,
            expected,
        };
        let resolver = Resolver::new(self.table(), self.mode, self.config.max_hierarchy_depth);
        let result = resolver.resolve(&request, arg);
        if let DispatchResult::NoMatch(miss) = &result {
            if self.config.log_misses {
                debug!("{}", miss);
            }
        }
        result
    }

    /// Invokes the procedure `name` for the runtime class of `arg`, from a
    /// call site whose parameter is declared as `D`.
    ///
    /// Returns whether a candidate ran; a miss is a no-op.
    pub fn invoke<D: Class>(&self, subject: &S, name: &str, arg: Option<&dyn Class>) -> bool {
        self.invoke_dyn(subject, name, D::static_class(), arg)
    }

    /// Invokes the procedure `name`, running `fallback` on a miss.
    pub fn invoke_or_else<D, F>(
        &self,
        subject: &S,
        name: &str,
        arg: Option<&dyn Class>,
        fallback: F,
    ) where
        D: Class,
        F: FnOnce(),
    {
        if !self.invoke::<D>(subject, name, arg) {
            fallback()
        }
    }

    /// Procedure form with an explicit declared class.
    pub fn invoke_dyn(
        &self,
        subject: &S,
        name: &str,
        declared: ClassInfo,
        arg: Option<&dyn Class>,
    ) -> bool {
        let (DispatchResult::Resolved(candidate), Some(arg)) =
            (self.resolve(name, declared, None, arg), arg)
        else {
            return false;
        };
        match &candidate.callable {
            Callable::Procedure(procedure) => {
                procedure(subject, arg);
                true
            }
            Callable::Function(_) => false,
        }
    }

    /// Calls the function `name` from a call site declared as `D`, expecting
    /// `R`; `None` on a miss.
    pub fn try_call<D: Class, R: Class>(
        &self,
        subject: &S,
        name: &str,
        arg: Option<&dyn Class>,
    ) -> Option<R> {
        self.call_dyn(subject, name, D::static_class(), arg)
    }

    /// Calls the function `name`, `R::default()` on a miss.
    pub fn call<D, R>(&self, subject: &S, name: &str, arg: Option<&dyn Class>) -> R
    where
        D: Class,
        R: Class + Default,
    {
        self.try_call::<D, R>(subject, name, arg).unwrap_or_default()
    }

    /// Calls the function `name`, `default` on a miss.
    pub fn call_or<D: Class, R: Class>(
        &self,
        subject: &S,
        name: &str,
        arg: Option<&dyn Class>,
        default: R,
    ) -> R {
        self.try_call::<D, R>(subject, name, arg).unwrap_or(default)
    }

    /// Calls the function `name`, running `fallback` on a miss.
    pub fn call_or_else<D, R, F>(
        &self,
        subject: &S,
        name: &str,
        arg: Option<&dyn Class>,
        fallback: F,
    ) -> R
    where
        D: Class,
        R: Class,
        F: FnOnce() -> R,
    {
        self.try_call::<D, R>(subject, name, arg).unwrap_or_else(fallback)
    }

    /// Function form with an explicit declared class.
    pub fn call_dyn<R: Class>(
        &self,
        subject: &S,
        name: &str,
        declared: ClassInfo,
        arg: Option<&dyn Class>,
    ) -> Option<R> {
        let (DispatchResult::Resolved(candidate), Some(arg)) =
            (self.resolve(name, declared, Some(R::static_class()), arg), arg)
        else {
            return None;
        };
        match &candidate.callable {
            Callable::Function(function) => function(subject, arg).and_then(coerce::<R>),
            Callable::Procedure(_) => None,
        }
    }
}

impl<T: StaticDispatch> Dispatcher<TypeToken<T>> {
    /// A dispatcher over `T`'s type-level operations, sharing the
    /// process-wide table for `T`.
    pub fn for_type() -> Self {
        Self::for_type_in(ResolutionMode::Direct)
    }

    pub(crate) fn for_type_in(mode: ResolutionMode) -> Self {
        let config = DispatchConfig::shared();
        Self {
            table: OnceCell::with_value(type_table::<T>(&config)),
            mode,
            config,
        }
    }
}

impl<S: Dispatch> Default for Dispatcher<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("subject", &std::any::type_name::<S>())
            .field("mode", &self.mode)
            .field("built", &self.table.get().is_some())
            .finish()
    }
}

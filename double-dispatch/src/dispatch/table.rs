//! Candidate table construction.
//!
//! A subject enumerates its dispatchable operations once, through
//! [`Dispatch::register`], into a [`TableBuilder`]. The finished
//! [`CandidateTable`] is immutable.
//!
//! Procedures and functions are kept in separate partitions, each keyed by
//! operation name, then by declared parameter class, then by declared return
//! class (in registration order). The first registration of a signature wins;
//! later identical registrations are ignored, so building twice yields the
//! same table.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::{FxBuildHasher, FxHashMap};
use tracing::{debug, trace, warn};

use crate::class::{Class, ClassInfo, Object, TypeKind};
use crate::config::DispatchConfig;

use super::types::{Callable, Candidate, FunctionFn, ProcedureFn, SubjectKind};

/// A subject whose operations can be dispatched to at runtime.
pub trait Dispatch: Sized + 'static {
    /// Registers every operation of the subject's own surface.
    fn register(table: &mut TableBuilder<'_, Self>);

    /// `Value` subjects are exempt from surrogate identity checks.
    fn kind() -> TypeKind {
        TypeKind::Reference
    }

    fn subject_kind() -> SubjectKind {
        SubjectKind::Instance
    }
}

/// A type with type-level operations (no receiver) that can be dispatched to.
pub trait StaticDispatch: Sized + 'static {
    fn register_static(table: &mut TableBuilder<'_, TypeToken<Self>>);
}

/// Stand-in subject for type-level dispatch over `T`.
pub struct TypeToken<T>(PhantomData<fn() -> T>);

impl<T> TypeToken<T> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Clone for TypeToken<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypeToken<T> {}

impl<T> Default for TypeToken<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TypeToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeToken<{}>", type_name::<T>())
    }
}

impl<T: StaticDispatch> Dispatch for TypeToken<T> {
    fn register(table: &mut TableBuilder<'_, Self>) {
        T::register_static(table)
    }

    // Tokens are interchangeable copies.
    fn kind() -> TypeKind {
        TypeKind::Value
    }

    fn subject_kind() -> SubjectKind {
        SubjectKind::Type
    }
}

/// Candidates under one `(name, parameter)` key, keyed by return class.
pub(crate) type Overloads<S> = IndexMap<Option<TypeId>, Candidate<S>, FxBuildHasher>;

/// `parameter -> overloads` for one operation name.
pub(crate) type ParameterMap<S> = FxHashMap<TypeId, Overloads<S>>;

struct Partition<S> {
    entries: FxHashMap<String, ParameterMap<S>>,
    len: usize,
}

impl<S> Partition<S> {
    fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            len: 0,
        }
    }

    /// Returns false when the signature was already registered.
    fn insert(&mut self, candidate: Candidate<S>) -> bool {
        let overloads = self
            .entries
            .entry(candidate.name.clone())
            .or_default()
            .entry(candidate.parameter.id())
            .or_default();
        let key = candidate.returns.map(|returns| returns.id());
        if overloads.contains_key(&key) {
            return false;
        }
        overloads.insert(key, candidate);
        self.len += 1;
        true
    }

    fn candidates(&self) -> impl Iterator<Item = &Candidate<S>> {
        self.entries
            .values()
            .flat_map(|parameters| parameters.values())
            .flat_map(|overloads| overloads.values())
    }
}

/// Per-subject mapping from `(operation name, parameter class)` to candidates.
pub struct CandidateTable<S> {
    subject: &'static str,
    kind: SubjectKind,
    procedures: Partition<S>,
    functions: Partition<S>,
}

impl<S: Dispatch> CandidateTable<S> {
    /// Runs the subject's registration pass.
    pub fn build(config: &DispatchConfig) -> Self {
        let mut builder = TableBuilder::new(config);
        S::register(&mut builder);
        let skipped = builder.skipped;
        let table = builder.finish();
        debug!(
            "Built {:?} candidate table for {}: {} procedures, {} functions, {} skipped",
            table.kind,
            table.subject,
            table.procedure_count(),
            table.function_count(),
            skipped
        );
        table
    }
}

impl<S> CandidateTable<S> {
    /// Type name of the subject the table was built for.
    pub fn subject(&self) -> &'static str {
        self.subject
    }

    pub fn kind(&self) -> SubjectKind {
        self.kind
    }

    pub fn procedure_count(&self) -> usize {
        self.procedures.len
    }

    pub fn function_count(&self) -> usize {
        self.functions.len
    }

    pub fn len(&self) -> usize {
        self.procedures.len + self.functions.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The procedure registered under `(name, parameter)`.
    pub fn procedure(&self, name: &str, parameter: &ClassInfo) -> Option<&Candidate<S>> {
        self.procedures
            .entries
            .get(name)?
            .get(&parameter.id())?
            .values()
            .next()
    }

    /// Functions registered under `(name, parameter)`, in registration order.
    pub fn functions<'t>(
        &'t self,
        name: &str,
        parameter: &ClassInfo,
    ) -> impl Iterator<Item = &'t Candidate<S>> + 't {
        self.functions
            .entries
            .get(name)
            .and_then(|parameters| parameters.get(&parameter.id()))
            .into_iter()
            .flat_map(|overloads| overloads.values())
    }

    /// All candidates, procedures first.
    pub fn candidates(&self) -> impl Iterator<Item = &Candidate<S>> {
        self.procedures.candidates().chain(self.functions.candidates())
    }

    /// Sorted `name(parameter) -> return` signatures; equal for equivalent tables.
    pub fn signatures(&self) -> Vec<String> {
        let mut signatures: Vec<_> = self
            .candidates()
            .map(|candidate| match &candidate.returns {
                Some(returns) => {
                    format!("{}({}) -> {}", candidate.name, candidate.parameter, returns)
                }
                None => format!("{}({})", candidate.name, candidate.parameter),
            })
            .collect();
        signatures.sort();
        signatures
    }

    /// The parameter map of one partition for `name`.
    pub(crate) fn parameters(&self, name: &str, functions: bool) -> Option<&ParameterMap<S>> {
        let partition = if functions {
            &self.functions
        } else {
            &self.procedures
        };
        partition.entries.get(name)
    }
}

impl<S> fmt::Debug for CandidateTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateTable")
            .field("subject", &self.subject)
            .field("kind", &self.kind)
            .field("procedures", &self.procedures.len)
            .field("functions", &self.functions.len)
            .finish()
    }
}

/// Collects a subject's operations during its registration pass.
pub struct TableBuilder<'c, S> {
    config: &'c DispatchConfig,
    procedures: Partition<S>,
    functions: Partition<S>,
    skipped: usize,
}

impl<'c, S: Dispatch> TableBuilder<'c, S> {
    pub fn new(config: &'c DispatchConfig) -> Self {
        Self {
            config,
            procedures: Partition::new(),
            functions: Partition::new(),
            skipped: 0,
        }
    }

    /// Registers a procedure taking `&A`.
    ///
    /// Use [`procedure_any`](Self::procedure_any) for an `Object`-typed parameter.
    pub fn procedure<A, F>(&mut self, name: &str, procedure: F) -> &mut Self
    where
        A: Class,
        F: Fn(&S, &A) + Send + Sync + 'static,
    {
        if !self.check_typed_parameter::<A>(name) {
            return self;
        }
        let callable: ProcedureFn<S> = Arc::new(move |subject: &S, arg: &dyn Class| {
            if let Some(arg) = arg.upcast::<A>() {
                procedure(subject, arg)
            }
        });
        self.add(name, A::static_class(), None, Callable::Procedure(callable))
    }

    /// Registers a procedure taking any value (the universal parameter type).
    pub fn procedure_any<F>(&mut self, name: &str, procedure: F) -> &mut Self
    where
        F: Fn(&S, &dyn Class) + Send + Sync + 'static,
    {
        self.add(name, ClassInfo::object(), None, Callable::Procedure(Arc::new(procedure)))
    }

    /// Registers a function taking `&A` and returning `R`.
    pub fn function<A, R, F>(&mut self, name: &str, function: F) -> &mut Self
    where
        A: Class,
        R: Class,
        F: Fn(&S, &A) -> R + Send + Sync + 'static,
    {
        if !self.check_typed_parameter::<A>(name) {
            return self;
        }
        let callable: FunctionFn<S> = Arc::new(move |subject: &S, arg: &dyn Class| {
            arg.upcast::<A>()
                .map(|arg| Box::new(function(subject, arg)) as Box<dyn Class>)
        });
        self.add(
            name,
            A::static_class(),
            Some(R::static_class()),
            Callable::Function(callable),
        )
    }

    /// Registers a function taking any value and returning `R`.
    pub fn function_any<R, F>(&mut self, name: &str, function: F) -> &mut Self
    where
        R: Class,
        F: Fn(&S, &dyn Class) -> R + Send + Sync + 'static,
    {
        let callable: FunctionFn<S> = Arc::new(move |subject: &S, arg: &dyn Class| {
            Some(Box::new(function(subject, arg)) as Box<dyn Class>)
        });
        self.add(
            name,
            ClassInfo::object(),
            Some(R::static_class()),
            Callable::Function(callable),
        )
    }

    fn check_typed_parameter<A: Class>(&mut self, name: &str) -> bool {
        if TypeId::of::<A>() == TypeId::of::<Object>() {
            warn!(
                "Skipping `{}` on {}: Object parameters must be registered with the `_any` forms",
                name,
                type_name::<S>()
            );
            self.skipped += 1;
            return false;
        }
        true
    }

    fn add(
        &mut self,
        name: &str,
        parameter: ClassInfo,
        returns: Option<ClassInfo>,
        callable: Callable<S>,
    ) -> &mut Self {
        if name.is_empty() {
            debug!("Skipping unnamed operation on {}", type_name::<S>());
            self.skipped += 1;
            return self;
        }
        if parameter.is_object() && name == self.config.equality_operation {
            debug!(
                "Skipping equality operation `{}(Object)` on {}",
                name,
                type_name::<S>()
            );
            self.skipped += 1;
            return self;
        }

        let candidate = Candidate {
            declaring: type_name::<S>(),
            name: name.to_string(),
            parameter,
            returns,
            callable,
        };
        let partition = if returns.is_some() {
            &mut self.functions
        } else {
            &mut self.procedures
        };
        let signature = candidate.to_string();
        if !partition.insert(candidate) {
            trace!("Ignoring duplicate registration of {}", signature);
        }
        self
    }

    fn finish(self) -> CandidateTable<S> {
        CandidateTable {
            subject: type_name::<S>(),
            kind: S::subject_kind(),
            procedures: self.procedures,
            functions: self.functions,
        }
    }
}

impl<'c, T: StaticDispatch> TableBuilder<'c, TypeToken<T>> {
    /// Registers a type-level procedure.
    pub fn operation<A, F>(&mut self, name: &str, operation: F) -> &mut Self
    where
        A: Class,
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.procedure(name, move |_: &TypeToken<T>, arg: &A| operation(arg))
    }

    /// Registers a type-level function.
    pub fn operation_fn<A, R, F>(&mut self, name: &str, operation: F) -> &mut Self
    where
        A: Class,
        R: Class,
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        self.function(name, move |_: &TypeToken<T>, arg: &A| operation(arg))
    }
}

impl<S> fmt::Debug for TableBuilder<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableBuilder")
            .field("subject", &type_name::<S>())
            .field("procedures", &self.procedures.len)
            .field("functions", &self.functions.len)
            .field("skipped", &self.skipped)
            .finish()
    }
}

type TableCache = RwLock<FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

/// Type-level tables, built once per process.
static TYPE_TABLES: Lazy<TableCache> = Lazy::new(|| RwLock::new(FxHashMap::default()));

/// The cached type-level table for `T`, building it on first use.
///
/// The configuration of the first build sticks for the life of the process.
pub(crate) fn type_table<T: StaticDispatch>(
    config: &DispatchConfig,
) -> Arc<CandidateTable<TypeToken<T>>> {
    let key = TypeId::of::<T>();
    let cached = TYPE_TABLES.read().get(&key).cloned();
    if let Some(table) = cached.and_then(|table| table.downcast().ok()) {
        return table;
    }

    let built = Arc::new(CandidateTable::<TypeToken<T>>::build(config));
    let mut tables = TYPE_TABLES.write();
    let published = tables
        .entry(key)
        .or_insert_with(|| Arc::clone(&built) as Arc<dyn Any + Send + Sync>);
    Arc::clone(published).downcast().unwrap_or(built)
}

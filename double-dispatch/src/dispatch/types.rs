//! Core type definitions for dispatch resolution.

use std::fmt;
use std::sync::Arc;

use crate::class::{Class, ClassInfo};

/// Type-erased procedure: receives the subject and the argument view.
pub type ProcedureFn<S> = Arc<dyn Fn(&S, &dyn Class) + Send + Sync>;

/// Type-erased function. `None` when the argument has no view of the
/// declared parameter type.
pub type FunctionFn<S> = Arc<dyn Fn(&S, &dyn Class) -> Option<Box<dyn Class>> + Send + Sync>;

/// The invocable part of a candidate.
pub enum Callable<S> {
    /// No result.
    Procedure(ProcedureFn<S>),
    /// Produces a result of the candidate's declared return class.
    Function(FunctionFn<S>),
}

impl<S> Clone for Callable<S> {
    fn clone(&self) -> Self {
        match self {
            Callable::Procedure(f) => Callable::Procedure(Arc::clone(f)),
            Callable::Function(f) => Callable::Function(Arc::clone(f)),
        }
    }
}

/// Whether a table was enumerated from an instance or a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    /// Operations of an object instance.
    Instance,
    /// Type-level operations of a fixed type.
    Type,
}

/// How a call site resolves against its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionMode {
    /// Plain call site: the exact runtime class wins immediately.
    #[default]
    Direct,
    /// Surrogate call site: re-resolves through the runtime class, ignoring
    /// the class the wrapped method was written against.
    Surrogate,
}

/// A method candidate for dispatch resolution.
pub struct Candidate<S> {
    /// Type name of the subject that declared the candidate.
    pub declaring: &'static str,
    /// The operation name.
    pub name: String,
    /// Declared parameter class.
    pub parameter: ClassInfo,
    /// Declared return class; `None` for procedures.
    pub returns: Option<ClassInfo>,
    pub callable: Callable<S>,
}

impl<S> Candidate<S> {
    pub fn is_procedure(&self) -> bool {
        matches!(self.callable, Callable::Procedure(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self.callable, Callable::Function(_))
    }

    /// Covariance check against the caller's expected result class.
    ///
    /// Procedures accept only procedure call sites (`expected == None`);
    /// functions accept when their declared return is assignable to
    /// `expected`.
    pub fn accepts_result(&self, expected: Option<&ClassInfo>) -> bool {
        match (&self.returns, expected) {
            (None, None) => true,
            (Some(returns), Some(expected)) => returns.is_assignable_to(expected),
            _ => false,
        }
    }
}

impl<S> Clone for Candidate<S> {
    fn clone(&self) -> Self {
        Self {
            declaring: self.declaring,
            name: self.name.clone(),
            parameter: self.parameter,
            returns: self.returns,
            callable: self.callable.clone(),
        }
    }
}

impl<S> fmt::Debug for Candidate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("declaring", &self.declaring)
            .field("name", &self.name)
            .field("parameter", &self.parameter)
            .field("returns", &self.returns)
            .finish()
    }
}

impl<S> fmt::Display for Candidate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}({})", self.declaring, self.name, self.parameter)?;
        if let Some(returns) = &self.returns {
            write!(f, " -> {returns}")?;
        }
        Ok(())
    }
}

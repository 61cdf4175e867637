//! Runtime single-argument dispatch.
//!
//! This module selects which of a subject's operations to call based on the
//! runtime class of the argument rather than its declared type, so code
//! written against a base class reaches the overload for the derived class.
//!
//! # Algorithm Overview
//!
//! 1. **Collect candidates**: the subject registers its operations once into
//!    a candidate table keyed by name and parameter class
//! 2. **Probe exact**: look up the argument's runtime class
//! 3. **Walk the hierarchy**: on a miss, probe each superclass in turn (value
//!    classes probe the universal `Object` entry instead)
//! 4. **Check covariance**: functions match only when their declared return
//!    class is assignable to the caller's expected class
//! 5. **Invoke or fall back**: run the match, or the caller's fallback/default
//!
//! # Module Structure
//!
//! - [`types`] - Core type definitions (Candidate, Callable, etc.)
//! - [`table`] - Candidate table construction and type-level table cache
//! - [`result`] - Dispatch result types
//! - [`resolver`] - Main dispatch resolution algorithm
//! - [`facade`] - The per-subject dispatcher

mod facade;
mod resolver;
mod result;
mod table;
mod types;

#[cfg(test)]
mod tests;

pub use types::{
    Callable,
    Candidate,
    FunctionFn,
    ProcedureFn,
    ResolutionMode,
    SubjectKind,
};

pub use table::{
    CandidateTable,
    Dispatch,
    StaticDispatch,
    TableBuilder,
    TypeToken,
};

pub use result::{
    DispatchResult,
    MissReason,
    NoMatch,
};

pub use resolver::{
    Request,
    Resolver,
};

pub use facade::Dispatcher;

//! Runtime Double Dispatch
//!
//! This crate lets a subject route a call on a single argument to the most
//! specific of its own operations for the argument's runtime class, with no
//! visitor boilerplate on the argument's side:
//!
//! - Candidate tables enumerated once per subject
//! - Nearest-superclass resolution with covariant return selection
//! - Value classes falling back to an `Object`-typed operation
//! - Surrogates re-dispatching a bound method through the runtime class
//! - Type-level dispatch over a fixed type's operations
//! - Lock-free, exactly-once installation of composed facades
//!
//! # Architecture
//!
//! ```text
//! ┌─────────┐    ┌────────────┐    ┌──────────┐    ┌───────────┐
//! │ Subject │───►│ Dispatcher │───►│ Resolver │───►│ Candidate │
//! │  entry  │    │  (facade)  │    │  (walk)  │    │   Table   │
//! └─────────┘    └────────────┘    └──────────┘    └───────────┘
//!      │               ▲                                 ▲
//!      │ bind          │ ensure                          │ register
//!      ▼               │                                 │
//! ┌───────────┐   ┌──────────────┐                ┌─────────────┐
//! │ Surrogate │   │ DispatchSite │                │ TableBuilder│
//! └───────────┘   └──────────────┘                └─────────────┘
//! ```
//!
//! Classes are described with [`class!`]; derived classes embed their base
//! and name the field holding it. Misses are never errors: procedures become
//! no-ops or run a fallback, functions return a default.

pub mod class;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod surrogate;

pub use class::{Ancestors, Class, ClassInfo, Object, TypeKind};
pub use config::DispatchConfig;
pub use dispatch::{
    Candidate, CandidateTable, Dispatch, DispatchResult, Dispatcher, MissReason, NoMatch,
    ResolutionMode, StaticDispatch, SubjectKind, TableBuilder, TypeToken,
};
pub use error::{DispatchError, Result};
pub use guard::{ensure, ensure_dispatcher, DispatchSite};
pub use surrogate::{Bound, DispatchExt, Surrogate, SurrogateFn};

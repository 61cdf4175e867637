//! Dispatch result types.

use std::fmt;

use crate::class::ClassInfo;

use super::types::Candidate;

/// Result of dispatch resolution.
pub enum DispatchResult<'t, S> {
    /// A candidate matched.
    Resolved(&'t Candidate<S>),
    /// Nothing matched; the caller's fallback governs.
    NoMatch(NoMatch),
}

impl<'t, S> DispatchResult<'t, S> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, DispatchResult::Resolved(_))
    }

    pub fn candidate(&self) -> Option<&'t Candidate<S>> {
        match self {
            DispatchResult::Resolved(candidate) => Some(candidate),
            DispatchResult::NoMatch(_) => None,
        }
    }
}

impl<S> fmt::Debug for DispatchResult<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchResult::Resolved(candidate) => {
                f.debug_tuple("Resolved").field(candidate).finish()
            }
            DispatchResult::NoMatch(miss) => f.debug_tuple("NoMatch").field(miss).finish(),
        }
    }
}

/// Why resolution missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// The argument was absent; there is no runtime class to key on.
    NoArgument,
    /// No candidate of the requested form is registered under the name.
    UnknownName,
    /// Candidates exist under the name but none applies to the argument.
    NotApplicable,
    /// The superclass walk hit the configured depth bound.
    DepthExceeded,
}

/// A resolution miss.
#[derive(Debug, Clone)]
pub struct NoMatch {
    /// The operation that was requested.
    pub method_name: String,
    /// Runtime class of the argument, if there was one.
    pub arg_class: Option<ClassInfo>,
    /// Number of table keys probed.
    pub probes: usize,
    pub reason: MissReason,
}

impl fmt::Display for NoMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arg_class {
            Some(class) => write!(f, "no `{}` candidate for {}", self.method_name, class)?,
            None => write!(f, "no `{}` candidate for an absent argument", self.method_name)?,
        }
        write!(f, " ({:?} after {} probes)", self.reason, self.probes)
    }
}

//! Type-hierarchy resolution.
//!
//! Given an operation name and an argument, picks the most specific candidate
//! for the argument's runtime class:
//!
//! 1. An absent argument misses.
//! 2. The exact runtime class is probed first.
//! 3. Reference classes then walk their superclass chain, nearest first, up
//!    to (not including) the universal boundary.
//! 4. Value classes instead probe the universal `Object` entry.
//!
//! For functions every probe also applies the covariance check: a candidate
//! matches only if its declared return class is assignable to the caller's
//! expected class.
//!
//! An exact hit is accepted immediately, so the most specific same-class
//! overload always wins. The operation a caller routes through must not be
//! registered itself, or dispatch would select it and recurse.
//!
//! The mode only tags where a request came from. Surrogate call sites would
//! re-probe the runtime class at the start of the walk, but that probe repeats
//! the exact probe under the same covariance filter and is elided.

use tracing::{trace, warn};

use crate::class::{Class, ClassInfo};

use super::result::{DispatchResult, MissReason, NoMatch};
use super::table::{CandidateTable, ParameterMap};
use super::types::{Candidate, ResolutionMode};

/// What a call site asks for.
#[derive(Debug, Clone, Copy)]
pub struct Request<'n> {
    /// The operation name.
    pub name: &'n str,
    /// The call site's static parameter class.
    pub declared: ClassInfo,
    /// Expected result class; `None` for procedure calls.
    pub expected: Option<ClassInfo>,
}

impl<'n> Request<'n> {
    pub fn procedure(name: &'n str, declared: ClassInfo) -> Self {
        Self {
            name,
            declared,
            expected: None,
        }
    }

    pub fn function(name: &'n str, declared: ClassInfo, expected: ClassInfo) -> Self {
        Self {
            name,
            declared,
            expected: Some(expected),
        }
    }
}

/// Dispatch resolution over one candidate table.
#[derive(Debug)]
pub struct Resolver<'t, S> {
    table: &'t CandidateTable<S>,
    mode: ResolutionMode,
    max_depth: usize,
}

impl<'t, S> Resolver<'t, S> {
    pub fn new(table: &'t CandidateTable<S>, mode: ResolutionMode, max_depth: usize) -> Self {
        Self {
            table,
            mode,
            max_depth,
        }
    }

    /// Resolve `request` for the runtime class of `arg`.
    pub fn resolve(&self, request: &Request<'_>, arg: Option<&dyn Class>) -> DispatchResult<'t, S> {
        let Some(arg) = arg else {
            return self.miss(request, None, 0, MissReason::NoArgument);
        };
        let origin = arg.class();

        let Some(parameters) = self.table.parameters(request.name, request.expected.is_some())
        else {
            return self.miss(request, Some(origin), 0, MissReason::UnknownName);
        };

        // Exact runtime class first.
        let mut probes = 1;
        if let Some(candidate) = self.probe(parameters, &origin, request) {
            return self.hit(candidate, &origin, request);
        }

        if origin.is_value_type() {
            probes += 1;
            if let Some(candidate) = self.probe(parameters, &ClassInfo::object(), request) {
                return self.hit(candidate, &origin, request);
            }
            return self.miss(request, Some(origin), probes, MissReason::NotApplicable);
        }

        for (depth, ancestor) in origin.ancestors().enumerate() {
            if depth >= self.max_depth {
                warn!(
                    "Superclass walk from {} exceeded {} levels resolving `{}`",
                    origin, self.max_depth, request.name
                );
                return self.miss(request, Some(origin), probes, MissReason::DepthExceeded);
            }
            probes += 1;
            if let Some(candidate) = self.probe(parameters, &ancestor, request) {
                return self.hit(candidate, &origin, request);
            }
        }

        self.miss(request, Some(origin), probes, MissReason::NotApplicable)
    }

    /// First candidate under `class` that passes the covariance check.
    fn probe(
        &self,
        parameters: &'t ParameterMap<S>,
        class: &ClassInfo,
        request: &Request<'_>,
    ) -> Option<&'t Candidate<S>> {
        parameters
            .get(&class.id())?
            .values()
            .find(|candidate| candidate.accepts_result(request.expected.as_ref()))
    }

    fn hit(
        &self,
        candidate: &'t Candidate<S>,
        origin: &ClassInfo,
        request: &Request<'_>,
    ) -> DispatchResult<'t, S> {
        trace!(
            "Resolved {} for {} declared as {} ({:?})",
            candidate,
            origin,
            request.declared,
            self.mode
        );
        DispatchResult::Resolved(candidate)
    }

    fn miss(
        &self,
        request: &Request<'_>,
        arg_class: Option<ClassInfo>,
        probes: usize,
        reason: MissReason,
    ) -> DispatchResult<'t, S> {
        DispatchResult::NoMatch(NoMatch {
            method_name: request.name.to_string(),
            arg_class,
            probes,
            reason,
        })
    }
}

//! Lazy, exactly-once installation of a composed dispatch facade.
//!
//! A subject that holds its facade by composition keeps a [`DispatchSite`]
//! and routes every entry point through [`ensure`]. Racing callers may each
//! build a facade, but only the first compare-and-swap publishes; the others
//! drop their copy and use the winner's. No caller blocks.

use std::any::type_name;

use once_cell::race::OnceBox;
use tracing::debug;

use crate::dispatch::{Dispatch, Dispatcher};

/// A set-once slot for a subject's facade.
pub type DispatchSite<F> = OnceBox<F>;

/// Returns the facade in `site`, installing one built by `factory` if the
/// site is still empty.
pub fn ensure<'a, S, F>(
    subject: &S,
    site: &'a DispatchSite<F>,
    factory: impl FnOnce(&S) -> F,
) -> &'a F {
    site.get_or_init(|| {
        debug!("Building dispatch facade for {}", type_name::<S>());
        Box::new(factory(subject))
    })
}

/// [`ensure`] with a plain [`Dispatcher`] as the facade.
pub fn ensure_dispatcher<'a, S: Dispatch>(
    subject: &S,
    site: &'a DispatchSite<Dispatcher<S>>,
) -> &'a Dispatcher<S> {
    ensure(subject, site, |_| Dispatcher::new())
}

use once_cell::sync::Lazy;

use crate::Registry;

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Process-wide default registry, created on first access and never torn down.
///
/// Prefer passing a [`Registry`] explicitly, this one is for top-level convenience.
/// Unbound [`crate::Inject`] and [`crate::InjectAll`] fields resolve from it.
#[inline]
#[must_use]
pub fn global() -> &'static Registry {
    &GLOBAL_REGISTRY
}

//! Crate-local helpers.

use std::{fmt, hash::BuildHasherDefault};

type FxBuildHasher = BuildHasherDefault<rustc_hash::FxHasher>;

/// Hash maps/sets with a deterministic iteration order.
pub(crate) type Map<K, V> = indexmap::IndexMap<K, V, FxBuildHasher>;
pub(crate) type Set<T> = indexmap::IndexSet<T, FxBuildHasher>;

/// Wraps a formatting closure into a `Display` value.
pub(crate) fn display_fn<F>(f: F) -> impl fmt::Display
where
    F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
{
    struct DisplayFn<F>(F);

    impl<F> fmt::Display for DisplayFn<F>
    where
        F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
    {
        fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            (self.0)(formatter)
        }
    }

    DisplayFn(f)
}

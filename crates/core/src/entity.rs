//! Entity trait: identity that survives history prepends.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed document identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the document identifier.
    fn id(&self) -> &Self::Id;
}

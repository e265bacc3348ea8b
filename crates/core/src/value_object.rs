//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// An ancestor chain or a history entry has no identity of its own: two chains
/// listing the same ids in the same order are the same chain. That is what
/// makes "is this chain already current?" a plain equality check.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

//! Event kinds and wait identifiers.
//!
//! Waiters are bucketed by the concrete Rust type of the event they wait for.
//! The key is the type's [`TypeId`], so an event kind is a closed, hashable tag
//! rather than anything inspected at dispatch time.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use uuid::Uuid;

/// Discriminator used to bucket waits and incoming events.
#[derive(Clone, Copy)]
pub struct EventKind {
    id: TypeId,
    name: &'static str,
}

impl EventKind {
    /// The kind of events of type `E`.
    #[must_use]
    pub fn of<E: Any>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
        }
    }

    /// The runtime kind of a type-erased event.
    ///
    /// The type name is unknown for erased values; equality only uses the id.
    #[must_use]
    pub fn of_val(event: &dyn Any) -> Self {
        Self {
            id: event.type_id(),
            name: "<erased>",
        }
    }

    /// Underlying type id.
    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// Type name, for diagnostics only.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventKind {}

impl Hash for EventKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventKind").field(&self.name).finish()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Unique identifier for a registered wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitId(Uuid);

impl WaitId {
    /// Create a new random wait id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

}

impl Default for WaitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WaitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;
    struct Pong;

    #[test]
    fn kinds_compare_by_type() {
        assert_eq!(EventKind::of::<Ping>(), EventKind::of::<Ping>());
        assert_ne!(EventKind::of::<Ping>(), EventKind::of::<Pong>());
        assert!(EventKind::of::<Ping>().name().ends_with("Ping"));
    }

    #[test]
    fn erased_kind_matches_typed_kind() {
        let ev = Ping;
        let erased: &dyn Any = &ev;
        assert_eq!(EventKind::of_val(erased), EventKind::of::<Ping>());
    }

    #[test]
    fn wait_ids_are_unique() {
        assert_ne!(WaitId::new(), WaitId::new());
    }
}

//! Pre-computed type metadata flags.
//!
//! `TypeFlags` are computed once at interning time and cached, so questions
//! like "does this type mention CLIENTS anywhere?" are O(1).

use bitflags::bitflags;

use crate::Placement;

bitflags! {
    /// Pre-computed type properties.
    ///
    /// Presence flags propagate from children to parents; category flags
    /// describe only the outermost type constructor.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct TypeFlags: u32 {
        // === Presence Flags ===

        /// Contains a tensor type.
        const HAS_TENSOR = 1 << 0;
        /// Contains a function type.
        const HAS_FUNCTION = 1 << 1;
        /// Contains a federated type.
        const HAS_FEDERATED = 1 << 2;
        /// Contains the placement type.
        const HAS_PLACEMENT = 1 << 3;
        /// Contains a federated type placed at SERVER.
        const AT_SERVER = 1 << 4;
        /// Contains a federated type placed at CLIENTS.
        const AT_CLIENTS = 1 << 5;
        /// Contains a tensor whose shape is not fully defined.
        const HAS_UNKNOWN_SHAPE = 1 << 6;

        // === Category Flags ===

        const IS_TENSOR = 1 << 8;
        const IS_STRUCT = 1 << 9;
        const IS_FUNCTION = 1 << 10;
        const IS_FEDERATED = 1 << 11;
        const IS_PLACEMENT = 1 << 12;

        /// Flags that propagate to enclosing types.
        const PRESENCE = Self::HAS_TENSOR.bits()
            | Self::HAS_FUNCTION.bits()
            | Self::HAS_FEDERATED.bits()
            | Self::HAS_PLACEMENT.bits()
            | Self::AT_SERVER.bits()
            | Self::AT_CLIENTS.bits()
            | Self::HAS_UNKNOWN_SHAPE.bits();
    }
}

impl TypeFlags {
    /// Presence flag for a placement.
    pub const fn at(placement: Placement) -> Self {
        match placement {
            Placement::Server => Self::AT_SERVER,
            Placement::Clients => Self::AT_CLIENTS,
        }
    }

    /// The subset of `self` that an enclosing type inherits.
    #[inline]
    pub fn propagated(self) -> Self {
        self & Self::PRESENCE
    }
}

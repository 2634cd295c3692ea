//! Type handle.

use std::fmt;

/// A 32-bit index into a [`TypePool`](crate::TypePool).
///
/// Two handles from the same pool are equal iff the types are identical,
/// including struct field names.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    /// The empty struct `<>`, pre-interned.
    pub const UNIT: Self = Self(0);
    /// The placement type, pre-interned.
    pub const PLACEMENT: Self = Self(1);

    /// First index for dynamically interned types.
    pub const FIRST_DYNAMIC: u32 = 2;

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UNIT => write!(f, "TypeId::UNIT"),
            Self::PLACEMENT => write!(f, "TypeId::PLACEMENT"),
            _ => write!(f, "TypeId({})", self.0),
        }
    }
}

const _: () = assert!(std::mem::size_of::<TypeId>() == 4);

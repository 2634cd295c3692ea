//! Pre-computed node metadata flags.

use bitflags::bitflags;

bitflags! {
    /// Properties of a subtree, computed once at node construction.
    ///
    /// Every flag describes the whole subtree rooted at the node, so passes
    /// can skip subtrees that cannot contain what they rewrite.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct NodeFlags: u16 {
        const HAS_REFERENCE = 1 << 0;
        const HAS_LAMBDA = 1 << 1;
        const HAS_CALL = 1 << 2;
        const HAS_BLOCK = 1 << 3;
        const HAS_STRUCT = 1 << 4;
        const HAS_SELECTION = 1 << 5;
        const HAS_DATA = 1 << 6;
        const HAS_COMPILED = 1 << 7;
        const HAS_INTRINSIC = 1 << 8;
        /// Some node in the subtree has a type mentioning a federated type.
        const HAS_FEDERATED = 1 << 9;
        /// Some node in the subtree has a type mentioning CLIENTS.
        const HAS_CLIENTS = 1 << 10;
    }
}

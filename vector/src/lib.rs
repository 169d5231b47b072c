//! This crate provides a persistent vector with relaxed radix balancing (an
//! "RRB tree").
//!
//! [`Vector`] is an immutable sequence with cheap clones. Appending and
//! popping at the end are amortized constant time, indexing and updating are
//! `O(log n)`, and, unlike a plain bitmapped vector trie, so are
//! [concatenation](Vector::concat) and [slicing](Vector::slice). Every
//! operation returns a new vector sharing most of its structure with the old
//! one, which stays valid and unchanged.
//!
//! [`Transient`] is a single-owner builder over the same tree. It edits nodes
//! in place once it has claimed them, which makes batches of pushes, pops and
//! updates much cheaper. Converting it back with [`Transient::persistent`]
//! ends the editing session.
//!
//! The layout follows the description in L'orange's "Improving RRB-Tree
//! Performance through Transience": the rightmost leaf is kept outside the
//! tree as a tail, interior nodes only carry size tables when their subtrees
//! are not densely packed, and concatenation rebalances with the search-step
//! invariant.

mod concat;
mod metrics;
mod node;
mod slice;

pub mod transient;
pub mod vector;

pub use concat::{EXTRA_NODES, SEARCH_STEP_SLACK};
pub use transient::Transient;
pub use vector::Vector;

/// [`Vector`] takes a "branching factor" parameter, which must be a
/// reasonably-sized power of two. We use this trait to enforce that.
pub trait ValidBranchingConstant {}
pub struct Const<const N: usize> {}

impl ValidBranchingConstant for Const<2> {}
impl ValidBranchingConstant for Const<4> {}
impl ValidBranchingConstant for Const<8> {}
impl ValidBranchingConstant for Const<16> {}
impl ValidBranchingConstant for Const<32> {}
impl ValidBranchingConstant for Const<64> {}
impl ValidBranchingConstant for Const<128> {}

/// Errors returned by the fallible vector operations.
///
/// Misusing a [`Transient`] is not reported here: it is a programming error
/// and panics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Error {
    #[error("index {index} is out of range for a vector of length {len}")]
    OutOfRange { index: usize, len: usize },

    #[error("cannot pop from an empty vector")]
    Empty,

    #[error("invalid slice {from}..{to} of a vector of length {len}")]
    InvalidRange { from: usize, to: usize, len: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! Single-owner, in-place editing of a vector.
//!
//! A [`Transient`] is obtained from a [`Vector`] and turned back into one with
//! [`Transient::persistent`]. In between, the nodes it creates or copies are
//! stamped with a token identifying the editing session, and those nodes are
//! mutated in place instead of being copied again. Nodes shared with other
//! vectors never carry that token, so the vector the transient was made from
//! is never affected.

use std::{sync::Arc, thread::ThreadId};

use crate::{node::Edit, Const, Error, Result, ValidBranchingConstant, Vector};

/// A mutable builder over the same tree as [`Vector`].
///
/// A transient may only be used by the thread that created it, and not at all
/// after [`persistent`](Transient::persistent) was called. Both are
/// programming errors and panic.
///
/// # Examples
///
/// ```rust
/// # use rrb_vector::Vector;
/// let vec: Vector<_> = (0..10).collect();
/// let mut transient = vec.transient();
/// transient.push(10);
/// transient.update(0, 100).unwrap();
/// assert_eq!(transient.pop(), Ok(10));
/// let edited = transient.persistent();
///
/// assert_eq!(edited[0], 100);
/// assert_eq!(vec[0], 0);
/// ```
pub struct Transient<T, const N: usize = 32>
where
    Const<N>: ValidBranchingConstant,
{
    vec: Vector<T, N>,
    // `None` once the session has ended.
    edit: Option<Edit>,
    owner: ThreadId,
}

impl<T: Clone, const N: usize> Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    /// Starts an editing session on a copy of this vector.
    ///
    /// Only the tail is copied up front; the tree is copied node by node as
    /// the transient modifies it.
    pub fn transient(&self) -> Transient<T, N> {
        let edit = Edit::new();
        let mut vec = self.clone();
        vec.tail = Arc::new(self.tail.stamped(Some(&edit)));
        Transient {
            vec,
            edit: Some(edit),
            owner: std::thread::current().id(),
        }
    }
}

impl<T: Clone, const N: usize> Transient<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn check_transience(&self) {
        if self.edit.is_none() {
            panic!("transient used after it was made persistent");
        }
        if std::thread::current().id() != self.owner {
            panic!("transient used from a thread other than the one that created it");
        }
    }

    pub fn len(&self) -> usize {
        self.check_transience();
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.check_transience();
        self.vec.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.check_transience();
        self.vec.get(idx)
    }

    pub fn peek(&self) -> Option<&T> {
        self.check_transience();
        self.vec.peek()
    }

    pub fn push(&mut self, elt: T) {
        self.check_transience();
        self.vec.push_mut(elt, self.edit.as_ref());
    }

    pub fn pop(&mut self) -> Result<T> {
        self.check_transience();
        self.vec.pop_mut(self.edit.as_ref()).ok_or(Error::Empty)
    }

    pub fn update(&mut self, idx: usize, elt: T) -> Result<()> {
        self.check_transience();
        self.vec.update_mut(idx, elt, self.edit.as_ref())
    }

    /// Restricts this transient to the elements in `from..to`.
    ///
    /// On error, the transient is left unchanged.
    pub fn slice(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_transience();
        self.vec = self.vec.slice(from, to)?;
        Ok(())
    }

    /// Ends the editing session and returns the resulting vector.
    ///
    /// # Panics
    ///
    /// If called twice, or from another thread than the one that created the
    /// transient.
    pub fn persistent(&mut self) -> Vector<T, N> {
        self.check_transience();
        self.edit = None;
        let mut ret = std::mem::take(&mut self.vec);
        // Later sessions must not be able to edit the tail we hand out.
        ret.tail = Arc::new(ret.tail.stamped(None));
        ret
    }
}

impl<T: Clone, const N: usize> Extend<T> for Transient<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.check_transience();
        for elt in iter {
            self.vec.push_mut(elt, self.edit.as_ref());
        }
    }
}

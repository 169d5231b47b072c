use std::{
    fmt,
    hash::{Hash, Hasher},
    ops::Index,
    sync::Arc,
};

use imbl_sized_chunks::Chunk;

use crate::{
    node::{bits, Edit, Node},
    Const, Error, Result, ValidBranchingConstant,
};

type ChunkIter<T, const N: usize> = imbl_sized_chunks::sized_chunk::Iter<T, N>;
type InteriorChunkIter<T, const N: usize> = ChunkIter<Arc<Node<T, N>>, N>;

/// A persistent vector with relaxed radix balancing.
///
/// Clones are cheap, and every "modifying" method returns a new vector that
/// shares most of its structure with `self`. The parameter `N` is the
/// branching factor; it must be a power of 2 between 2 and 128.
///
/// The last (up to `N`) elements live in a tail leaf outside the tree, which
/// makes [`push`](Vector::push) and [`pop`](Vector::pop) touch the tree only
/// once every `N` operations.
pub struct Vector<T, const N: usize = 32>
where
    Const<N>: ValidBranchingConstant,
{
    pub(crate) len: usize,
    // The height of the tree, times the number of bits per level. Zero if
    // the root is a leaf or absent.
    pub(crate) shift: u32,
    pub(crate) root: Option<Arc<Node<T, N>>>,
    // Always a leaf. Only empty if the whole vector is.
    pub(crate) tail: Arc<Node<T, N>>,
}

impl<T, const N: usize> Clone for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn clone(&self) -> Self {
        Vector {
            len: self.len,
            shift: self.shift,
            root: self.root.clone(),
            tail: Arc::clone(&self.tail),
        }
    }
}

impl<T, const N: usize> Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    pub fn new() -> Self {
        Self {
            len: 0,
            shift: 0,
            root: None,
            tail: Arc::new(Node::empty_leaf()),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The index of the first element stored in the tail.
    pub(crate) fn tail_offset(&self) -> usize {
        self.len - self.tail.len()
    }

    /// Gets an element at a given index, or `None` if `idx` is out-of-bounds.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use rrb_vector::Vector;
    /// let vec: Vector<_> = (0..100).collect();
    /// assert_eq!(vec.get(42), Some(&42));
    /// assert_eq!(vec.get(100), None);
    /// ```
    pub fn get(&self, idx: usize) -> Option<&T> {
        if idx >= self.len {
            return None;
        }

        let tail_offset = self.tail_offset();
        if idx >= tail_offset {
            self.tail.data().get(idx - tail_offset)
        } else {
            self.root.as_ref().and_then(|r| r.get(self.shift, idx))
        }
    }

    /// The last element, or `None` if we're empty.
    pub fn peek(&self) -> Option<&T> {
        self.tail.data().last()
    }

    pub fn iter(&self) -> Iter<'_, T, N> {
        self.into_iter()
    }

    // Replaces single-child roots by their child.
    pub(crate) fn collapse_root(&mut self) {
        while let Some(Node::Interior { children, .. }) = self.root.as_deref() {
            if children.len() != 1 {
                break;
            }
            let child = Arc::clone(&children[0]);
            self.root = Some(child);
            self.shift -= bits::<N>();
            log::trace!("collapsed root, height is now {}", self.shift / bits::<N>());
        }
    }
}

impl<T: Clone, const N: usize> Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    /// Returns a copy of this vector with `elt` added at the end.
    ///
    /// Runs in amortized constant time; at worst `O(log n)`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use rrb_vector::Vector;
    /// let vec: Vector<_> = (0..32).collect();
    /// let longer = vec.push(32);
    /// assert_eq!(vec.len(), 32);
    /// assert_eq!(longer.len(), 33);
    /// assert_eq!(longer.get(32), Some(&32));
    /// ```
    pub fn push(&self, elt: T) -> Self {
        let mut ret = self.clone();
        ret.push_mut(elt, None);
        ret
    }

    /// Returns a copy of this vector without its last element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use rrb_vector::{Error, Vector};
    /// let vec: Vector<_> = (0..3).collect();
    /// assert_eq!(vec.pop().unwrap().iter().copied().collect::<Vec<_>>(), vec![0, 1]);
    /// assert_eq!(Vector::<i32>::new().pop(), Err(Error::Empty));
    /// ```
    pub fn pop(&self) -> Result<Self> {
        let mut ret = self.clone();
        ret.pop_mut(None).ok_or(Error::Empty)?;
        Ok(ret)
    }

    /// Returns a copy of this vector with the element at `idx` replaced by
    /// `elt`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use rrb_vector::{Error, Vector};
    /// let vec: Vector<_> = (0..100).collect();
    /// let updated = vec.update(42, 0).unwrap();
    /// assert_eq!(updated[42], 0);
    /// assert_eq!(vec[42], 42);
    /// assert_eq!(vec.update(100, 0), Err(Error::OutOfRange { index: 100, len: 100 }));
    /// ```
    pub fn update(&self, idx: usize, elt: T) -> Result<Self> {
        let mut ret = self.clone();
        ret.update_mut(idx, elt, None)?;
        Ok(ret)
    }

    pub(crate) fn push_mut(&mut self, elt: T, edit: Option<&Edit>) {
        if self.tail.len() < N {
            Node::claim(&mut self.tail, edit).data_mut().push_back(elt);
        } else {
            let new_tail = Arc::new(Node::leaf(Chunk::unit(elt), edit));
            self.push_tail_down(new_tail, edit);
        }
        self.len += 1;
    }

    pub(crate) fn pop_mut(&mut self, edit: Option<&Edit>) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let ret = Node::claim(&mut self.tail, edit).data_mut().pop_back();
        self.len -= 1;
        if self.tail.len() == 0 && self.root.is_some() {
            self.promote_rightmost_leaf(edit);
        }
        Some(ret)
    }

    pub(crate) fn update_mut(&mut self, idx: usize, elt: T, edit: Option<&Edit>) -> Result<()> {
        if idx >= self.len {
            return Err(Error::OutOfRange {
                index: idx,
                len: self.len,
            });
        }

        let tail_offset = self.tail_offset();
        if idx >= tail_offset {
            Node::claim(&mut self.tail, edit).data_mut()[idx - tail_offset] = elt;
        } else {
            let root = self.root.as_mut().expect("index in tree but no root");
            Node::update(root, self.shift, idx, elt, edit);
        }
        Ok(())
    }

    /// Moves the current tail into the tree and installs `new_tail` instead.
    ///
    /// `self.len` is not adjusted: it still counts the old tail, which is how
    /// we know how big the tree is.
    pub(crate) fn push_tail_down(&mut self, new_tail: Arc<Node<T, N>>, edit: Option<&Edit>) {
        let tree_size = self.tail_offset();
        let old_tail = std::mem::replace(&mut self.tail, new_tail);
        let leaf_len = old_tail.len();

        let Some(root) = self.root.as_mut() else {
            self.root = Some(old_tail);
            self.shift = 0;
            return;
        };

        if root.has_room(self.shift) {
            Node::push_leaf(root, self.shift, tree_size, old_tail, edit);
        } else {
            // No room anywhere on the right spine: the old root becomes the
            // left child of a new root.
            let shift = self.shift + bits::<N>();
            let sizes = if tree_size == 1 << shift {
                None
            } else {
                Some(Arc::new(Chunk::pair(tree_size, tree_size + leaf_len)))
            };
            let children = Chunk::pair(Arc::clone(root), Node::shaft(old_tail, self.shift, edit));
            self.root = Some(Arc::new(Node::Interior {
                children,
                sizes,
                edit: edit.cloned(),
            }));
            self.shift = shift;
            log::trace!("tree grew to height {}", shift / bits::<N>());
        }
    }

    /// Removes the rightmost leaf of the tree and makes it the tail, dropping
    /// the current tail.
    pub(crate) fn promote_rightmost_leaf(&mut self, edit: Option<&Edit>) {
        let Some(root) = self.root.as_mut() else {
            self.tail = Arc::new(Node::empty_leaf());
            return;
        };

        let (leaf, emptied) = Node::pop_leaf(root, self.shift, edit);
        if emptied {
            self.root = None;
            self.shift = 0;
        } else {
            self.collapse_root();
        }
        self.tail = leaf;
    }

    /// Checks the structural invariants of the tree, panicking if any of them
    /// is broken.
    pub fn check_invariants(&self) {
        fn check_rec<T, const N: usize>(node: &Node<T, N>, shift: u32) -> usize {
            match node {
                Node::Leaf { data, .. } => {
                    assert_eq!(shift, 0, "leaf above height zero");
                    assert!(!data.is_empty(), "empty leaf in the tree");
                    data.len()
                }
                Node::Interior {
                    children, sizes, ..
                } => {
                    assert!(shift > 0, "interior node at height zero");
                    assert!(!children.is_empty(), "empty interior node");
                    let child_sizes: Vec<usize> = children
                        .iter()
                        .map(|c| check_rec(c, shift - bits::<N>()))
                        .collect();
                    match sizes {
                        Some(sizes) => {
                            assert_eq!(sizes.len(), children.len());
                            let mut sum = 0;
                            for (size, child_size) in sizes.iter().zip(&child_sizes) {
                                sum += child_size;
                                assert_eq!(*size, sum, "stale size table");
                            }
                        }
                        None => {
                            let (_, init) = child_sizes.split_last().expect("empty interior node");
                            assert!(
                                init.iter().all(|s| *s == 1 << shift),
                                "incomplete child in a node without size table"
                            );
                        }
                    }
                    child_sizes.iter().sum()
                }
            }
        }

        let tail_len = self.tail.len();
        assert!(tail_len <= N);
        assert_eq!(self.is_empty(), tail_len == 0);
        assert_eq!(self.shift % bits::<N>(), 0);

        let tree_size = match &self.root {
            None => {
                assert_eq!(self.shift, 0);
                0
            }
            Some(root) => {
                let size = check_rec(root, self.shift);
                assert_eq!(size, root.size_sub_trie(self.shift));
                size
            }
        };
        assert_eq!(self.len, tree_size + tail_len);
    }
}

#[derive(Debug, Clone)]
pub struct Iter<'a, T, const N: usize> {
    stack: Vec<std::slice::Iter<'a, Arc<Node<T, N>>>>,
    leaf: std::slice::Iter<'a, T>,
    tail: &'a [T],
    remaining: usize,
}

impl<'a, T, const N: usize> Iter<'a, T, N> {
    // Pushes the path down to the leftmost leaf of `node` onto the stack.
    fn descend(&mut self, node: &'a Node<T, N>) {
        let mut node = node;
        loop {
            match node {
                Node::Leaf { data, .. } => {
                    self.leaf = data.iter();
                    return;
                }
                Node::Interior { children, .. } => {
                    let mut children_iter = children.iter();
                    let Some(first) = children_iter.next() else {
                        return;
                    };
                    self.stack.push(children_iter);
                    node = first;
                }
            }
        }
    }
}

impl<'a, T, const N: usize> Iterator for Iter<'a, T, N> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(ret) = self.leaf.next() {
                self.remaining -= 1;
                return Some(ret);
            }

            let next = loop {
                match self.stack.last_mut() {
                    Some(iter) => match iter.next() {
                        Some(next) => break Some(next),
                        None => {
                            self.stack.pop();
                        }
                    },
                    None => break None,
                }
            };

            match next {
                Some(node) => self.descend(node),
                None if !self.tail.is_empty() => self.leaf = std::mem::take(&mut self.tail).iter(),
                None => return None,
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, const N: usize> ExactSizeIterator for Iter<'_, T, N> {}

pub struct IntoIter<T, const N: usize> {
    stack: Vec<InteriorChunkIter<T, N>>,
    leaf: ChunkIter<T, N>,
    tail: Option<Arc<Node<T, N>>>,
    remaining: usize,
}

impl<T: Clone, const N: usize> IntoIter<T, N> {
    fn descend(&mut self, node: Arc<Node<T, N>>) {
        let mut node = node;
        loop {
            match Arc::unwrap_or_clone(node) {
                Node::Leaf { data, .. } => {
                    self.leaf = data.into_iter();
                    return;
                }
                Node::Interior { children, .. } => {
                    let mut children_iter = children.into_iter();
                    let Some(first) = children_iter.next() else {
                        return;
                    };
                    self.stack.push(children_iter);
                    node = first;
                }
            }
        }
    }
}

impl<T: Clone, const N: usize> Iterator for IntoIter<T, N> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(ret) = self.leaf.next() {
                self.remaining -= 1;
                return Some(ret);
            }

            let next = loop {
                match self.stack.last_mut() {
                    Some(iter) => match iter.next() {
                        Some(next) => break Some(next),
                        None => {
                            self.stack.pop();
                        }
                    },
                    None => break self.tail.take(),
                }
            };

            self.descend(next?);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: Clone, const N: usize> ExactSizeIterator for IntoIter<T, N> {}

impl<'a, T, const N: usize> IntoIterator for &'a Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T, N>;

    fn into_iter(self) -> Self::IntoIter {
        let mut iter = Iter {
            stack: Vec::with_capacity((self.shift / bits::<N>()) as usize),
            leaf: [].iter(),
            tail: self.tail.data(),
            remaining: self.len,
        };
        if let Some(root) = &self.root {
            iter.descend(root);
        }
        iter
    }
}

impl<T: Clone, const N: usize> IntoIterator for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    type Item = T;
    type IntoIter = IntoIter<T, N>;

    fn into_iter(self) -> Self::IntoIter {
        let mut iter = IntoIter {
            stack: Vec::with_capacity((self.shift / bits::<N>()) as usize),
            leaf: Chunk::new().into_iter(),
            tail: Some(self.tail),
            remaining: self.len,
        };
        if let Some(root) = self.root {
            iter.descend(root);
        }
        iter
    }
}

impl<T: Clone, const N: usize> Extend<T> for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let mut transient = self.transient();
        transient.extend(iter);
        *self = transient.persistent();
    }
}

impl<T, const N: usize> Default for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, const N: usize> FromIterator<T> for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut ret = Vector::default();
        ret.extend(iter);
        ret
    }
}

impl<T, const N: usize> Index<usize> for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.get(index).expect("index out of range")
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq, const N: usize> PartialEq for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Eq, const N: usize> Eq for Vector<T, N> where Const<N>: ValidBranchingConstant {}

impl<T: Hash, const N: usize> Hash for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len.hash(state);
        for elt in self {
            elt.hash(state);
        }
    }
}

impl<T: serde::Serialize, const N: usize> serde::Serialize for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;

        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for elt in self.iter() {
            seq.serialize_element(elt)?;
        }
        seq.end()
    }
}

impl<'de, T: Clone + serde::Deserialize<'de>, const N: usize> serde::Deserialize<'de>
    for Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let vec: Vec<T> = Vec::deserialize(deserializer)?;
        Ok(vec.into_iter().collect())
    }
}

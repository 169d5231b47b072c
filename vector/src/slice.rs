//! Slicing a vector down to a sub-range.
//!
//! The right end is trimmed first, then the left end. Each trim copies only
//! the nodes along the path to the cut; everything strictly inside the range
//! is shared with the original vector.

use std::sync::Arc;

use imbl_sized_chunks::Chunk;

use crate::{
    node::{bits, Children, Node, SizeTable},
    Const, Error, Result, ValidBranchingConstant, Vector,
};

impl<T: Clone, const N: usize> Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    /// Returns the elements in `from..to`, in `O(log n)` time.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use rrb_vector::{Error, Vector};
    /// let vec: Vector<_> = (0..6).collect();
    /// let sliced = vec.slice(1, 5).unwrap();
    /// assert_eq!(sliced.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    /// assert!(vec.slice(3, 3).unwrap().is_empty());
    /// assert_eq!(vec.slice(4, 2), Err(Error::InvalidRange { from: 4, to: 2, len: 6 }));
    /// ```
    pub fn slice(&self, from: usize, to: usize) -> Result<Self> {
        if from > to || to > self.len {
            return Err(Error::InvalidRange {
                from,
                to,
                len: self.len,
            });
        }
        Ok(self.slice_right(to).slice_left(from))
    }

    /// Keeps the first `right` elements.
    fn slice_right(&self, right: usize) -> Self {
        if right == 0 {
            return Self::new();
        }
        if right >= self.len {
            return self.clone();
        }

        let tail_offset = self.tail_offset();
        if right > tail_offset {
            let tail = self.tail.data();
            let data = tail.iter().take(right - tail_offset).cloned().collect();
            return Vector {
                len: right,
                shift: self.shift,
                root: self.root.clone(),
                tail: Arc::new(Node::leaf(data, None)),
            };
        }

        let root = self.root.as_ref().expect("non-empty tree without a root");
        let (root, shift) = slice_right_rec(root, self.shift, right - 1, false);
        let mut ret = Vector {
            len: right,
            shift,
            root: Some(root),
            tail: Arc::new(Node::empty_leaf()),
        };
        // The tail has to be the last leaf.
        ret.promote_rightmost_leaf(None);
        ret
    }

    /// Drops the first `left` elements.
    fn slice_left(&self, left: usize) -> Self {
        if left >= self.len {
            return Self::new();
        }

        let remaining = self.len - left;
        let tail_len = self.tail.len();
        if remaining <= tail_len {
            let tail = self.tail.data();
            let data = tail.iter().skip(tail_len - remaining).cloned().collect();
            return Vector {
                len: remaining,
                shift: 0,
                root: None,
                tail: Arc::new(Node::leaf(data, None)),
            };
        }

        let mut ret = self.clone();
        if left > 0 {
            let root = self.root.as_ref().expect("non-empty tree without a root");
            let (root, shift) = slice_left_rec(root, self.shift, left, false);
            ret.root = Some(root);
            ret.shift = shift;
            ret.len = remaining;
            ret.collapse_root();
        }
        ret.fold_small_root();
        ret
    }

    /// If the whole tree is one leaf, moves elements from the tail into it, or
    /// merges it into the tail if they fit together.
    fn fold_small_root(&mut self) {
        if self.shift != 0 {
            return;
        }
        let Some(root) = &self.root else {
            return;
        };

        let root_len = root.len();
        let tail = self.tail.data();
        if self.len <= N {
            let data = root.data().iter().chain(tail.iter()).cloned().collect();
            self.tail = Arc::new(Node::leaf(data, None));
            self.root = None;
        } else if root_len < N {
            let cut = N - root_len;
            let mut data = root.data().clone();
            data.extend(tail.iter().take(cut).cloned());
            let new_tail = tail.iter().skip(cut).cloned().collect();
            self.root = Some(Arc::new(Node::leaf(data, None)));
            self.tail = Arc::new(Node::leaf(new_tail, None));
        }
    }
}

/// Keeps the elements of `node` up to and including `right`, returning the
/// trimmed node and its height.
///
/// Unless `has_left` is set, single-child nodes along the way are dropped, so
/// the result may be lower than `node`.
fn slice_right_rec<T: Clone, const N: usize>(
    node: &Arc<Node<T, N>>,
    shift: u32,
    right: usize,
    has_left: bool,
) -> (Arc<Node<T, N>>, u32) {
    match &**node {
        Node::Leaf { data, .. } => {
            if right + 1 == data.len() {
                (Arc::clone(node), 0)
            } else {
                let data = data.iter().take(right + 1).cloned().collect();
                (Arc::new(Node::leaf(data, None)), 0)
            }
        }
        Node::Interior {
            children, sizes, ..
        } => {
            let (slot, rel) = node.position(shift, right);
            let sub_shift = shift - bits::<N>();
            let (child, child_shift) =
                slice_right_rec(&children[slot], sub_shift, rel, has_left || slot > 0);
            if slot == 0 && !has_left {
                return (child, child_shift);
            }

            let mut new_children: Children<T, N> = children.iter().take(slot).cloned().collect();
            new_children.push_back(child);
            let sizes = sizes.as_ref().map(|sizes| {
                let mut new_sizes: SizeTable<N> = sizes.iter().take(slot).copied().collect();
                new_sizes.push_back(right + 1);
                Arc::new(new_sizes)
            });
            let node = Node::Interior {
                children: new_children,
                sizes,
                edit: None,
            };
            (Arc::new(node), shift)
        }
    }
}

/// Drops the elements of `node` before `left`, returning the trimmed node and
/// its height.
///
/// Unless `has_right` is set, single-child nodes along the way are dropped.
fn slice_left_rec<T: Clone, const N: usize>(
    node: &Arc<Node<T, N>>,
    shift: u32,
    left: usize,
    has_right: bool,
) -> (Arc<Node<T, N>>, u32) {
    match &**node {
        Node::Leaf { data, .. } => {
            if left == 0 {
                (Arc::clone(node), 0)
            } else {
                let data = data.iter().skip(left).cloned().collect();
                (Arc::new(Node::leaf(data, None)), 0)
            }
        }
        Node::Interior {
            children, sizes, ..
        } => {
            let (slot, rel) = node.position(shift, left);
            let last_slot = children.len() - 1;
            let child_shift = shift - bits::<N>();
            // Only the last slot can lose all its right siblings.
            let has_right = has_right || slot < last_slot;
            let (child, sub_shift) = slice_left_rec(&children[slot], child_shift, rel, has_right);

            if slot == last_slot {
                if !has_right {
                    return (child, sub_shift);
                }
                let node = Node::Interior {
                    children: Chunk::unit(child),
                    sizes: None,
                    edit: None,
                };
                return (Arc::new(node), shift);
            }

            let new_sizes: SizeTable<N> = match sizes {
                Some(sizes) => sizes.iter().skip(slot).map(|s| s - left).collect(),
                None => {
                    let size = node.size_sub_trie(shift);
                    (slot..last_slot)
                        .map(|j| ((j + 1) << shift) - left)
                        .chain(std::iter::once(size - left))
                        .collect()
                }
            };
            let dense = new_sizes
                .iter()
                .take(new_sizes.len() - 1)
                .enumerate()
                .all(|(i, s)| *s == (i + 1) << shift);

            let mut new_children = Chunk::unit(child);
            new_children.extend(children.iter().skip(slot + 1).cloned());
            let node = Node::Interior {
                children: new_children,
                sizes: (!dense).then(|| Arc::new(new_sizes)),
                edit: None,
            };
            (Arc::new(node), shift)
        }
    }
}

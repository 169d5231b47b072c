//! Concatenation of two vectors.
//!
//! The two trees are zipped together along the seam between the left tree's
//! right spine and the right tree's left spine. At every level, the nodes on
//! either side of the seam are rebalanced so that the tree stays shallow: a
//! node with at most `N - SEARCH_STEP_SLACK` slots has its contents shifted
//! into its right neighbours, until the level has at most `EXTRA_NODES` more
//! nodes than strictly necessary.

use std::{cmp::Ordering, sync::Arc};

use imbl_sized_chunks::Chunk;

use crate::{
    metrics::increment,
    node::{bits, Children, Node},
    Const, ValidBranchingConstant, Vector,
};

/// Nodes with more than `N - SEARCH_STEP_SLACK` slots are left alone by the
/// rebalancing pass.
pub const SEARCH_STEP_SLACK: usize = 1;

/// The number of nodes a rebalanced level may have on top of the minimum.
pub const EXTRA_NODES: usize = 2;

impl<T: Clone, const N: usize> Vector<T, N>
where
    Const<N>: ValidBranchingConstant,
{
    /// Returns the concatenation of `self` and `other`, in `O(log n)` time.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use rrb_vector::Vector;
    /// let left: Vector<_> = (0..50).collect();
    /// let right: Vector<_> = (50..100).collect();
    /// let both = left.concat(&right);
    /// assert_eq!(both.len(), 100);
    /// assert!(both.iter().copied().eq(0..100));
    /// ```
    pub fn concat(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }

        let Some(right_root) = &other.root else {
            return self.concat_tail(other);
        };

        // The left tail goes into the tree even if it isn't full: the seam
        // rebalancing takes care of it.
        let mut left = self.clone();
        left.push_tail_down(Arc::new(Node::empty_leaf()), None);
        let left_root = left.root.as_ref().expect("non-empty tree without a root");

        let mut nodes = concat_sub_tree(left_root, left.shift, right_root, other.shift, true);
        let shift = left.shift.max(other.shift);
        let (root, shift) = match nodes.len() {
            1 => (nodes.pop_back(), shift),
            _ => {
                let shift = shift + bits::<N>();
                log::trace!(
                    "concatenation grew the tree to height {}",
                    shift / bits::<N>()
                );
                (Arc::new(Node::interior(nodes, shift, None)), shift)
            }
        };

        let mut ret = Vector {
            len: self.len + other.len,
            shift,
            root: Some(root),
            tail: Arc::clone(&other.tail),
        };
        ret.collapse_root();
        ret
    }

    // `other` lives entirely in its tail.
    fn concat_tail(&self, other: &Self) -> Self {
        let mut ret = self.clone();
        let left_len = self.tail.len();
        let right = other.tail.data();

        if left_len == N {
            ret.push_tail_down(Arc::clone(&other.tail), None);
        } else if left_len + right.len() <= N {
            Node::claim(&mut ret.tail, None)
                .data_mut()
                .extend(right.iter().cloned());
        } else {
            // Fill up our tail, push it down, and keep the rest.
            let cut = N - left_len;
            Node::claim(&mut ret.tail, None)
                .data_mut()
                .extend(right.iter().take(cut).cloned());
            ret.len += cut;
            let new_tail = Node::leaf(right.iter().skip(cut).cloned().collect(), None);
            ret.push_tail_down(Arc::new(new_tail), None);
        }

        ret.len = self.len + other.len;
        ret
    }
}

/// Zips `left` and `right` together, returning one or two nodes at the height
/// of the taller of them.
fn concat_sub_tree<T: Clone, const N: usize>(
    left: &Arc<Node<T, N>>,
    left_shift: u32,
    right: &Arc<Node<T, N>>,
    right_shift: u32,
    is_top: bool,
) -> Children<T, N> {
    match left_shift.cmp(&right_shift) {
        Ordering::Greater => {
            let last = left.children().last().expect("empty interior node");
            let centre = concat_sub_tree(last, left_shift - bits::<N>(), right, right_shift, false);
            rebalance(Some(left), centre, None, left_shift)
        }
        Ordering::Less => {
            let first = right.children().first().expect("empty interior node");
            let centre = concat_sub_tree(left, left_shift, first, right_shift - bits::<N>(), false);
            rebalance(None, centre, Some(right), right_shift)
        }
        // Merging leaves anywhere but at the top would require shifting
        // everything to their right.
        Ordering::Equal if left_shift == 0 => {
            if is_top && left.len() + right.len() <= N {
                let mut data = left.data().clone();
                data.extend(right.data().iter().cloned());
                Chunk::unit(Arc::new(Node::leaf(data, None)))
            } else {
                Chunk::pair(Arc::clone(left), Arc::clone(right))
            }
        }
        Ordering::Equal => {
            let last = left.children().last().expect("empty interior node");
            let first = right.children().first().expect("empty interior node");
            let child_shift = left_shift - bits::<N>();
            let centre = concat_sub_tree(last, child_shift, first, child_shift, false);
            rebalance(Some(left), centre, Some(right), left_shift)
        }
    }
}

/// Merges the children of `left` (but its last), `centre` and the children of
/// `right` (but its first), all of which sit just below `shift`, into one or
/// two nodes at height `shift`.
fn rebalance<T: Clone, const N: usize>(
    left: Option<&Arc<Node<T, N>>>,
    centre: Children<T, N>,
    right: Option<&Arc<Node<T, N>>>,
    shift: u32,
) -> Children<T, N> {
    increment!("rrb::concat::rebalance");
    let mut all = Vec::with_capacity(2 * N);
    if let Some(left) = left {
        let (_, init) = left.children().split_last().expect("empty interior node");
        all.extend(init.iter().cloned());
    }
    all.extend(centre);
    if let Some(right) = right {
        all.extend(right.children().iter().skip(1).cloned());
    }

    let plan = concat_plan::<N>(all.iter().map(|n| n.len()).collect());
    let mut merged = execute_concat_plan(&all, &plan, shift);

    if merged.len() <= N {
        let node = Node::interior(merged.into_iter().collect(), shift, None);
        Chunk::unit(Arc::new(node))
    } else {
        increment!("rrb::concat::split");
        log::trace!(
            "rebalanced {} nodes into {}, splitting",
            all.len(),
            merged.len()
        );
        let rest: Children<T, N> = merged.drain(N..).collect();
        let first: Children<T, N> = merged.into_iter().collect();
        Chunk::pair(
            Arc::new(Node::interior(first, shift, None)),
            Arc::new(Node::interior(rest, shift, None)),
        )
    }
}

/// Given the slot counts of a row of sibling nodes, computes the slot counts
/// after rebalancing. Elements keep their order, so the plan is enough to
/// redistribute them.
pub(crate) fn concat_plan<const N: usize>(mut counts: Vec<usize>) -> Vec<usize> {
    let total: usize = counts.iter().sum();
    let optimal = total.div_ceil(N);

    let mut i = 0;
    while optimal + EXTRA_NODES < counts.len() {
        while counts[i] > N - SEARCH_STEP_SLACK {
            i += 1;
        }

        // Spill this short node into its neighbours until one of them
        // absorbs the remainder.
        let mut remaining = counts[i];
        loop {
            let size = (remaining + counts[i + 1]).min(N);
            remaining = remaining + counts[i + 1] - size;
            counts[i] = size;
            i += 1;
            if remaining == 0 {
                break;
            }
        }

        counts.remove(i);
        i -= 1;
    }

    counts
}

fn execute_concat_plan<T: Clone, const N: usize>(
    all: &[Arc<Node<T, N>>],
    plan: &[usize],
    shift: u32,
) -> Vec<Arc<Node<T, N>>> {
    let child_shift = shift - bits::<N>();
    let mut ret = Vec::with_capacity(plan.len());
    // The next old node to copy from, and how much of it was already copied.
    let mut idx = 0;
    let mut offset = 0;

    for &size in plan {
        let old = &all[idx];
        if offset == 0 && size == old.len() {
            ret.push(Arc::clone(old));
            idx += 1;
            continue;
        }

        let node = if child_shift == 0 {
            let data = take_slots(all, &mut idx, &mut offset, size, Node::data);
            Node::leaf(data, None)
        } else {
            let children = take_slots(all, &mut idx, &mut offset, size, Node::children);
            Node::interior(children, child_shift, None)
        };
        ret.push(Arc::new(node));
    }

    ret
}

fn take_slots<T, U: Clone, const N: usize>(
    all: &[Arc<Node<T, N>>],
    idx: &mut usize,
    offset: &mut usize,
    size: usize,
    slots: fn(&Node<T, N>) -> &Chunk<U, N>,
) -> Chunk<U, N> {
    let mut ret = Chunk::new();
    while ret.len() < size {
        let old = slots(&all[*idx]);
        let wanted = size - ret.len();
        let available = old.len() - *offset;
        let taken = wanted.min(available);
        ret.extend(old.iter().skip(*offset).take(taken).cloned());
        if taken == available {
            *idx += 1;
            *offset = 0;
        } else {
            *offset += taken;
        }
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan() {
        assert_eq!(concat_plan::<4>(vec![1; 8]), vec![4, 2, 1, 1]);
        assert_eq!(concat_plan::<4>(vec![4, 4, 4]), vec![4, 4, 4]);
        assert_eq!(concat_plan::<4>(vec![2; 8]), vec![4, 4, 2, 2, 2, 2]);

        let plan = concat_plan::<32>(vec![31, 2, 20, 32, 32, 5, 5, 5, 5, 1]);
        assert_eq!(plan.iter().sum::<usize>(), 138);
        assert!(plan.len() <= 5 + EXTRA_NODES);
        assert!(plan.iter().all(|&c| c > 0 && c <= 32));
    }

    #[test]
    fn fifty_and_fifty() {
        let left: Vector<usize> = (0..50).fold(Vector::new(), |v, i| v.push(i));
        let right: Vector<usize> = (50..100).fold(Vector::new(), |v, i| v.push(i));
        let both = left.concat(&right);
        both.check_invariants();
        assert_eq!(both.len(), 100);
        assert_eq!(both.get(49), Some(&49));
        assert_eq!(both.get(50), Some(&50));
        assert!(both.iter().copied().eq(0..100));

        // The operands are untouched.
        assert!(left.iter().copied().eq(0..50));
        assert!(right.iter().copied().eq(50..100));
    }

    #[test]
    fn empty_and_tail_only() {
        let empty = Vector::<usize, 4>::new();
        let small: Vector<usize, 4> = (0..3).collect();
        let full: Vector<usize, 4> = (0..4).collect();
        let big: Vector<usize, 4> = (0..37).collect();

        assert_eq!(empty.concat(&empty), empty);
        assert_eq!(empty.concat(&big), big);
        assert_eq!(big.concat(&empty), big);

        for (a, b) in [
            (&small, &small),
            (&full, &small),
            (&small, &full),
            (&big, &small),
            (&big, &full),
        ] {
            let both = a.concat(b);
            both.check_invariants();
            assert!(both.iter().eq(a.iter().chain(b.iter())));
        }
    }

    #[test]
    fn different_heights() {
        let sizes = [1, 3, 4, 5, 17, 64, 65, 100, 300, 1025];
        for &l in &sizes {
            for &r in &sizes {
                let left: Vector<usize, 4> = (0..l).collect();
                let right: Vector<usize, 4> = (l..l + r).collect();
                let both = left.concat(&right);
                both.check_invariants();
                assert_eq!(both.len(), l + r);
                assert!(both.iter().copied().eq(0..l + r), "{l} ++ {r}");
            }
        }
    }

    #[test]
    fn repeated_small_concats() {
        let piece: Vector<usize, 4> = (0..5).collect();
        let mut vec = Vector::<usize, 4>::new();
        for _ in 0..200 {
            vec = vec.concat(&piece);
            vec.check_invariants();
        }
        assert_eq!(vec.len(), 1000);
        assert!(vec.iter().copied().eq((0..200).flat_map(|_| 0..5)));

        let pushed = vec.push(5).update(3, 42).unwrap();
        pushed.check_invariants();
        assert_eq!(pushed[3], 42);
        assert_eq!(pushed[1000], 5);
    }
}

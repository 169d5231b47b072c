use std::sync::Arc;

use imbl_sized_chunks::Chunk;

use crate::metrics::increment;

pub(crate) type Children<T, const N: usize> = Chunk<Arc<Node<T, N>>, N>;
pub(crate) type SizeTable<const N: usize> = Chunk<usize, N>;

/// The number of index bits consumed by one level of the tree.
#[inline]
pub(crate) fn bits<const N: usize>() -> u32 {
    N.ilog2()
}

/// Identity of a transient editing session.
///
/// Tokens are compared by address, never by content, so two sessions can
/// only be confused if one of them is still alive. Nodes keep the token they
/// were stamped with alive, which rules that out.
#[derive(Clone, Debug)]
pub(crate) struct Edit(Arc<()>);

impl Edit {
    pub(crate) fn new() -> Self {
        Edit(Arc::new(()))
    }

    pub(crate) fn same(&self, other: &Edit) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// A node at shift `s` is a leaf if `s == 0`. Otherwise it's an interior node
// and each of its children holds at most `1 << s` elements.
//
// When `sizes` is `None`, every child except the last one is complete (holds
// exactly `1 << s` elements), so the child containing a given index can be
// found with a shift. Otherwise `sizes[i]` is the number of elements in
// children `0..=i`.
#[derive(Debug, Clone)]
pub(crate) enum Node<T, const N: usize> {
    Leaf {
        data: Chunk<T, N>,
        edit: Option<Edit>,
    },
    Interior {
        children: Children<T, N>,
        sizes: Option<Arc<SizeTable<N>>>,
        edit: Option<Edit>,
    },
}

impl<T, const N: usize> Node<T, N> {
    pub(crate) fn empty_leaf() -> Self {
        Node::Leaf {
            data: Chunk::new(),
            edit: None,
        }
    }

    pub(crate) fn leaf(data: Chunk<T, N>, edit: Option<&Edit>) -> Self {
        Node::Leaf {
            data,
            edit: edit.cloned(),
        }
    }

    /// The number of occupied slots: elements for a leaf, children otherwise.
    pub(crate) fn len(&self) -> usize {
        match self {
            Node::Leaf { data, .. } => data.len(),
            Node::Interior { children, .. } => children.len(),
        }
    }

    fn edit(&self) -> Option<&Edit> {
        match self {
            Node::Leaf { edit, .. } | Node::Interior { edit, .. } => edit.as_ref(),
        }
    }

    pub(crate) fn data(&self) -> &Chunk<T, N> {
        let Node::Leaf { data, .. } = self else {
            unreachable!("expected a leaf");
        };
        data
    }

    pub(crate) fn data_mut(&mut self) -> &mut Chunk<T, N> {
        let Node::Leaf { data, .. } = self else {
            unreachable!("expected a leaf");
        };
        data
    }

    pub(crate) fn children(&self) -> &Children<T, N> {
        let Node::Interior { children, .. } = self else {
            unreachable!("expected an interior node");
        };
        children
    }

    /// The number of elements in the subtree rooted at this node, which sits
    /// at height `shift`.
    pub(crate) fn size_sub_trie(&self, shift: u32) -> usize {
        match self {
            Node::Leaf { data, .. } => data.len(),
            Node::Interior {
                sizes: Some(sizes), ..
            } => sizes.last().copied().unwrap_or(0),
            Node::Interior {
                children,
                sizes: None,
                ..
            } => {
                let last = children
                    .last()
                    .map_or(0, |c| c.size_sub_trie(shift - bits::<N>()));
                (children.len().saturating_sub(1) << shift) + last
            }
        }
    }

    /// Builds a size table for `children`, which are the children of a node at
    /// height `shift`.
    pub(crate) fn set_sizes(children: &Children<T, N>, shift: u32) -> SizeTable<N> {
        let child_shift = shift - bits::<N>();
        let mut sum = 0;
        children
            .iter()
            .map(|c| {
                sum += c.size_sub_trie(child_shift);
                sum
            })
            .collect()
    }

    fn is_dense(children: &Children<T, N>, shift: u32) -> bool {
        let child_shift = shift - bits::<N>();
        let Some((_, init)) = children.split_last() else {
            return true;
        };
        let full = 1 << shift;
        init.iter().all(|c| c.size_sub_trie(child_shift) == full)
    }

    /// Creates an interior node at height `shift`, with a size table only if
    /// the children aren't densely packed.
    pub(crate) fn interior(children: Children<T, N>, shift: u32, edit: Option<&Edit>) -> Self {
        let sizes = if Self::is_dense(&children, shift) {
            None
        } else {
            Some(Arc::new(Self::set_sizes(&children, shift)))
        };
        Node::Interior {
            children,
            sizes,
            edit: edit.cloned(),
        }
    }

    /// Wraps `node` in single-child interior nodes until it sits at height
    /// `shift`.
    pub(crate) fn shaft(node: Arc<Self>, shift: u32, edit: Option<&Edit>) -> Arc<Self> {
        let mut node = node;
        let mut height = 0;
        while height < shift {
            height += bits::<N>();
            node = Arc::new(Node::Interior {
                children: Chunk::unit(node),
                sizes: None,
                edit: edit.cloned(),
            });
        }
        node
    }

    /// This node is at height `shift` and `idx` is relative to it. Returns the
    /// slot of the child containing `idx`, and `idx` relative to that child.
    ///
    /// The slot is out of bounds if `idx` is.
    pub(crate) fn position(&self, shift: u32, idx: usize) -> (usize, usize) {
        match self {
            Node::Interior {
                sizes: Some(sizes), ..
            } => {
                // A child holds at most `1 << shift` elements, so the target
                // can't be to the left of `idx >> shift`.
                let mut slot = (idx >> shift).min(sizes.len());
                while slot < sizes.len() && sizes[slot] <= idx {
                    slot += 1;
                }
                let before = if slot == 0 { 0 } else { sizes[slot - 1] };
                (slot, idx - before)
            }
            _ => {
                let slot = idx >> shift;
                (slot, idx - (slot << shift))
            }
        }
    }

    /// The number of elements in the last child of this interior node, given
    /// that the whole node holds `size` elements.
    pub(crate) fn last_child_size(&self, shift: u32, size: usize) -> usize {
        match self {
            Node::Interior {
                sizes: Some(sizes), ..
            } => match sizes.len() {
                0 => 0,
                1 => sizes[0],
                n => sizes[n - 1] - sizes[n - 2],
            },
            Node::Interior { children, .. } => size - (children.len().saturating_sub(1) << shift),
            Node::Leaf { .. } => unreachable!("leaves have no children"),
        }
    }

    pub(crate) fn get(&self, shift: u32, idx: usize) -> Option<&T> {
        let mut node = self;
        let mut shift = shift;
        let mut idx = idx;
        loop {
            match node {
                Node::Leaf { data, .. } => return data.get(idx),
                Node::Interior { children, .. } => {
                    let (slot, rel) = node.position(shift, idx);
                    node = children.get(slot)?;
                    idx = rel;
                    shift = shift.checked_sub(bits::<N>())?;
                }
            }
        }
    }

    /// Is there a free slot somewhere along the right spine of this subtree
    /// where a new leaf could be hung?
    pub(crate) fn has_room(&self, shift: u32) -> bool {
        match self {
            Node::Leaf { .. } => false,
            Node::Interior { .. } => self.len() < N || self.last_child_has_room(shift),
        }
    }

    /// Can a leaf be hung below the last child of this interior node?
    fn last_child_has_room(&self, shift: u32) -> bool {
        let sub = shift - bits::<N>();
        shift > bits::<N>() && self.children().last().is_some_and(|c| c.has_room(sub))
    }
}

impl<T: Clone, const N: usize> Node<T, N> {
    /// Copies this node's own slots (not its children), stamping the copy
    /// with `edit`.
    pub(crate) fn stamped(&self, edit: Option<&Edit>) -> Self {
        match self {
            Node::Leaf { data, .. } => Node::Leaf {
                data: data.clone(),
                edit: edit.cloned(),
            },
            Node::Interior {
                children, sizes, ..
            } => Node::Interior {
                children: children.clone(),
                sizes: sizes.clone(),
                edit: edit.cloned(),
            },
        }
    }

    /// Returns a mutable reference to the node in `slot`, copying it first if
    /// it can't be edited in place.
    ///
    /// With an edit token, a node is editable if it carries the same token.
    /// Without one (a persistent update), it is editable only if nothing else
    /// refers to it.
    pub(crate) fn claim<'a>(slot: &'a mut Arc<Self>, edit: Option<&Edit>) -> &'a mut Self {
        let owned = match edit {
            Some(edit) => slot.edit().is_some_and(|e| e.same(edit)),
            None => Arc::get_mut(slot).is_some(),
        };
        if !owned {
            increment!("rrb::node::copy");
            *slot = Arc::new(slot.stamped(edit));
        } else if edit.is_some() {
            increment!("rrb::node::edit_in_place");
        }
        Arc::make_mut(slot)
    }

    /// Hangs `leaf` as the new rightmost leaf of this subtree.
    ///
    /// The node in `slot` is at height `shift` and currently holds `size`
    /// elements. It must have room (see [`Node::has_room`]).
    pub(crate) fn push_leaf(
        slot: &mut Arc<Self>,
        shift: u32,
        size: usize,
        leaf: Arc<Self>,
        edit: Option<&Edit>,
    ) {
        let child_shift = shift - bits::<N>();
        let leaf_len = leaf.len();
        let last_size = slot.last_child_size(shift, size);
        let descend = slot.last_child_has_room(shift);

        let Node::Interior {
            children, sizes, ..
        } = Node::claim(slot, edit)
        else {
            unreachable!("pushing a leaf into a leaf");
        };

        if descend {
            let last = children.last_mut().expect("empty interior node");
            Node::push_leaf(last, child_shift, last_size, leaf, edit);
            if let Some(last) = sizes.as_mut().and_then(|s| Arc::make_mut(s).last_mut()) {
                *last += leaf_len;
            }
        } else {
            // Appending a sibling after an incomplete child breaks density.
            if sizes.is_none() && last_size != 1 << shift {
                *sizes = Some(Arc::new(Node::set_sizes(children, shift)));
            }
            children.push_back(Node::shaft(leaf, child_shift, edit));
            if let Some(sizes) = sizes {
                Arc::make_mut(sizes).push_back(size + leaf_len);
            }
        }
    }

    /// Removes the rightmost leaf of this subtree and returns it, along with
    /// whether the subtree is now empty (in which case the caller should drop
    /// it).
    pub(crate) fn pop_leaf(
        slot: &mut Arc<Self>,
        shift: u32,
        edit: Option<&Edit>,
    ) -> (Arc<Self>, bool) {
        if shift == 0 {
            return (Arc::clone(slot), true);
        }

        let Node::Interior {
            children, sizes, ..
        } = Node::claim(slot, edit)
        else {
            unreachable!("leaf above height zero");
        };
        let last = children.last_mut().expect("empty interior node");
        let (leaf, emptied) = Node::pop_leaf(last, shift - bits::<N>(), edit);

        if emptied {
            children.pop_back();
            if let Some(sizes) = sizes {
                Arc::make_mut(sizes).pop_back();
            }
        } else if let Some(last) = sizes.as_mut().and_then(|s| Arc::make_mut(s).last_mut()) {
            *last -= leaf.len();
        }
        (leaf, children.is_empty())
    }

    /// Replaces the element at `idx` (relative to this subtree).
    pub(crate) fn update(
        slot: &mut Arc<Self>,
        shift: u32,
        idx: usize,
        elt: T,
        edit: Option<&Edit>,
    ) {
        let node = Node::claim(slot, edit);
        let (pos, rel) = node.position(shift, idx);
        match node {
            Node::Leaf { data, .. } => {
                data[idx] = elt;
            }
            Node::Interior { children, .. } => {
                Node::update(&mut children[pos], shift - bits::<N>(), rel, elt, edit);
            }
        }
    }
}

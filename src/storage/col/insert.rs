//! Insert overlay: skip lists of pending updates keyed by record number.
//!
//! Nodes live in an arena owned by the list and are addressed by
//! [`InsertIdx`]. Nodes are never removed, so an index handed out by a search
//! stays valid for the lifetime of the list.

use std::cmp::Ordering;

use bytes::Bytes;
use rand::Rng;
use smallvec::SmallVec;

use crate::types::Recno;

/// Maximum height of an insert list.
pub const INSERT_MAX_DEPTH: usize = 10;

/// One node in `INSERT_PROBABILITY` is promoted to the next level.
const INSERT_PROBABILITY: u32 = 4;

/// Index of a node inside its [`InsertList`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct InsertIdx(u32);

impl InsertIdx {
    /// Arena position of the node.
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

/// Position in a list after which a new node would be linked.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum InsertLink {
    /// The list head.
    #[default]
    Head,
    /// The forward link of an existing node.
    Node(InsertIdx),
}

/// An overlay entry: a record number and its pending value.
#[derive(Clone, Debug)]
pub struct InsertNode {
    recno: Recno,
    value: Option<Bytes>,
    next: SmallVec<[Option<InsertIdx>; 4]>,
}

impl InsertNode {
    /// Record number of the entry.
    pub fn recno(&self) -> Recno {
        self.recno
    }

    /// Pending value; `None` marks a deleted record.
    pub fn value(&self) -> Option<&Bytes> {
        self.value.as_ref()
    }

    /// Number of levels the node is linked on.
    pub fn depth(&self) -> usize {
        self.next.len()
    }

    fn next(&self, level: usize) -> Option<InsertIdx> {
        self.next.get(level).copied().flatten()
    }
}

/// Per-level visitation stack recorded by [`InsertList::search_stack`].
///
/// For every level it holds the last position whose key is not greater than
/// the target and the node that follows it, which is exactly what an insert
/// at the searched position needs.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InsertStack {
    prev: [InsertLink; INSERT_MAX_DEPTH],
    next: [Option<InsertIdx>; INSERT_MAX_DEPTH],
}

impl InsertStack {
    /// Creates a stack positioned at the head of an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every level to the list head.
    pub fn reset(&mut self) {
        self.prev = [InsertLink::Head; INSERT_MAX_DEPTH];
        self.next = [None; INSERT_MAX_DEPTH];
    }

    /// Insertion predecessor at `level`.
    pub fn prev(&self, level: usize) -> InsertLink {
        self.prev[level]
    }

    /// Node following the insertion point at `level`.
    pub fn next(&self, level: usize) -> Option<InsertIdx> {
        self.next[level]
    }
}

/// Skip list of overlay entries with unique record numbers.
#[derive(Clone, Debug, Default)]
pub struct InsertList {
    nodes: Vec<InsertNode>,
    head: [Option<InsertIdx>; INSERT_MAX_DEPTH],
    tail: [Option<InsertIdx>; INSERT_MAX_DEPTH],
}

impl InsertList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true when the list holds no entries.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node at `idx`.
    pub fn node(&self, idx: InsertIdx) -> &InsertNode {
        &self.nodes[idx.get()]
    }

    /// Entry with the smallest record number.
    pub fn first(&self) -> Option<InsertIdx> {
        self.head[0]
    }

    /// Entry with the largest record number.
    pub fn last(&self) -> Option<InsertIdx> {
        self.tail[0]
    }

    /// Walks the entries in record order.
    pub fn iter(&self) -> impl Iterator<Item = &InsertNode> + '_ {
        let mut cursor = self.head[0];
        std::iter::from_fn(move || {
            let node = &self.nodes[cursor?.get()];
            cursor = node.next(0);
            Some(node)
        })
    }

    fn link(&self, pos: InsertLink, level: usize) -> Option<InsertIdx> {
        match pos {
            InsertLink::Head => self.head[level],
            InsertLink::Node(idx) => self.nodes[idx.get()].next(level),
        }
    }

    /// Searches for `recno`, filling `stack` with the insertion position.
    ///
    /// Returns the exact match if present. Otherwise returns the entry with
    /// the smallest record number greater than `recno`, or the last entry if
    /// `recno` is past every entry. Returns `None` only for an empty list.
    pub fn search_stack(&self, recno: Recno, stack: &mut InsertStack) -> Option<InsertIdx> {
        stack.reset();
        let last = self.tail[0]?;

        if recno >= self.nodes[last.get()].recno {
            for level in 0..INSERT_MAX_DEPTH {
                stack.prev[level] = self.tail[level].map_or(InsertLink::Head, InsertLink::Node);
            }
            return Some(last);
        }

        let mut found = None;
        let mut pos = InsertLink::Head;
        for level in (0..INSERT_MAX_DEPTH).rev() {
            loop {
                let next = self.link(pos, level);
                let Some(idx) = next else {
                    stack.prev[level] = pos;
                    stack.next[level] = None;
                    break;
                };
                let node = &self.nodes[idx.get()];
                match recno.cmp(&node.recno) {
                    Ordering::Greater => pos = InsertLink::Node(idx),
                    Ordering::Equal => {
                        for lower in 0..=level {
                            stack.prev[lower] = InsertLink::Node(idx);
                            stack.next[lower] = node.next(lower);
                        }
                        return Some(idx);
                    }
                    Ordering::Less => {
                        stack.prev[level] = pos;
                        stack.next[level] = Some(idx);
                        found = Some(idx);
                        break;
                    }
                }
            }
        }
        found
    }

    /// Links an entry at the position described by `stack`.
    ///
    /// `stack` must come from a search for `recno` on this list with no
    /// mutation in between. If that search matched `recno` exactly, the
    /// existing entry's value is replaced instead.
    pub fn insert_with_stack(
        &mut self,
        stack: &InsertStack,
        recno: Recno,
        value: Option<Bytes>,
        depth: usize,
    ) -> InsertIdx {
        if let InsertLink::Node(prev) = stack.prev[0] {
            if self.nodes[prev.get()].recno == recno {
                self.nodes[prev.get()].value = value;
                return prev;
            }
        }

        let depth = depth.clamp(1, INSERT_MAX_DEPTH);
        let idx = InsertIdx(self.nodes.len() as u32);
        debug_assert!(stack
            .next(0)
            .map_or(true, |next| self.nodes[next.get()].recno > recno));
        debug_assert!(match stack.prev(0) {
            InsertLink::Head => true,
            InsertLink::Node(prev) => self.nodes[prev.get()].recno < recno,
        });

        let next: SmallVec<[Option<InsertIdx>; 4]> =
            (0..depth).map(|level| stack.next[level]).collect();
        self.nodes.push(InsertNode { recno, value, next });
        for level in 0..depth {
            match stack.prev[level] {
                InsertLink::Head => self.head[level] = Some(idx),
                InsertLink::Node(prev) => self.nodes[prev.get()].next[level] = Some(idx),
            }
            if stack.next[level].is_none() {
                self.tail[level] = Some(idx);
            }
        }
        idx
    }

    /// Inserts or replaces the entry for `recno` using a random height.
    pub fn insert(&mut self, recno: Recno, value: Option<Bytes>) -> InsertIdx {
        let depth = random_depth(&mut rand::thread_rng(), INSERT_MAX_DEPTH);
        self.insert_at_depth(recno, value, depth)
    }

    /// Inserts or replaces the entry for `recno` with an explicit height.
    pub fn insert_at_depth(&mut self, recno: Recno, value: Option<Bytes>, depth: usize) -> InsertIdx {
        let mut stack = InsertStack::new();
        self.search_stack(recno, &mut stack);
        self.insert_with_stack(&stack, recno, value, depth)
    }
}

/// Draws a node height in `1..=max_depth` with probability 1/4 per extra level.
pub fn random_depth<R: Rng + ?Sized>(rng: &mut R, max_depth: usize) -> usize {
    let max_depth = max_depth.clamp(1, INSERT_MAX_DEPTH);
    let mut depth = 1;
    while depth < max_depth && rng.gen_range(0..INSERT_PROBABILITY) == 0 {
        depth += 1;
    }
    depth
}

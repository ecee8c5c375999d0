//! Probabilistic ordered list backing the memtable.
//!
//! Nodes live in an arena (`Vec<Node>`) and link to each other by index, so
//! the whole structure is safe Rust with good cache locality -- no `Rc`
//! cycles, no raw pointers. Level 0 is a sorted singly-linked list containing
//! every entry; each higher level is a sparser subsequence used to skip ahead
//! during descent.
//!
//! ```text
//! Level 3:  HEAD ──────────────────────────────► 50 ──────────► NIL
//! Level 2:  HEAD ──────────► 20 ────────────────► 50 ──────────► NIL
//! Level 1:  HEAD ──► 10 ──► 20 ────► 35 ────────► 50 ──► 60 ──► NIL
//! Level 0:  HEAD ──► 10 ──► 20 ──► 25 ──► 35 ──► 50 ──► 60 ──► 70 ► NIL
//! ```

/// Maximum height of the skip list.
pub(crate) const MAX_LEVEL: usize = 16;

/// Index of the head sentinel in the arena. The sentinel carries no real key
/// and always has `MAX_LEVEL` forward pointers.
const HEAD: usize = 0;

/// A single node. `forward.len()` is the node's height and never changes
/// after insertion.
struct Node {
    key: Vec<u8>,
    value: Vec<u8>,
    tombstone: bool,
    forward: Vec<Option<usize>>,
}

/// Ordered map from byte-string key to `(value, tombstone)` payload.
///
/// Keys are compared lexicographically by unsigned byte. Upserting an
/// existing key overwrites the payload in place; node height and linkage are
/// fixed at insertion time. Expected O(log n) search and insert.
///
/// Not thread-safe; the owning memtable is mutated by a single writer.
pub struct SkipList {
    nodes: Vec<Node>,
    /// Number of levels currently in use (>= 1).
    level: usize,
    len: usize,
    rng: fastrand::Rng,
}

impl SkipList {
    pub fn new() -> Self {
        let head = Node {
            key: Vec::new(),
            value: Vec::new(),
            tombstone: false,
            forward: vec![None; MAX_LEVEL],
        };
        Self {
            nodes: vec![head],
            level: 1,
            len: 0,
            rng: fastrand::Rng::new(),
        }
    }

    /// Looks up `key`, returning its `(value, tombstone)` payload.
    pub fn search(&self, key: &[u8]) -> Option<(&[u8], bool)> {
        let mut x = HEAD;
        for lvl in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].forward[lvl] {
                if self.nodes[next].key.as_slice() < key {
                    x = next;
                } else {
                    break;
                }
            }
        }

        // Confirm at level 0.
        match self.nodes[x].forward[0] {
            Some(i) if self.nodes[i].key == key => {
                let n = &self.nodes[i];
                Some((n.value.as_slice(), n.tombstone))
            }
            _ => None,
        }
    }

    /// Inserts or overwrites `key`.
    ///
    /// On an exact match the payload is replaced in place and the node keeps
    /// its height and links. Otherwise a new node is spliced in at a freshly
    /// generated height, raising the list's active level if needed.
    pub fn upsert(&mut self, key: Vec<u8>, value: Vec<u8>, tombstone: bool) {
        // Descend, recording the predecessor at every level.
        let mut update = [HEAD; MAX_LEVEL];
        let mut x = HEAD;
        for lvl in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].forward[lvl] {
                if self.nodes[next].key.as_slice() < key.as_slice() {
                    x = next;
                } else {
                    break;
                }
            }
            update[lvl] = x;
        }

        if let Some(i) = self.nodes[x].forward[0] {
            if self.nodes[i].key == key {
                self.nodes[i].value = value;
                self.nodes[i].tombstone = tombstone;
                return;
            }
        }

        let height = self.random_level();
        if height > self.level {
            // Predecessors above the old top level are the head sentinel,
            // which `update` was initialised to.
            self.level = height;
        }

        let idx = self.nodes.len();
        let mut forward = vec![None; height];
        for (lvl, slot) in forward.iter_mut().enumerate() {
            *slot = self.nodes[update[lvl]].forward[lvl];
        }
        self.nodes.push(Node {
            key,
            value,
            tombstone,
            forward,
        });
        for lvl in 0..height {
            self.nodes[update[lvl]].forward[lvl] = Some(idx);
        }
        self.len += 1;
    }

    /// Iterates every entry in ascending key order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            next: self.nodes[HEAD].forward[0],
        }
    }

    /// Iterates entries whose key is >= `start`, in ascending key order.
    pub fn iter_from(&self, start: &[u8]) -> Iter<'_> {
        Iter {
            list: self,
            next: self.first_ge(start),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First node whose key is >= `target`.
    fn first_ge(&self, target: &[u8]) -> Option<usize> {
        let mut x = HEAD;
        for lvl in (0..self.level).rev() {
            while let Some(next) = self.nodes[x].forward[lvl] {
                if self.nodes[next].key.as_slice() < target {
                    x = next;
                } else {
                    break;
                }
            }
        }
        self.nodes[x].forward[0]
    }

    /// Geometric level with p = 0.5, capped at `MAX_LEVEL`.
    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < MAX_LEVEL && self.rng.bool() {
            level += 1;
        }
        level
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks level 0 from a starting node; yields `(key, value, tombstone)`.
pub struct Iter<'a> {
    list: &'a SkipList,
    next: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [u8], bool);

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.next?;
        let n = &self.list.nodes[i];
        self.next = n.forward[0];
        Some((n.key.as_slice(), n.value.as_slice(), n.tombstone))
    }
}

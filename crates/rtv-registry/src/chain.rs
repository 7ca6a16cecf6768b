//! Singly linked ordered chain over an arena of stable slots.
//!
//! Slots are reused through a free list, so a key keeps its slot index for as
//! long as it is in the chain. Removal during a walk always advances through
//! the `next` link read *before* the node is unlinked.

use std::collections::HashMap;
use std::hash::Hash;

const NIL: usize = usize::MAX;

#[derive(Debug, Clone)]
enum Slot<K> {
    Occupied { key: K, next: usize },
    Free { next_free: usize },
}

/// Visitor decision for [`Chain::sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Keep,
    Remove,
    /// End the walk; the current node is kept.
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainViolation {
    #[error("recorded len {recorded} but {reachable} nodes reachable from head")]
    LengthMismatch { recorded: usize, reachable: usize },
    #[error("head is null but len is {0}")]
    NullHeadNonEmpty(usize),
    #[error("head is set but len is 0")]
    EmptyWithHead,
    #[error("key reachable twice")]
    DuplicateKey,
    #[error("index has {indexed} keys but chain has {reachable}")]
    IndexMismatch { indexed: usize, reachable: usize },
    #[error("link points at a free or out-of-range slot {0}")]
    DanglingLink(usize),
}

#[derive(Debug, Clone)]
pub struct Chain<K> {
    slots: Vec<Slot<K>>,
    free_head: usize,
    index: HashMap<K, usize>,
    head: usize,
    len: usize,
}

impl<K> Default for Chain<K> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free_head: NIL,
            index: HashMap::new(),
            head: NIL,
            len: 0,
        }
    }
}

impl<K: Clone + Eq + Hash> Chain<K> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn head(&self) -> Option<&K> {
        self.key_at(self.head)
    }

    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            chain: self,
            cursor: self.head,
        }
    }

    /// Keys in chain order.
    pub fn keys(&self) -> Vec<K> {
        self.iter().cloned().collect()
    }

    /// Insert at the head. Returns `false` (and changes nothing) if present.
    pub fn push_front(&mut self, key: K) -> bool {
        if self.contains(&key) {
            return false;
        }
        let idx = self.alloc(key.clone(), self.head);
        self.head = idx;
        self.index.insert(key, idx);
        self.len += 1;
        true
    }

    /// Insert before the first existing key for which `goes_before` is true,
    /// or at the tail if there is none. Returns `Ok(false)` if already present.
    pub fn insert_sorted_by<E>(
        &mut self,
        key: K,
        mut goes_before: impl FnMut(&K) -> Result<bool, E>,
    ) -> Result<bool, E> {
        if self.contains(&key) {
            return Ok(false);
        }

        let mut prev = NIL;
        let mut cur = self.head;
        while let Some((existing, next)) = self.node(cur) {
            if goes_before(existing)? {
                break;
            }
            prev = cur;
            cur = next;
        }

        let idx = self.alloc(key.clone(), cur);
        self.link_after(prev, idx);
        self.index.insert(key, idx);
        self.len += 1;
        Ok(true)
    }

    /// Unlink `key`. Returns `false` if it was not present.
    pub fn remove(&mut self, key: &K) -> bool {
        let Some(&target) = self.index.get(key) else {
            return false;
        };
        let mut prev = NIL;
        let mut cur = self.head;
        while let Some((_, next)) = self.node(cur) {
            if cur == target {
                self.unlink(prev, cur, next);
                return true;
            }
            prev = cur;
            cur = next;
        }
        false
    }

    /// Walk from the head, letting `visit` keep, remove, or stop at each key.
    ///
    /// Returns the number of removed keys. An error from `visit` ends the walk;
    /// removals made before it stand.
    pub fn sweep<E>(&mut self, mut visit: impl FnMut(&K) -> Result<Visit, E>) -> Result<usize, E> {
        let mut removed = 0usize;
        let mut prev = NIL;
        let mut cur = self.head;

        while let Some((key, next)) = self.node(cur) {
            match visit(key)? {
                Visit::Stop => break,
                Visit::Keep => prev = cur,
                Visit::Remove => {
                    self.unlink(prev, cur, next);
                    removed += 1;
                }
            }
            cur = next;
        }
        Ok(removed)
    }

    /// Structural self-check: reachable count, duplicates, head/len agreement,
    /// index agreement, and that no link points into a free slot.
    pub fn check_invariants(&self) -> Result<(), ChainViolation> {
        if self.head == NIL && self.len != 0 {
            return Err(ChainViolation::NullHeadNonEmpty(self.len));
        }
        if self.head != NIL && self.len == 0 {
            return Err(ChainViolation::EmptyWithHead);
        }

        let mut seen: HashMap<&K, usize> = HashMap::with_capacity(self.len);
        let mut cur = self.head;
        while cur != NIL {
            let Some((key, next)) = self.node(cur) else {
                return Err(ChainViolation::DanglingLink(cur));
            };
            if seen.insert(key, cur).is_some() {
                return Err(ChainViolation::DuplicateKey);
            }
            // A cycle revisits a key, so the duplicate check bounds this loop.
            cur = next;
        }

        let reachable = seen.len();
        if reachable != self.len {
            return Err(ChainViolation::LengthMismatch {
                recorded: self.len,
                reachable,
            });
        }
        if self.index.len() != reachable
            || seen.iter().any(|(k, idx)| self.index.get(*k) != Some(idx))
        {
            return Err(ChainViolation::IndexMismatch {
                indexed: self.index.len(),
                reachable,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Slot plumbing
    // -----------------------------------------------------------------------

    fn node(&self, idx: usize) -> Option<(&K, usize)> {
        match self.slots.get(idx)? {
            Slot::Occupied { key, next } => Some((key, *next)),
            Slot::Free { .. } => None,
        }
    }

    fn key_at(&self, idx: usize) -> Option<&K> {
        self.node(idx).map(|(k, _)| k)
    }

    fn alloc(&mut self, key: K, next: usize) -> usize {
        let slot = Slot::Occupied { key, next };
        if self.free_head == NIL {
            self.slots.push(slot);
            return self.slots.len() - 1;
        }
        let idx = self.free_head;
        self.free_head = match self.slots.get(idx) {
            Some(Slot::Free { next_free }) => *next_free,
            _ => NIL,
        };
        self.slots[idx] = slot;
        idx
    }

    fn link_after(&mut self, prev: usize, idx: usize) {
        if prev == NIL {
            self.head = idx;
        } else if let Some(Slot::Occupied { next, .. }) = self.slots.get_mut(prev) {
            *next = idx;
        }
    }

    fn unlink(&mut self, prev: usize, cur: usize, next: usize) {
        self.link_after(prev, next);
        let freed = std::mem::replace(
            &mut self.slots[cur],
            Slot::Free {
                next_free: self.free_head,
            },
        );
        self.free_head = cur;
        if let Slot::Occupied { key, .. } = freed {
            self.index.remove(&key);
        }
        self.len -= 1;
    }
}

pub struct Iter<'a, K> {
    chain: &'a Chain<K>,
    cursor: usize,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        match self.chain.slots.get(self.cursor)? {
            Slot::Occupied { key, next } => {
                self.cursor = *next;
                Some(key)
            }
            Slot::Free { .. } => None,
        }
    }
}

//! Successor list of a local vnode.
use crate::dht::Vnode;

/// A sequence of successors for a vnode on the ring.
/// It's necessary to have multiple successors to survive the failure of the
/// immediate one. Index 0 is the immediate successor; slots past the known
/// entries are absent, so the list never has gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessorList {
    /// Max successor num
    max: usize,
    successors: Vec<Vnode>,
}

impl SuccessorList {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            successors: Vec::with_capacity(max),
        }
    }

    /// Build from known successors, keeping at most `max`.
    pub fn from_vec(max: usize, mut successors: Vec<Vnode>) -> Self {
        successors.truncate(max);
        Self { max, successors }
    }

    /// Number of known successors.
    pub fn known(&self) -> usize {
        self.successors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    /// The immediate successor.
    pub fn head(&self) -> Option<&Vnode> {
        self.successors.first()
    }

    pub fn list(&self) -> Vec<Vnode> {
        self.successors.clone()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vnode> {
        self.successors.iter()
    }

    /// `n` successors starting at `start`, only if all of them are known.
    pub fn window(&self, start: usize, n: usize) -> Option<Vec<Vnode>> {
        self.successors.get(start..start + n).map(|s| s.to_vec())
    }

    /// Drop the head if it is still `dead`, shifting everything left by one.
    pub fn evict_head(&mut self, dead: &Vnode) -> bool {
        if self.head() != Some(dead) {
            return false;
        }
        self.successors.remove(0);
        true
    }

    /// Replace the head with `closer` if it is still `old`.
    pub fn replace_head(&mut self, old: &Vnode, closer: Vnode) -> bool {
        match self.successors.first_mut() {
            Some(head) if head == old => {
                *head = closer;
                true
            }
            _ => false,
        }
    }

    /// Set the head of an empty list.
    pub fn promote(&mut self, vnode: Vnode) {
        if self.successors.is_empty() && self.max > 0 {
            self.successors.push(vnode);
        }
    }

    /// Splice the successor list reported by `head` into slots `1..`.
    /// Entries past the reported ones are kept. Nothing happens if `head`
    /// is no longer the immediate successor.
    pub fn absorb(&mut self, head: &Vnode, reported: Vec<Vnode>) -> bool {
        if self.head() != Some(head) {
            return false;
        }
        let limit = self.max.saturating_sub(1);
        for (idx, s) in reported.into_iter().take(limit).enumerate() {
            let slot = idx + 1;
            if slot < self.successors.len() {
                self.successors[slot] = s;
            } else {
                self.successors.push(s);
            }
        }
        true
    }
}

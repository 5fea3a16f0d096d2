//! Routing candidates for a key, best first.
use std::collections::HashSet;

use crate::dht::id::between;
use crate::dht::id::distance;
use crate::dht::Id;
use crate::dht::Vnode;

/// Lazily yields the known vnodes that precede `key`, closest to `key` first.
///
/// Two cursors walk the finger table and the successor list from their far
/// ends toward this vnode; each step yields whichever candidate is closer
/// to the key. Every candidate lies strictly between this vnode and `key`,
/// each is yielded once, and absent entries are skipped.
///
/// The iterator owns a snapshot of the routing state, so it never holds the
/// vnode lock while the caller waits on remote calls. It is finite and not
/// restartable.
#[derive(Debug)]
pub struct ClosestPreceding {
    id: Id,
    key: Id,
    hash_bits: usize,
    finger: Vec<Option<Vnode>>,
    successors: Vec<Vnode>,
    finger_idx: Option<usize>,
    successor_idx: Option<usize>,
    yielded: HashSet<Id>,
}

impl ClosestPreceding {
    pub fn new(
        id: Id,
        key: Id,
        hash_bits: usize,
        finger: Vec<Option<Vnode>>,
        successors: Vec<Vnode>,
    ) -> Self {
        let finger_idx = finger.len().checked_sub(1);
        let successor_idx = successors.len().checked_sub(1);
        Self {
            id,
            key,
            hash_bits,
            finger,
            successors,
            finger_idx,
            successor_idx,
            yielded: HashSet::new(),
        }
    }

    fn is_candidate(&self, vnode: &Vnode) -> bool {
        !self.yielded.contains(&vnode.id) && between(&self.id, &self.key, &vnode.id)
    }

    /// Move the finger cursor down to the next candidate.
    fn scan_finger(&mut self) -> Option<Vnode> {
        while let Some(i) = self.finger_idx {
            if let Some(v) = &self.finger[i] {
                if self.is_candidate(v) {
                    return Some(v.clone());
                }
            }
            self.finger_idx = i.checked_sub(1);
        }
        None
    }

    /// Move the successor cursor down to the next candidate.
    fn scan_successor(&mut self) -> Option<Vnode> {
        while let Some(i) = self.successor_idx {
            let v = &self.successors[i];
            if self.is_candidate(v) {
                return Some(v.clone());
            }
            self.successor_idx = i.checked_sub(1);
        }
        None
    }

    fn step_finger(&mut self) {
        self.finger_idx = self.finger_idx.and_then(|i| i.checked_sub(1));
    }

    fn step_successor(&mut self) {
        self.successor_idx = self.successor_idx.and_then(|i| i.checked_sub(1));
    }
}

impl Iterator for ClosestPreceding {
    type Item = Vnode;

    fn next(&mut self) -> Option<Vnode> {
        let successor = self.scan_successor();
        let finger = self.scan_finger();

        let closest = match (successor, finger) {
            (Some(s), Some(f)) => {
                let s_dist = distance(&s.id, &self.key, self.hash_bits);
                let f_dist = distance(&f.id, &self.key, self.hash_bits);
                if s_dist <= f_dist {
                    self.step_successor();
                    s
                } else {
                    self.step_finger();
                    f
                }
            }
            (Some(s), None) => {
                self.step_successor();
                s
            }
            (None, Some(f)) => {
                self.step_finger();
                f
            }
            (None, None) => return None,
        };
        self.yielded.insert(closest.id.clone());
        Some(closest)
    }
}

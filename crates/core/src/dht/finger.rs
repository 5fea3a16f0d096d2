#![warn(missing_docs)]
use std::ops::Index;

use crate::dht::id::between_right_incl;
use crate::dht::id::power_offset;
use crate::dht::Id;
use crate::dht::Vnode;

/// Finger table of a local vnode.
/// `finger[i]` approximates the successor of `id + 2^i`. Entries are repaired
/// one step per stabilization cycle, starting at `fix_finger_index`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FingerTable {
    id: Id,
    size: usize,
    finger: Vec<Option<Vnode>>,
    pub(super) fix_finger_index: usize,
}

impl FingerTable {
    /// builder
    pub fn new(id: Id, size: usize) -> Self {
        Self {
            id,
            size,
            finger: vec![None; size],
            fix_finger_index: 0,
        }
    }

    /// Index of the next slot due for repair.
    pub fn fix_finger_index(&self) -> usize {
        self.fix_finger_index
    }

    /// The key finger `index` targets.
    pub fn offset(&self, index: usize) -> Id {
        power_offset(&self.id, index, self.size)
    }

    /// Store the resolved owner of the cursor's offset, then greedily copy it
    /// into every following slot whose offset it also owns, and advance the
    /// cursor past them, wrapping to zero.
    /// Returns the index that will be repaired next.
    pub fn fix(&mut self, node: Vnode) -> usize {
        if self.size == 0 {
            return 0;
        }
        let mut last = self.fix_finger_index;
        while last + 1 < self.size {
            let next = last + 1;
            if !between_right_incl(&self.id, &node.id, &self.offset(next)) {
                break;
            }
            self.finger[next] = Some(node.clone());
            last = next;
        }
        self.finger[self.fix_finger_index] = Some(node);
        self.fix_finger_index = (last + 1) % self.size;
        self.fix_finger_index
    }

    /// Forget a vnode known to be dead.
    pub fn remove(&mut self, vnode: &Vnode) {
        for slot in self.finger.iter_mut() {
            if slot.as_ref() == Some(vnode) {
                *slot = None;
            }
        }
    }

    /// Known finger closest to this vnode, ignoring `except`.
    pub fn first_except(&self, except: &Vnode) -> Option<Vnode> {
        self.finger.iter().flatten().find(|v| *v != except).cloned()
    }

    /// get length of finger
    pub fn len(&self) -> usize {
        self.finger.iter().flatten().count()
    }

    /// is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// get finger list
    pub fn list(&self) -> &Vec<Option<Vnode>> {
        &self.finger
    }
}

impl Index<usize> for FingerTable {
    type Output = Option<Vnode>;
    fn index(&self, index: usize) -> &Self::Output {
        &self.finger[index]
    }
}

//! Local vnode: one ring position owned by this process.
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::task::JoinHandle;

use super::closest::ClosestPreceding;
use super::id::between;
use super::id::between_right_incl;
use super::FingerTable;
use super::Id;
use super::SuccessorList;
use super::Vnode;
use crate::delegate::DelegateEvent;
use crate::error::Error;
use crate::error::Result;
use crate::ring::RingContext;
use crate::transport::VnodeRpc;

/// Mutable routing state of a local vnode.
/// Every read and write goes through [LocalVnode::lock_state]; the lock is
/// never held across a remote call.
#[derive(Debug, Clone)]
pub(crate) struct VnodeState {
    pub(crate) successors: SuccessorList,
    pub(crate) finger: FingerTable,
    pub(crate) predecessor: Option<Vnode>,
    pub(crate) stabilized_at: Option<DateTime<Utc>>,
}

/// A vnode hosted by this process.
///
/// It is driven from two sides: its own stabilization cycle, see
/// [LocalVnode::stabilize], and the RPCs peers send through the transport,
/// see the [VnodeRpc] implementation.
pub struct LocalVnode {
    vnode: Vnode,
    pub(crate) ctx: Arc<RingContext>,
    state: Mutex<VnodeState>,
    pub(crate) timer: Mutex<Option<JoinHandle<()>>>,
}

impl LocalVnode {
    pub(crate) fn new(vnode: Vnode, ctx: Arc<RingContext>) -> Self {
        let config = &ctx.config;
        let state = VnodeState {
            successors: SuccessorList::new(config.num_successors),
            finger: FingerTable::new(vnode.id.clone(), config.hash_bits),
            predecessor: None,
            stabilized_at: None,
        };
        Self {
            vnode,
            ctx,
            state: Mutex::new(state),
            timer: Mutex::new(None),
        }
    }

    pub fn vnode(&self) -> &Vnode {
        &self.vnode
    }

    pub fn id(&self) -> &Id {
        &self.vnode.id
    }

    pub(crate) fn lock_state(&self) -> Result<MutexGuard<VnodeState>> {
        self.state.lock().map_err(|_| Error::VnodeStateLock)
    }

    /// Known successors, immediate successor first.
    pub fn successors(&self) -> Result<Vec<Vnode>> {
        Ok(self.lock_state()?.successors.list())
    }

    pub fn predecessor(&self) -> Result<Option<Vnode>> {
        Ok(self.lock_state()?.predecessor.clone())
    }

    pub fn finger(&self) -> Result<Vec<Option<Vnode>>> {
        Ok(self.lock_state()?.finger.list().clone())
    }

    /// Index of the finger due for repair in the next cycle.
    pub fn last_finger(&self) -> Result<usize> {
        Ok(self.lock_state()?.finger.fix_finger_index())
    }

    /// When the last stabilization cycle completed.
    pub fn stabilized_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.lock_state()?.stabilized_at)
    }

    pub(crate) fn set_successors(&self, successors: Vec<Vnode>) -> Result<()> {
        let mut state = self.lock_state()?;
        state.successors = SuccessorList::from_vec(self.ctx.config.num_successors, successors);
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> Result<VnodeState> {
        Ok(self.lock_state()?.clone())
    }

    fn successor(&self) -> Result<Option<Vnode>> {
        Ok(self.lock_state()?.successors.head().cloned())
    }

    /// Ask the immediate successor for its predecessor. A vnode that joined
    /// in between becomes the new successor; a successor that neither
    /// answers nor responds to ping is evicted.
    pub async fn check_new_successor(&self) -> Result<()> {
        let Some(succ) = self.successor()? else {
            tracing::trace!("{} has no successor, nothing to check", self.vnode);
            return Ok(());
        };
        let trans = &self.ctx.transport;

        let maybe_succ = match trans.get_predecessor(&succ).await {
            Ok(p) => p,
            Err(e) => {
                let alive = trans.ping(&succ).await.unwrap_or(false);
                if alive {
                    return Err(e);
                }
                tracing::warn!(
                    "{} evicts dead successor {}: {}",
                    self.vnode,
                    succ,
                    e
                );
                self.evict_successor(&succ)?;
                return Ok(());
            }
        };

        let Some(candidate) = maybe_succ else {
            return Ok(());
        };
        if !between(self.id(), &succ.id, &candidate.id) {
            return Ok(());
        }
        // check the closer node is alive before switching
        if trans.ping(&candidate).await? {
            let mut state = self.lock_state()?;
            if state.successors.replace_head(&succ, candidate.clone()) {
                tracing::debug!(
                    "{} found closer successor {} before {}",
                    self.vnode,
                    candidate,
                    succ
                );
            }
        }
        Ok(())
    }

    fn evict_successor(&self, dead: &Vnode) -> Result<()> {
        let mut state = self.lock_state()?;
        if !state.successors.evict_head(dead) {
            return Ok(());
        }
        state.finger.remove(dead);
        if state.successors.is_empty() {
            if let Some(closest) = state.finger.first_except(&self.vnode) {
                tracing::info!(
                    "{} lost every successor, falling back to finger {}",
                    self.vnode,
                    closest
                );
                state.successors.promote(closest);
            }
        }
        Ok(())
    }

    /// Tell the immediate successor about us, and take over its successor
    /// list as ours from index 1 on.
    pub async fn notify_successor(&self) -> Result<()> {
        let Some(succ) = self.successor()? else {
            return Ok(());
        };
        let succ_list = self.ctx.transport.notify(&succ, &self.vnode).await?;

        let mut state = self.lock_state()?;
        if !state.successors.absorb(&succ, succ_list) {
            tracing::debug!(
                "{} successor changed while notifying {}, dropping its list",
                self.vnode,
                succ
            );
        }
        Ok(())
    }

    /// Repair one finger, plus every following finger owned by the same
    /// vnode. A failed lookup leaves the cursor where it is, so the same
    /// finger is retried on the next cycle.
    pub async fn fix_finger_table(&self) -> Result<()> {
        let (index, offset) = {
            let state = self.lock_state()?;
            let index = state.finger.fix_finger_index();
            (index, state.finger.offset(index))
        };

        let nodes = self.find_successors(1, &offset).await?;
        let Some(node) = nodes.into_iter().next() else {
            return Err(Error::EmptySuccessorList(offset.to_string()));
        };

        let mut state = self.lock_state()?;
        if state.finger.fix_finger_index() != index {
            return Ok(());
        }
        let next = state.finger.fix(node);
        tracing::trace!("{} fixed finger {}, next is {}", self.vnode, index, next);
        Ok(())
    }

    /// Forget the predecessor once it is known to be dead.
    pub async fn check_predecessor(&self) -> Result<()> {
        let Some(pred) = self.predecessor()? else {
            return Ok(());
        };
        if self.ctx.transport.ping(&pred).await? {
            return Ok(());
        }
        let mut state = self.lock_state()?;
        if state.predecessor.as_ref() == Some(&pred) {
            tracing::info!("{} clears dead predecessor {}", self.vnode, pred);
            state.predecessor = None;
        }
        Ok(())
    }

    /// Find the `n` closest successors of `key`.
    ///
    /// Answers from the successor list when it already covers `key`,
    /// otherwise asks the known vnodes preceding `key`, closest first, until
    /// one of them answers. A vnode with no successor owns the whole ring.
    pub async fn find_successors(&self, n: usize, key: &Id) -> Result<Vec<Vnode>> {
        if n == 0 {
            return Ok(vec![]);
        }
        let (successors, finger) = {
            let state = self.lock_state()?;
            (state.successors.clone(), state.finger.list().clone())
        };
        if successors.is_empty() {
            return Ok(vec![self.vnode.clone()]);
        }

        // Scans start offsets up to max(known - n, 1), both ends included.
        let bound = successors.known().saturating_sub(n).max(1);
        for i in 0..=bound {
            let Some(window) = successors.window(i, n) else {
                break;
            };
            if between_right_incl(self.id(), &window[0].id, key) {
                return Ok(window);
            }
        }

        let candidates = ClosestPreceding::new(
            self.id().clone(),
            key.clone(),
            self.ctx.config.hash_bits,
            finger,
            successors.list(),
        );
        for closest in candidates {
            match self.ctx.transport.find_successors(&closest, n, key).await {
                Ok(res) if res.is_empty() => {
                    tracing::warn!("{} answered no successor for {}", closest, key)
                }
                Ok(res) => return Ok(res),
                Err(e) => tracing::warn!("Failed to contact {}. Got {}", closest, e),
            }
        }
        Err(Error::NoReachablePath(key.to_string()))
    }

    /// Announce that we leave: the predecessor skips us, the successor
    /// forgets us as its predecessor.
    pub async fn leave(&self) -> Result<()> {
        let (pred, succ) = {
            let state = self.lock_state()?;
            (state.predecessor.clone(), state.successors.head().cloned())
        };
        self.ctx.notify_delegate(DelegateEvent::Leaving {
            local: self.vnode.clone(),
            pred: pred.clone(),
            succ: succ.clone(),
        });

        let trans = &self.ctx.transport;
        let mut err = None;
        if let Some(pred) = &pred {
            err = Error::merge(err, trans.skip_successor(pred, &self.vnode).await.err());
        }
        if let Some(succ) = &succ {
            err = Error::merge(err, trans.clear_predecessor(succ, &self.vnode).await.err());
        }
        err.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl VnodeRpc for LocalVnode {
    async fn get_predecessor(&self) -> Result<Option<Vnode>> {
        self.predecessor()
    }

    async fn notify(&self, candidate: Vnode) -> Result<Vec<Vnode>> {
        let mut state = self.lock_state()?;
        let accept = candidate.id != self.vnode.id
            && match &state.predecessor {
                None => true,
                Some(pred) => between(&pred.id, self.id(), &candidate.id),
            };
        if accept {
            tracing::debug!("{} takes {} as predecessor", self.vnode, candidate);
            let prev = state.predecessor.replace(candidate.clone());
            self.ctx.notify_delegate(DelegateEvent::NewPredecessor {
                local: self.vnode.clone(),
                new: candidate,
                prev,
            });
        }
        Ok(state.successors.list())
    }

    async fn find_successors(&self, n: usize, key: Id) -> Result<Vec<Vnode>> {
        LocalVnode::find_successors(self, n, &key).await
    }

    async fn clear_predecessor(&self, leaving: Vnode) -> Result<()> {
        let mut state = self.lock_state()?;
        if state.predecessor.as_ref() == Some(&leaving) {
            state.predecessor = None;
            self.ctx.notify_delegate(DelegateEvent::PredecessorLeaving {
                local: self.vnode.clone(),
                remote: leaving,
            });
        }
        Ok(())
    }

    async fn skip_successor(&self, leaving: Vnode) -> Result<()> {
        let mut state = self.lock_state()?;
        if state.successors.evict_head(&leaving) {
            self.ctx.notify_delegate(DelegateEvent::SuccessorLeaving {
                local: self.vnode.clone(),
                remote: leaving,
            });
        }
        Ok(())
    }
}

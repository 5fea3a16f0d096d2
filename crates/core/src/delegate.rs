//! Delegate receives notifications about ring membership changes of local vnodes.
use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dht::Vnode;

/// Callbacks about membership changes seen by local vnodes.
///
/// Calls are made from a dedicated task, never while a vnode is locked, so an
/// implementation may call back into the ring. All methods default to no-op.
pub trait Delegate: Send + Sync {
    /// `local` accepted `new` as predecessor, replacing `prev`.
    fn new_predecessor(&self, _local: &Vnode, _new: &Vnode, _prev: Option<&Vnode>) {}
    /// `local` is leaving the ring.
    fn leaving(&self, _local: &Vnode, _pred: Option<&Vnode>, _succ: Option<&Vnode>) {}
    /// The predecessor of `local` announced it is leaving.
    fn predecessor_leaving(&self, _local: &Vnode, _remote: &Vnode) {}
    /// The successor of `local` announced it is leaving.
    fn successor_leaving(&self, _local: &Vnode, _remote: &Vnode) {}
    /// The ring shut down, no more calls follow.
    fn shutdown(&self) {}
}

/// A queued delegate notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateEvent {
    NewPredecessor {
        local: Vnode,
        new: Vnode,
        prev: Option<Vnode>,
    },
    Leaving {
        local: Vnode,
        pred: Option<Vnode>,
        succ: Option<Vnode>,
    },
    PredecessorLeaving {
        local: Vnode,
        remote: Vnode,
    },
    SuccessorLeaving {
        local: Vnode,
        remote: Vnode,
    },
    Shutdown,
}

/// Queue in front of a [Delegate], drained by its own task.
pub(crate) struct DelegateHandle {
    tx: mpsc::UnboundedSender<DelegateEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DelegateHandle {
    /// Start the dispatch task. Must be called within a Tokio runtime.
    pub(crate) fn spawn(delegate: Arc<dyn Delegate>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(dispatch(delegate, rx));
        Self {
            tx,
            task: Mutex::new(Some(task)),
        }
    }

    pub(crate) fn send(&self, event: DelegateEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!("Delegate stopped, dropping event {:?}", e.0);
        }
    }

    /// Deliver the shutdown notification and wait for every queued event.
    pub(crate) async fn stop(&self) {
        self.send(DelegateEvent::Shutdown);
        let task = match self.task.lock() {
            Ok(mut task) => task.take(),
            Err(_) => {
                tracing::error!("Delegate task lock poisoned");
                None
            }
        };
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!("Delegate task failed: {:?}", e);
            }
        }
    }
}

async fn dispatch(delegate: Arc<dyn Delegate>, mut rx: mpsc::UnboundedReceiver<DelegateEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            DelegateEvent::NewPredecessor { local, new, prev } => {
                delegate.new_predecessor(&local, &new, prev.as_ref())
            }
            DelegateEvent::Leaving { local, pred, succ } => {
                delegate.leaving(&local, pred.as_ref(), succ.as_ref())
            }
            DelegateEvent::PredecessorLeaving { local, remote } => {
                delegate.predecessor_leaving(&local, &remote)
            }
            DelegateEvent::SuccessorLeaving { local, remote } => {
                delegate.successor_leaving(&local, &remote)
            }
            DelegateEvent::Shutdown => {
                delegate.shutdown();
                break;
            }
        }
    }
    tracing::debug!("Delegate dispatcher stopped");
}

//! Stabilization: the periodic self repair of each local vnode.
use std::sync::Arc;

use chrono::Utc;

use super::LocalVnode;

/// Schedules the next cycle when dropped, however the current cycle ends.
struct Reschedule<'a>(&'a Arc<LocalVnode>);

impl Drop for Reschedule<'_> {
    fn drop(&mut self) {
        self.0.schedule();
    }
}

impl LocalVnode {
    /// Arm a one-shot timer for the next stabilization cycle, after a
    /// randomized delay. Does nothing once the ring is shutting down.
    pub(crate) fn schedule(self: &Arc<Self>) {
        if self.ctx.is_shutdown() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("{} cannot schedule stabilization outside a runtime", self.vnode());
            return;
        };
        let delay = self.ctx.config.rand_stabilize();
        let vn = Arc::clone(self);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            vn.stabilize().await;
        });

        match self.timer.lock() {
            Ok(mut timer) => {
                if let Some(old) = timer.replace(handle) {
                    old.abort();
                }
            }
            Err(_) => {
                tracing::error!("{} timer lock poisoned", self.vnode());
                handle.abort();
            }
        }
    }

    /// Cancel a pending timer. A cycle that already started runs to its end.
    pub(crate) fn cancel_timer(&self) {
        match self.timer.lock() {
            Ok(mut timer) => {
                if let Some(handle) = timer.take() {
                    handle.abort();
                }
            }
            Err(_) => tracing::error!("{} timer lock poisoned", self.vnode()),
        }
    }

    /// Run one stabilization cycle. Each step's failure is logged and the
    /// next step still runs; the next cycle is scheduled on every exit.
    pub async fn stabilize(self: Arc<Self>) {
        // This cycle runs inside the timer task, forget the handle so that
        // shutdown cannot abort it halfway.
        if let Ok(mut timer) = self.timer.lock() {
            timer.take();
        }

        if self.ctx.is_shutdown() {
            return;
        }
        let _reschedule = Reschedule(&self);

        tracing::trace!("STABILIZATION {} start", self.vnode());
        if let Err(e) = self.check_new_successor().await {
            tracing::error!("[stabilize] Error checking for new successor: {}", e);
        }
        if let Err(e) = self.notify_successor().await {
            tracing::error!("[stabilize] Error notifying successor: {}", e);
        }
        if let Err(e) = self.fix_finger_table().await {
            tracing::error!("[stabilize] Error fixing finger table: {}", e);
        }
        if let Err(e) = self.check_predecessor().await {
            tracing::error!("[stabilize] Error checking predecessor: {}", e);
        }

        match self.lock_state() {
            Ok(mut state) => state.stabilized_at = Some(Utc::now()),
            Err(e) => tracing::error!("[stabilize] {}", e),
        }
        tracing::trace!("STABILIZATION {} end", self.vnode());
    }
}

#![warn(missing_docs)]
//! A ring is the set of local vnodes a process hosts, together with the
//! transport and configuration they share.
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::config::Config;
use crate::delegate::Delegate;
use crate::delegate::DelegateEvent;
use crate::delegate::DelegateHandle;
use crate::dht::Id;
use crate::dht::LocalVnode;
use crate::dht::Vnode;
use crate::error::Error;
use crate::error::Result;
use crate::inspect::RingInspect;
use crate::transport::LocalTransport;
use crate::transport::SharedTransport;
use crate::transport::VnodeRpc;

/// State shared by all local vnodes of a ring.
pub(crate) struct RingContext {
    pub(crate) config: Config,
    pub(crate) transport: SharedTransport,
    shutdown: AtomicBool,
    delegate: Option<DelegateHandle>,
}

impl RingContext {
    /// Must be called within a Tokio runtime when a delegate is given.
    pub(crate) fn new(
        config: Config,
        transport: SharedTransport,
        delegate: Option<Arc<dyn Delegate>>,
    ) -> Self {
        Self {
            config,
            transport,
            shutdown: AtomicBool::new(false),
            delegate: delegate.map(DelegateHandle::spawn),
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Returns `false` if the flag was already set.
    fn set_shutdown(&self) -> bool {
        !self.shutdown.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn notify_delegate(&self, event: DelegateEvent) {
        if let Some(delegate) = &self.delegate {
            delegate.send(event);
        }
    }

    async fn stop_delegate(&self) {
        if let Some(delegate) = &self.delegate {
            delegate.stop().await;
        }
    }
}

/// Creates a RingBuilder to configure a [Ring].
pub struct RingBuilder {
    config: Config,
    transport: SharedTransport,
    delegate: Option<Arc<dyn Delegate>>,
}

impl RingBuilder {
    /// Creates new instance of [RingBuilder]
    pub fn new(config: Config, transport: SharedTransport) -> Self {
        Self {
            config,
            transport,
            delegate: None,
        }
    }

    /// Bind a delegate for membership notifications.
    pub fn delegate(mut self, delegate: Arc<dyn Delegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Build the local vnodes, sorted by id and registered with the transport.
    fn build(self) -> Result<Ring> {
        self.config.validate()?;
        let transport = Arc::new(LocalTransport::new(
            self.config.hostname.clone(),
            self.transport,
        ));
        let ctx = Arc::new(RingContext::new(self.config, transport, self.delegate));

        let mut vnodes = Vec::with_capacity(ctx.config.num_vnodes);
        for idx in 0..ctx.config.num_vnodes {
            let idx = u16::try_from(idx)
                .map_err(|_| Error::InvalidConfig("num_vnodes exceeds 65536".into()))?;
            let vnode = Vnode::generate(&ctx.config, idx);
            vnodes.push(Arc::new(LocalVnode::new(vnode, ctx.clone())));
        }
        vnodes.sort_by(|a, b| a.id().cmp(b.id()));
        if let Some(pair) = vnodes.windows(2).find(|w| w[0].id() == w[1].id()) {
            return Err(Error::InvalidConfig(format!(
                "vnode id collision at {}, widen hash_bits",
                pair[0].id()
            )));
        }

        for vn in vnodes.iter() {
            ctx.transport
                .register(vn.vnode(), vn.clone() as Arc<dyn VnodeRpc>);
        }
        Ok(Ring { ctx, vnodes })
    }

    /// Create a new ring made only of this process's vnodes.
    /// Must be called within a Tokio runtime.
    pub fn create(self) -> Result<Ring> {
        let ring = self.build()?;
        ring.set_local_successors()?;
        ring.schedule();
        tracing::info!(
            "Created ring on {} with {} vnodes",
            ring.ctx.config.hostname,
            ring.vnodes.len()
        );
        Ok(ring)
    }

    /// Join the ring `existing` is part of.
    pub async fn join(self, existing: &str) -> Result<Ring> {
        let ring = self.build()?;
        if let Err(e) = ring.acquire_successors(existing).await {
            ring.shutdown().await;
            return Err(e);
        }

        // A first cycle right away, it schedules the regular ones.
        futures::future::join_all(ring.vnodes.iter().map(|vn| Arc::clone(vn).stabilize())).await;
        tracing::info!(
            "Joined ring through {} with {} vnodes",
            existing,
            ring.vnodes.len()
        );
        Ok(ring)
    }
}

/// The local vnodes of this process and their shared context.
pub struct Ring {
    ctx: Arc<RingContext>,
    vnodes: Vec<Arc<LocalVnode>>,
}

impl Ring {
    /// Configuration of this ring.
    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    /// Local vnodes, ordered by id.
    pub fn vnodes(&self) -> &[Arc<LocalVnode>] {
        &self.vnodes
    }

    /// Snapshot of every local vnode.
    pub fn inspect(&self) -> Result<RingInspect> {
        RingInspect::inspect(self)
    }

    /// Point each vnode at the local vnodes following it.
    fn set_local_successors(&self) -> Result<()> {
        let num = self.vnodes.len();
        let num_succ = self.ctx.config.num_successors.min(num - 1);
        for (idx, vn) in self.vnodes.iter().enumerate() {
            let successors = (0..num_succ)
                .map(|i| self.vnodes[(idx + i + 1) % num].vnode().clone())
                .collect();
            vn.set_successors(successors)?;
        }
        Ok(())
    }

    /// Ask the existing ring for a full successor list of each local vnode.
    /// A ring too small to answer that many gets asked for one, the rest of
    /// the list is then filled by the first stabilization.
    async fn acquire_successors(&self, existing: &str) -> Result<()> {
        let trans = &self.ctx.transport;
        let hosts = trans.list_vnodes(existing).await?;
        if hosts.is_empty() {
            return Err(Error::RemoteHostHasNoVnodes(existing.to_string()));
        }

        let want = self.ctx.config.num_successors;
        for vn in self.vnodes.iter() {
            let nearest = nearest_vnode_to_key(&hosts, vn.id());
            let mut res = trans.find_successors(nearest, want, vn.id()).await;
            if want > 1 && !matches!(&res, Ok(succs) if !succs.is_empty()) {
                tracing::warn!(
                    "{} cannot get {} successors from {}, asking for one",
                    vn.vnode(),
                    want,
                    nearest
                );
                res = trans.find_successors(nearest, 1, vn.id()).await;
            }
            let succs = res.map_err(|e| Error::JoinFailed {
                vnode: vn.vnode().to_string(),
                reason: e.to_string(),
            })?;
            if succs.is_empty() {
                return Err(Error::JoinFailed {
                    vnode: vn.vnode().to_string(),
                    reason: "got no vnodes".to_string(),
                });
            }
            vn.set_successors(succs)?;
        }
        Ok(())
    }

    fn schedule(&self) {
        for vn in self.vnodes.iter() {
            vn.schedule();
        }
    }

    /// Stop further cycles. Returns `false` if they were already stopped.
    fn stop_vnodes(&self) -> bool {
        if !self.ctx.set_shutdown() {
            return false;
        }
        for vn in self.vnodes.iter() {
            vn.cancel_timer();
        }
        true
    }

    fn deregister(&self) {
        for vn in self.vnodes.iter() {
            self.ctx.transport.deregister(vn.vnode());
        }
    }

    /// The vnode to start a lookup of `key` from: the last one before it,
    /// wrapping to the last vnode.
    fn nearest_vnode(&self, key: &Id) -> Result<&Arc<LocalVnode>> {
        self.vnodes
            .iter()
            .rev()
            .find(|vn| vn.id() < key)
            .or_else(|| self.vnodes.last())
            .ok_or_else(|| Error::InvalidConfig("ring has no vnodes".into()))
    }

    /// Find the `n` vnodes responsible for `key`, hashed with the ring's
    /// hash function.
    pub async fn lookup(&self, n: usize, key: &[u8]) -> Result<Vec<Vnode>> {
        let config = &self.ctx.config;
        let key_hash = Id::hashed(config.hash_func, config.hash_bits, &[key]);
        self.lookup_id(n, &key_hash).await
    }

    /// Find the `n` vnodes following an already hashed `key`.
    pub async fn lookup_id(&self, n: usize, key: &Id) -> Result<Vec<Vnode>> {
        let max = self.ctx.config.num_successors;
        if n > max {
            return Err(Error::TooManySuccessors { requested: n, max });
        }
        key.ensure_len(self.ctx.config.hash_bits)?;
        let nearest = self.nearest_vnode(key)?;
        let mut successors = nearest.find_successors(n, key).await?;
        successors.truncate(n);
        Ok(successors)
    }

    /// Leave the ring gracefully: stop stabilizing, hand each vnode's
    /// position over to its neighbours, then stop serving RPCs.
    pub async fn leave(&self) -> Result<()> {
        if !self.stop_vnodes() {
            return Ok(());
        }
        let mut err = None;
        for vn in self.vnodes.iter() {
            err = Error::merge(err, vn.leave().await.err());
        }
        self.deregister();
        self.ctx.stop_delegate().await;
        tracing::info!("Left ring on {}", self.ctx.config.hostname);
        err.map_or(Ok(()), Err)
    }

    /// Stop stabilizing and serving RPCs without telling anyone.
    /// In-flight cycles run to their end but schedule nothing.
    pub async fn shutdown(&self) {
        if !self.stop_vnodes() {
            return;
        }
        self.deregister();
        self.ctx.stop_delegate().await;
        tracing::info!("Shut down ring on {}", self.ctx.config.hostname);
    }
}

/// A ring dropped without [Ring::leave] or [Ring::shutdown] stops its timers
/// and deregisters its vnodes. The delegate gets no shutdown event.
impl Drop for Ring {
    fn drop(&mut self) {
        if self.stop_vnodes() {
            self.deregister();
        }
    }
}

/// The last vnode of the sorted `vnodes` before `key`, wrapping to the last.
fn nearest_vnode_to_key<'a>(vnodes: &'a [Vnode], key: &Id) -> &'a Vnode {
    vnodes
        .iter()
        .rev()
        .find(|vn| vn.id < *key)
        .unwrap_or(&vnodes[vnodes.len() - 1])
}

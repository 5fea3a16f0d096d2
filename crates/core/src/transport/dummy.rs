//! In-memory transports for local testing.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;

use crate::consts::DUMMY_DELAY_MAX_MS;
use crate::dht::Id;
use crate::dht::Vnode;
use crate::error::Error;
use crate::error::Result;
use crate::transport::Transport;
use crate::transport::VnodeRpc;

/// An in-memory network. Cloned handles share the same set of registered
/// vnodes, so several rings built on clones can reach each other with no real
/// network. A deregistered vnode looks dead: ping answers `false` and every
/// other call fails.
#[derive(Clone, Default)]
pub struct DummyTransport {
    vnodes: Arc<DashMap<Id, (Vnode, Arc<dyn VnodeRpc>)>>,
    delay_max_ms: Option<u64>,
}

impl DummyTransport {
    /// A fresh, empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay each call by a random duration up to [DUMMY_DELAY_MAX_MS].
    pub fn with_random_delay(mut self) -> Self {
        self.delay_max_ms = Some(DUMMY_DELAY_MAX_MS);
        self
    }

    /// Whether `vnode` is currently reachable.
    pub fn is_registered(&self, vnode: &Vnode) -> bool {
        self.vnodes.contains_key(&vnode.id)
    }

    fn handler(&self, target: &Vnode) -> Result<Arc<dyn VnodeRpc>> {
        self.vnodes
            .get(&target.id)
            .map(|e| e.value().1.clone())
            .ok_or_else(|| Error::VnodeNotFound(target.to_string()))
    }

    async fn random_delay(&self) {
        if let Some(max) = self.delay_max_ms {
            let ms = rand::thread_rng().gen_range(0..=max);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl Transport for DummyTransport {
    async fn list_vnodes(&self, host: &str) -> Result<Vec<Vnode>> {
        self.random_delay().await;
        let mut vnodes: Vec<Vnode> = self
            .vnodes
            .iter()
            .filter(|e| e.value().0.host == host)
            .map(|e| e.value().0.clone())
            .collect();
        vnodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(vnodes)
    }

    async fn ping(&self, target: &Vnode) -> Result<bool> {
        self.random_delay().await;
        Ok(self.is_registered(target))
    }

    async fn get_predecessor(&self, target: &Vnode) -> Result<Option<Vnode>> {
        self.random_delay().await;
        self.handler(target)?.get_predecessor().await
    }

    async fn notify(&self, target: &Vnode, this: &Vnode) -> Result<Vec<Vnode>> {
        self.random_delay().await;
        self.handler(target)?.notify(this.clone()).await
    }

    async fn find_successors(&self, target: &Vnode, n: usize, key: &Id) -> Result<Vec<Vnode>> {
        self.random_delay().await;
        self.handler(target)?.find_successors(n, key.clone()).await
    }

    async fn clear_predecessor(&self, target: &Vnode, this: &Vnode) -> Result<()> {
        self.random_delay().await;
        self.handler(target)?.clear_predecessor(this.clone()).await
    }

    async fn skip_successor(&self, target: &Vnode, this: &Vnode) -> Result<()> {
        self.random_delay().await;
        self.handler(target)?.skip_successor(this.clone()).await
    }

    fn register(&self, vnode: &Vnode, handler: Arc<dyn VnodeRpc>) {
        self.vnodes.insert(vnode.id.clone(), (vnode.clone(), handler));
    }

    fn deregister(&self, vnode: &Vnode) {
        self.vnodes.remove(&vnode.id);
    }
}

/// A transport where every call fails and every peer looks dead.
/// Useful as the remote side of a ring that only talks to itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlackholeTransport;

#[async_trait]
impl Transport for BlackholeTransport {
    async fn list_vnodes(&self, host: &str) -> Result<Vec<Vnode>> {
        Err(Error::Blackhole(host.to_string()))
    }

    async fn ping(&self, _target: &Vnode) -> Result<bool> {
        Ok(false)
    }

    async fn get_predecessor(&self, target: &Vnode) -> Result<Option<Vnode>> {
        Err(Error::Blackhole(target.to_string()))
    }

    async fn notify(&self, target: &Vnode, _this: &Vnode) -> Result<Vec<Vnode>> {
        Err(Error::Blackhole(target.to_string()))
    }

    async fn find_successors(&self, target: &Vnode, _n: usize, _key: &Id) -> Result<Vec<Vnode>> {
        Err(Error::Blackhole(target.to_string()))
    }

    async fn clear_predecessor(&self, target: &Vnode, _this: &Vnode) -> Result<()> {
        Err(Error::Blackhole(target.to_string()))
    }

    async fn skip_successor(&self, target: &Vnode, _this: &Vnode) -> Result<()> {
        Err(Error::Blackhole(target.to_string()))
    }

    fn register(&self, _vnode: &Vnode, _handler: Arc<dyn VnodeRpc>) {}

    fn deregister(&self, _vnode: &Vnode) {}
}

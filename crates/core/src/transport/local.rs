//! Transport that serves vnodes of this process directly.
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::dht::Id;
use crate::dht::Vnode;
use crate::error::Result;
use crate::transport::SharedTransport;
use crate::transport::Transport;
use crate::transport::VnodeRpc;

/// Wraps a remote transport. Calls addressed to vnodes registered by this
/// process are dispatched in-process, everything else is forwarded.
pub struct LocalTransport {
    host: String,
    remote: SharedTransport,
    local: DashMap<Id, (Vnode, Arc<dyn VnodeRpc>)>,
}

impl LocalTransport {
    /// Serve vnodes of `host` locally, forward the rest to `remote`.
    pub fn new(host: impl Into<String>, remote: SharedTransport) -> Self {
        Self {
            host: host.into(),
            remote,
            local: DashMap::new(),
        }
    }

    fn get(&self, vnode: &Vnode) -> Option<Arc<dyn VnodeRpc>> {
        self.local
            .get(&vnode.id)
            .filter(|e| e.value().0 == *vnode)
            .map(|e| e.value().1.clone())
    }

    /// Vnodes registered by this process, ordered by id.
    pub fn local_vnodes(&self) -> Vec<Vnode> {
        let mut vnodes: Vec<Vnode> = self.local.iter().map(|e| e.value().0.clone()).collect();
        vnodes.sort_by(|a, b| a.id.cmp(&b.id));
        vnodes
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn list_vnodes(&self, host: &str) -> Result<Vec<Vnode>> {
        if host == self.host {
            return Ok(self.local_vnodes());
        }
        self.remote.list_vnodes(host).await
    }

    async fn ping(&self, target: &Vnode) -> Result<bool> {
        if self.get(target).is_some() {
            return Ok(true);
        }
        self.remote.ping(target).await
    }

    async fn get_predecessor(&self, target: &Vnode) -> Result<Option<Vnode>> {
        match self.get(target) {
            Some(rpc) => rpc.get_predecessor().await,
            None => self.remote.get_predecessor(target).await,
        }
    }

    async fn notify(&self, target: &Vnode, this: &Vnode) -> Result<Vec<Vnode>> {
        match self.get(target) {
            Some(rpc) => rpc.notify(this.clone()).await,
            None => self.remote.notify(target, this).await,
        }
    }

    async fn find_successors(&self, target: &Vnode, n: usize, key: &Id) -> Result<Vec<Vnode>> {
        match self.get(target) {
            Some(rpc) => rpc.find_successors(n, key.clone()).await,
            None => self.remote.find_successors(target, n, key).await,
        }
    }

    async fn clear_predecessor(&self, target: &Vnode, this: &Vnode) -> Result<()> {
        match self.get(target) {
            Some(rpc) => rpc.clear_predecessor(this.clone()).await,
            None => self.remote.clear_predecessor(target, this).await,
        }
    }

    async fn skip_successor(&self, target: &Vnode, this: &Vnode) -> Result<()> {
        match self.get(target) {
            Some(rpc) => rpc.skip_successor(this.clone()).await,
            None => self.remote.skip_successor(target, this).await,
        }
    }

    fn register(&self, vnode: &Vnode, handler: Arc<dyn VnodeRpc>) {
        self.local
            .insert(vnode.id.clone(), (vnode.clone(), handler.clone()));
        self.remote.register(vnode, handler);
    }

    fn deregister(&self, vnode: &Vnode) {
        self.local.remove(&vnode.id);
        self.remote.deregister(vnode);
    }
}

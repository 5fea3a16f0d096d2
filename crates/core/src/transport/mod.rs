#![warn(missing_docs)]
//! The RPC seam between vnodes.
//!
//! A [Transport] carries the calls a vnode makes to its peers, a [VnodeRpc] is
//! what the transport invokes on behalf of a peer. The wire format, dialing and
//! per-call timeouts belong to the transport implementation.
use std::sync::Arc;

use async_trait::async_trait;

use crate::dht::Id;
use crate::dht::Vnode;
use crate::error::Result;

pub mod dummy;
pub mod local;

pub use dummy::BlackholeTransport;
pub use dummy::DummyTransport;
pub use local::LocalTransport;

/// Shared transport handle.
pub type SharedTransport = Arc<dyn Transport>;

/// Server side of the vnode protocol.
#[async_trait]
pub trait VnodeRpc: Send + Sync {
    /// Return the current predecessor, if known.
    async fn get_predecessor(&self) -> Result<Option<Vnode>>;

    /// `candidate` thinks it may be our predecessor.
    /// Always answers with our successor list.
    async fn notify(&self, candidate: Vnode) -> Result<Vec<Vnode>>;

    /// The `n` closest successors of `key`.
    async fn find_successors(&self, n: usize, key: Id) -> Result<Vec<Vnode>>;

    /// Our predecessor `leaving` is leaving the ring.
    async fn clear_predecessor(&self, leaving: Vnode) -> Result<()>;

    /// Our successor `leaving` is leaving the ring.
    async fn skip_successor(&self, leaving: Vnode) -> Result<()>;
}

/// Client side of the vnode protocol.
/// Calls either succeed or fail with an error; a dead peer is detected by
/// [Transport::ping] answering `false`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Vnodes served by `host`.
    async fn list_vnodes(&self, host: &str) -> Result<Vec<Vnode>>;

    /// Check whether `target` is alive.
    async fn ping(&self, target: &Vnode) -> Result<bool>;

    /// Ask `target` for its predecessor.
    async fn get_predecessor(&self, target: &Vnode) -> Result<Option<Vnode>>;

    /// Notify `target` that `this` may be its predecessor, return its successor list.
    async fn notify(&self, target: &Vnode, this: &Vnode) -> Result<Vec<Vnode>>;

    /// Ask `target` for the `n` closest successors of `key`.
    async fn find_successors(&self, target: &Vnode, n: usize, key: &Id) -> Result<Vec<Vnode>>;

    /// Tell `target` that its predecessor `this` is leaving.
    async fn clear_predecessor(&self, target: &Vnode, this: &Vnode) -> Result<()>;

    /// Tell `target` that its successor `this` is leaving.
    async fn skip_successor(&self, target: &Vnode, this: &Vnode) -> Result<()>;

    /// Bind a vnode to the handler serving its RPCs.
    fn register(&self, vnode: &Vnode, handler: Arc<dyn VnodeRpc>);

    /// Stop serving a vnode.
    fn deregister(&self, vnode: &Vnode);
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::dht::id::tests::id;
use crate::dht::Id;
use crate::dht::LocalVnode;
use crate::dht::Vnode;
use crate::error::Error;
use crate::error::Result;
use crate::ring::Ring;
use crate::ring::RingContext;
use crate::transport::DummyTransport;
use crate::transport::SharedTransport;
use crate::transport::Transport;
use crate::transport::VnodeRpc;

mod test_stabilization;

/// Vnodes on a 64 position ring, one host each, reachable through a shared
/// [DummyTransport]. Nothing is scheduled, steps are driven by hand.
pub fn gen_vnodes_on_dummy(ids: &[u8]) -> (DummyTransport, Vec<Arc<LocalVnode>>) {
    let network = DummyTransport::new();
    let vnodes = ids
        .iter()
        .map(|i| {
            let host = format!("host{}", i);
            let config = Config {
                hash_bits: 6,
                num_successors: 2,
                ..Config::new(host.clone())
            };
            let ctx = Arc::new(RingContext::new(config, Arc::new(network.clone()), None));
            let vn = Arc::new(LocalVnode::new(Vnode::new(id(*i), host), ctx));
            network.register(vn.vnode(), vn.clone() as Arc<dyn VnodeRpc>);
            vn
        })
        .collect();
    (network, vnodes)
}

/// A transport with scripted answers: `get_predecessor` reports
/// `predecessor` or fails, `ping` finds only `alive` vnodes or fails when
/// `ping_fails` is set. Every other call fails.
#[derive(Default)]
pub struct FlakyTransport {
    pub predecessor: Option<Vnode>,
    pub alive: Vec<Vnode>,
    pub ping_fails: bool,
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn list_vnodes(&self, host: &str) -> Result<Vec<Vnode>> {
        Err(Error::Blackhole(host.to_string()))
    }

    async fn ping(&self, target: &Vnode) -> Result<bool> {
        if self.ping_fails {
            return Err(Error::Blackhole(target.to_string()));
        }
        Ok(self.alive.contains(target))
    }

    async fn get_predecessor(&self, target: &Vnode) -> Result<Option<Vnode>> {
        match &self.predecessor {
            Some(p) => Ok(Some(p.clone())),
            None => Err(Error::Blackhole(target.to_string())),
        }
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

/// Vnode 10 on a 64 position ring, talking only through `transport`.
pub fn vnode_on(transport: SharedTransport) -> LocalVnode {
    let config = Config {
        hash_bits: 6,
        num_successors: 2,
        ..Config::new("host10")
    };
    let ctx = Arc::new(RingContext::new(config, transport, None));
    LocalVnode::new(Vnode::new(id(10), "host10"), ctx)
}

/// Run the four stabilization steps once on every vnode, in order.
pub async fn stabilize_round(vnodes: &[Arc<LocalVnode>]) {
    for vn in vnodes {
        let _ = vn.check_new_successor().await;
        let _ = vn.notify_successor().await;
        let _ = vn.fix_finger_table().await;
        let _ = vn.check_predecessor().await;
    }
}

/// A small, fast stabilizing ring config.
pub fn fast_config(host: &str) -> Config {
    Config {
        num_vnodes: 3,
        num_successors: 4,
        hash_bits: 32,
        stabilize_interval_ms: 20,
        stabilize_jitter_ms: 10,
        ..Config::new(host)
    }
}

/// All vnodes of `rings`, ordered by id.
pub fn sorted_vnodes(rings: &[&Ring]) -> Vec<Vnode> {
    let mut all: Vec<Vnode> = rings
        .iter()
        .flat_map(|r| r.vnodes().iter().map(|vn| vn.vnode().clone()))
        .collect();
    all.sort_by(|a, b| a.id.cmp(&b.id));
    all
}

/// The `n` vnodes of the sorted `all` responsible for `key`.
pub fn expected_successors(all: &[Vnode], key: &Id, n: usize) -> Vec<Vnode> {
    let start = all.iter().position(|v| v.id >= *key).unwrap_or(0);
    (0..n).map(|i| all[(start + i) % all.len()].clone()).collect()
}

/// Whether every vnode of `rings` knows its true predecessor, and the head of
/// its successor list matches the true successors.
pub fn successors_converged(rings: &[&Ring]) -> bool {
    let all = sorted_vnodes(rings);
    let total = all.len();
    rings.iter().all(|r| {
        let known = r.config().num_successors.min(total - 1);
        r.vnodes().iter().all(|vn| {
            let idx = all.iter().position(|v| v == vn.vnode()).unwrap();
            let expect: Vec<Vnode> = (1..=known)
                .map(|k| all[(idx + k) % total].clone())
                .collect();
            let pred = &all[(idx + total - 1) % total];
            let succ_ok = vn
                .successors()
                .map(|s| s.len() >= known && s[..known] == expect[..])
                .unwrap_or(false);
            let pred_ok = vn
                .predecessor()
                .map(|p| p.as_ref() == Some(pred))
                .unwrap_or(false);
            succ_ok && pred_ok
        })
    })
}

/// Poll until `rings` converge, panicking after about five seconds.
pub async fn wait_converged(rings: &[&Ring]) {
    for _ in 0..100 {
        if successors_converged(rings) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("rings did not converge");
}

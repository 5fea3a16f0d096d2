//! Vnode is a virtual position on the ring, owned by some host.
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::config::Config;
use crate::dht::Id;

/// Identity of a vnode: where it sits on the ring and which host serves it.
/// Two vnodes are the same ring position iff their ids are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vnode {
    pub id: Id,
    pub host: String,
}

impl Vnode {
    pub fn new(id: Id, host: impl Into<String>) -> Self {
        Self {
            id,
            host: host.into(),
        }
    }

    /// Generate the vnode with index `idx` for the configured host.
    /// The same hostname, index and hash function always give the same id,
    /// so a restarted process rejoins at the same positions.
    pub fn generate(config: &Config, idx: u16) -> Self {
        Self::new(gen_id(config, idx), config.hostname.clone())
    }
}

/// Hash the hostname followed by the big-endian index.
pub fn gen_id(config: &Config, idx: u16) -> Id {
    Id::hashed(config.hash_func, config.hash_bits, &[
        config.hostname.as_bytes(),
        &idx.to_be_bytes(),
    ])
}

/// Diagnostic rendering, the hex of the raw id.
impl fmt::Display for Vnode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

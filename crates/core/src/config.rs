//! Ring configuration.
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use sha1::Sha1;
use sha2::Digest;
use sha2::Sha256;

use crate::consts::DEFAULT_HASH_BITS;
use crate::consts::DEFAULT_NUM_SUCCESSORS;
use crate::consts::DEFAULT_NUM_VNODES;
use crate::consts::DEFAULT_STABILIZE_INTERVAL_MS;
use crate::consts::DEFAULT_STABILIZE_JITTER_MS;
use crate::error::Error;
use crate::error::Result;

/// Digest used to place vnodes and keys on the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFunc {
    #[default]
    Sha1,
    Sha256,
}

impl HashFunc {
    /// Width of the digest in bits.
    pub fn output_bits(&self) -> usize {
        match self {
            HashFunc::Sha1 => 160,
            HashFunc::Sha256 => 256,
        }
    }

    /// Feed all `parts` into a fresh hasher and return the raw digest.
    pub fn digest(&self, parts: &[&[u8]]) -> Vec<u8> {
        match self {
            HashFunc::Sha1 => digest_with::<Sha1>(parts),
            HashFunc::Sha256 => digest_with::<Sha256>(parts),
        }
    }
}

fn digest_with<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

/// Configuration of a [Ring](crate::ring::Ring).
///
/// Every field has a default, so a partial YAML document is enough:
///
/// ```yaml
/// hostname: 10.0.0.1:4000
/// num_vnodes: 4
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity seed of this process, also the address peers use to list its vnodes.
    pub hostname: String,
    /// Number of vnodes hosted by this process.
    pub num_vnodes: usize,
    /// Capacity of each vnode's successor list.
    pub num_successors: usize,
    pub hash_func: HashFunc,
    /// Width of the identifier space, the ring has 2^hash_bits positions.
    pub hash_bits: usize,
    /// Base delay between two stabilization cycles of a vnode.
    pub stabilize_interval_ms: u64,
    /// Random deviation applied to every delay, so vnodes do not synchronize.
    pub stabilize_jitter_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            num_vnodes: DEFAULT_NUM_VNODES,
            num_successors: DEFAULT_NUM_SUCCESSORS,
            hash_func: HashFunc::default(),
            hash_bits: DEFAULT_HASH_BITS,
            stabilize_interval_ms: DEFAULT_STABILIZE_INTERVAL_MS,
            stabilize_jitter_ms: DEFAULT_STABILIZE_JITTER_MS,
        }
    }
}

impl Config {
    /// Default config for the given hostname.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Default::default()
        }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the settings are consistent with each other.
    pub fn validate(&self) -> Result<()> {
        if self.num_vnodes == 0 {
            return Err(Error::InvalidConfig("num_vnodes must be positive".into()));
        }
        if self.num_vnodes > usize::from(u16::MAX) + 1 {
            return Err(Error::InvalidConfig(
                "num_vnodes cannot exceed 65536".into(),
            ));
        }
        if self.num_successors == 0 {
            return Err(Error::InvalidConfig(
                "num_successors must be positive".into(),
            ));
        }
        if self.hash_bits == 0 || self.hash_bits > self.hash_func.output_bits() {
            return Err(Error::InvalidConfig(format!(
                "hash_bits must be within 1..={} for {:?}",
                self.hash_func.output_bits(),
                self.hash_func
            )));
        }
        if self.stabilize_jitter_ms > self.stabilize_interval_ms {
            return Err(Error::InvalidConfig(
                "stabilize_jitter_ms cannot exceed stabilize_interval_ms".into(),
            ));
        }
        Ok(())
    }

    /// Random delay before the next stabilization cycle,
    /// uniform in `[interval - jitter, interval + jitter]`.
    pub fn rand_stabilize(&self) -> Duration {
        let low = self
            .stabilize_interval_ms
            .saturating_sub(self.stabilize_jitter_ms);
        let high = self
            .stabilize_interval_ms
            .saturating_add(self.stabilize_jitter_ms);
        if low == high {
            return Duration::from_millis(low);
        }
        Duration::from_millis(rand::thread_rng().gen_range(low..=high))
    }
}

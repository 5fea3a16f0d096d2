use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::dht::LocalVnode;
use crate::error::Result;
use crate::ring::Ring;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingInspect {
    pub hostname: String,
    pub vnodes: Vec<VnodeInspect>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VnodeInspect {
    pub id: String,
    pub host: String,
    pub successors: Vec<String>,
    #[serde(default)]
    pub predecessor: Option<String>,
    /// Runs of equal fingers as `(owner, first index, last index)`.
    pub finger_table: Vec<(Option<String>, u64, u64)>,
    pub last_finger: usize,
    #[serde(default)]
    pub stabilized_at: Option<DateTime<Utc>>,
}

impl RingInspect {
    pub fn inspect(ring: &Ring) -> Result<Self> {
        let vnodes = ring
            .vnodes()
            .iter()
            .map(|vn| VnodeInspect::inspect(vn))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            hostname: ring.config().hostname.clone(),
            vnodes,
        })
    }
}

impl VnodeInspect {
    pub fn inspect(vn: &LocalVnode) -> Result<Self> {
        let state = vn.snapshot()?;
        let successors = state.successors.iter().map(|s| s.to_string()).collect();
        let predecessor = state.predecessor.as_ref().map(|p| p.to_string());
        let finger_table = {
            let finger = state
                .finger
                .list()
                .iter()
                .map(|x| x.as_ref().map(|v| v.to_string()));
            compress_iter(finger)
        };

        Ok(Self {
            id: vn.id().to_string(),
            host: vn.vnode().host.clone(),
            successors,
            predecessor,
            finger_table,
            last_finger: state.finger.fix_finger_index(),
            stabilized_at: state.stabilized_at,
        })
    }
}

pub fn compress_iter<T>(iter: impl Iterator<Item = T>) -> Vec<(T, u64, u64)>
where T: PartialEq {
    let mut result = vec![];
    let mut start = 0u64;
    let mut count = 0u64;
    let mut prev: Option<T> = None;

    for (i, x) in iter.enumerate() {
        match prev {
            Some(p) if p == x => {
                count += 1;
                prev = Some(p);
                continue;
            }
            Some(p) => result.push((p, start, start + count - 1)),
            None => {}
        }
        start = i as u64;
        count = 1;
        prev = Some(x);
    }

    if let Some(p) = prev {
        result.push((p, start, start + count - 1));
    }

    result
}

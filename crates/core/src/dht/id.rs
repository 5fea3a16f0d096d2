//! Identifiers on the ring and interval arithmetic over them.
//!
//! An [Id] is a fixed-length big-endian unsigned integer modulo 2^hash_bits.
//! All ids of one ring have the same length, so byte-lexicographic order is
//! numeric order.
use std::fmt;

use num_bigint::BigUint;
use serde::Deserialize;
use serde::Serialize;

use crate::config::HashFunc;
use crate::error::Error;
use crate::error::Result;

/// Position on the ring.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Id(Vec<u8>);

impl Id {
    /// Wrap raw bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Hash `parts` and use the leading `ceil(bits/8)` bytes of the digest,
    /// masking off everything above `bits`.
    pub fn hashed(hash_func: HashFunc, bits: usize, parts: &[&[u8]]) -> Self {
        let mut bytes = hash_func.digest(parts);
        bytes.truncate(id_len(bits));
        let extra = bits % 8;
        if extra != 0 {
            if let Some(first) = bytes.first_mut() {
                *first &= (1u8 << extra) - 1;
            }
        }
        Self(bytes)
    }

    /// Check the id was built for a ring of `bits` width.
    pub fn ensure_len(&self, bits: usize) -> Result<()> {
        let expected = id_len(bits);
        if self.0.len() != expected {
            return Err(Error::IdLengthMismatch {
                expected,
                got: self.0.len(),
            });
        }
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }
}

impl From<Vec<u8>> for Id {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Id {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Id({})", hex::encode(&self.0))
    }
}

fn id_len(bits: usize) -> usize {
    (bits + 7) / 8
}

fn ring_size(bits: usize) -> BigUint {
    BigUint::from(1u8) << bits
}

fn to_fixed_bytes(value: &BigUint, len: usize) -> Vec<u8> {
    let mut raw = value.to_bytes_be();
    if raw.len() > len {
        return raw.split_off(raw.len() - len);
    }
    let mut res = vec![0u8; len - raw.len()];
    res.append(&mut raw);
    res
}

/// Test x <- (a, b) going clockwise.
/// The arc from a vnode to itself spans the whole ring except the vnode.
pub fn between(a: &Id, b: &Id, x: &Id) -> bool {
    if a == b {
        return x != a;
    }
    if a > b {
        // wraps around zero
        return a < x || b > x;
    }
    a < x && b > x
}

/// Test x <- (a, b] going clockwise.
/// The arc from a vnode to itself spans the whole ring.
pub fn between_right_incl(a: &Id, b: &Id, x: &Id) -> bool {
    if a == b {
        return true;
    }
    if a > b {
        return a < x || b >= x;
    }
    a < x && b >= x
}

/// Computes `(id + 2^exp) mod 2^bits`, with the same length as `id`.
pub fn power_offset(id: &Id, exp: usize, bits: usize) -> Id {
    let sum = id.to_biguint() + (BigUint::from(1u8) << exp);
    let reduced = sum % ring_size(bits);
    Id(to_fixed_bytes(&reduced, id.len()))
}

/// Clockwise distance from `a` to `b` on a ring of `bits` width.
pub fn distance(a: &Id, b: &Id, bits: usize) -> BigUint {
    let size = ring_size(bits);
    ((b.to_biguint() + &size) - a.to_biguint()) % size
}

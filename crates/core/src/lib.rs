//! Chordring: Chord ring maintenance for virtual nodes.
//! --------------
//! - [Ring](crate::ring::Ring) owns the vnodes a process hosts, and creates, joins, leaves
//!   or looks up keys on a ring.
//! - [LocalVnode](crate::dht::LocalVnode) keeps the routing state of one vnode and repairs it
//!   with a periodic stabilization cycle.
//! - [Transport](crate::transport::Transport) carries the five vnode RPCs between hosts.
//!   In-memory implementations are provided for local testing.
//! - [Delegate](crate::delegate::Delegate) is told about membership changes.
//!
//! # Ring
//!
//! Every vnode is identified by an [Id](crate::dht::Id), a `hash_bits` wide integer taken
//! from the hash of its hostname and index. Ids are ordered clockwise on a ring modulo
//! `2^hash_bits`; a key belongs to the first vnode at or after it.
//!
//! # Stabilization
//!
//! Each vnode runs its cycle on a randomized timer, with four steps:
//!
//! 1. Check new successor: ask the successor for its predecessor, switch to it if it sits
//!    between us, evict the successor if it is dead.
//! 2. Notify successor: tell the successor about us and take over its successor list.
//! 3. Fix finger: resolve one finger table entry, round robin.
//! 4. Check predecessor: forget it once it stops answering pings.
//!
//! A failed step is logged, the following steps still run, and the next cycle is always
//! scheduled until the ring shuts down.
//!
//! # Lookup
//!
//! `find_successors` answers from the successor list when it covers the key, and otherwise
//! forwards to the known vnodes preceding the key, closest first, until one answers.

pub mod config;
pub mod consts;
pub mod delegate;
pub mod dht;
pub mod error;
pub mod inspect;
pub mod ring;
pub mod transport;

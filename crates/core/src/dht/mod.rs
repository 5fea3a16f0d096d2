//! Chord maintenance for virtual nodes,
//! ref: <https://pdos.csail.mit.edu/papers/ton:chord/paper-ton.pdf>
//!
//! Each local vnode keeps a successor list, a finger table and a predecessor,
//! and repairs them with a periodic stabilization cycle. Lookups walk the
//! closest preceding vnodes known locally until one of them answers.

mod closest;
/// Finger table of a vnode
pub mod finger;
pub mod id;
mod local;
mod stabilization;
pub mod successor;
/// Vnode is a position on the ring served by some host
pub mod vnode;

pub use closest::ClosestPreceding;
pub use finger::FingerTable;
pub use id::between;
pub use id::between_right_incl;
pub use id::Id;
pub use local::LocalVnode;
pub use successor::SuccessorList;
pub use vnode::Vnode;

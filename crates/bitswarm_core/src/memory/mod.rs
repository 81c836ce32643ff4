//! # Memory Management
//!
//! Recycling pools for per-tick transient objects.
//!
//! ## Design Philosophy
//!
//! Frames are built and decoded many times per tick. Their buffers are
//! loaned from pools and handed back when the tick ends:
//! - No steady-state buffer allocation
//! - Pool size bounded by its capacity

mod pool;

pub use pool::{ObjectPool, Recycle, ScratchPool};

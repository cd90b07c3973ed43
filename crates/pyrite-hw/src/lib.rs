//! Hardware collaborator layer for the pyrite driver
//!
//! The GPU is a fixed-function rasterizer programmed through a register
//! combiner. This crate models its command transport: the method table and
//! register field encodings, the push buffer with its busy-wait
//! synchronization points, the tiled (swizzled) texture memory layout, and
//! the contiguous GPU address space.

pub mod cmd;
pub mod gpumem;
pub mod push;
pub mod swizzle;

pub use gpumem::AddressSpace;
pub use push::{BatchStats, GpuTransport, NullTransport, PushBuffer};

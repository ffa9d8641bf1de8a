//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside request traffic.
//!
//! # Tasks
//! - TTL Sweep: Removes expired cache entries at a coarse interval

mod cleanup;

pub(crate) use cleanup::spawn_sweeper;

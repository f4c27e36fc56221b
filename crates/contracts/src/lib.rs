//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Angle Model
//! - Raw angles are normalized to [0, 360) with 0 pointing straight down
//! - Band filters that span the wrap use the signed form (-180, 180]

mod blueprint;
mod error;
mod quality;
mod sensor;
mod sink;
mod snapshot;
mod source;

pub use blueprint::*;
pub use error::*;
pub use quality::*;
pub use sensor::*;
pub use sink::*;
pub use snapshot::*;
pub use source::*;

//! Core pricing, liquidity, and accounting engine for a discrete-bin
//! liquidity market maker: bin math, multi-bin swap traversal, position
//! accounting, and reward distribution. See each module for the part of
//! the design it carries.

mod constants;
mod error;
mod math;
mod quote;
mod types;

pub use constants::*;
pub use error::*;
pub use math::*;
pub use quote::*;
pub use types::*;

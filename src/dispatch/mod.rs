//! Command queue handoff
//!
//! [`DispatchGate`] waits for the single-slot queue file to clear, then
//! writes one command.

mod gate;

pub use gate::{DispatchError, DispatchGate, DispatchReceipt};

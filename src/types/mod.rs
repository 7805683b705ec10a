//! Shared data structures for the scan dispatch pipeline
//!
//! - `ScanRecord`: one decoded observation document (input)
//! - `ProjectState`: last-seen scan of a project with an open session
//! - `DispatchEvent`: a trigger decision handed to the command queue (output)

mod event;
mod scan;
mod state;

pub use event::*;
pub use scan::*;
pub use state::*;

//! Content writers and the pusher that hands them out.

mod base;
mod layer_writer;
mod manifest_writer;
mod pusher;
mod writer;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub(crate) use base::*;
pub use layer_writer::*;
pub use manifest_writer::*;
pub use pusher::*;
pub use writer::*;

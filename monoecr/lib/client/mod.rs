//! The registry control-plane API that the push path is written against.

mod api;
mod types;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use api::*;
pub use types::*;

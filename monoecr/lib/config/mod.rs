//! Configuration types and defaults.

mod defaults;
mod layer_writer;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use layer_writer::*;

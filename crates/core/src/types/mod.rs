//! Core type definitions shared by the generator and the solvers.

pub mod example;
pub mod result;
pub mod trace;
pub mod value;

pub use example::*;
pub use result::*;
pub use trace::*;
pub use value::*;

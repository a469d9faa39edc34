//! Domain model module declarations.

pub mod injection;
pub mod modification;
pub mod phase;
pub mod process;

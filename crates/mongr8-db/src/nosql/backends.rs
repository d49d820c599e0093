//! Backend implementations

pub mod memory;
pub mod mongodb;

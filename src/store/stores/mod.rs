//! Concrete conversation store backends.

pub mod basic;
pub mod memory;
#[cfg(feature = "isqlite")]
pub mod sqlite;

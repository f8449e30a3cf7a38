//! Application services layer.

pub mod assembly;
pub mod error;
pub mod repos;

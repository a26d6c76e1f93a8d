//! Safe SQL layer: fluent builder, parameter binding, connection contract.

mod builder;
mod connection;
pub mod params;

pub use builder::*;
pub use connection::{Connection, Row};
pub use params::*;

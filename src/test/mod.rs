//! Fixtures shared by the unit tests: hand-assembled class files and a mock command host
//! registered through the bridge.

pub mod classes;
pub mod host;

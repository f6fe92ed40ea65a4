//! Pretend-mode tooling: compile JSON query and schema descriptions and print
//! the SQL the adapter would send, without a warehouse connection.

pub mod render;
pub mod telemetry;

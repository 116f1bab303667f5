//! samsemungctl library surface: exit codes, logging setup and output
//! formatting shared by the binary and its tests.

pub mod errors;
pub mod logging;
pub mod output;

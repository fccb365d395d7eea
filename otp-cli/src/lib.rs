#![warn(missing_debug_implementations, rust_2018_idioms)]

//! Request and verify one-time passcodes from the command line

pub mod cli;
pub mod client;
pub(crate) mod logging;
pub mod paths;
pub mod settings;

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]
#![deny(unreachable_pub)]

//! otp-core
//!
//! Everything needed to drive the request-code / verify-code flow against a
//! remote one-time passcode provider, minus the actual HTTP plumbing.

pub mod common;
pub mod flow;
pub mod notification;
pub mod traits;
pub mod validation;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

//! # modelkit
//!
//! Library side of the modelkit binary, so the command implementations can
//! be exercised from integration tests.

pub mod cli;

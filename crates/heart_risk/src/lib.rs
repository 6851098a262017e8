//! Command implementations behind the `heart-risk` binary.

pub mod commands;

//! Command handlers, one module per command family.

pub mod init;
pub mod maintenance;
pub mod operations;
pub mod query;

//! Command handlers, one module per command family.

pub mod audit;
pub mod delete;
pub mod init;
pub mod migrate;
pub mod misc;
pub mod password;
pub mod session;
pub mod tier;

//! facedb-cli: configuration, notifications and the interactive shell shared
//! by the `facedb` and `facedb-purge` binaries.

pub mod config;
pub mod notice;
pub mod shell;

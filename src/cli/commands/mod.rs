pub mod changed;
pub mod clean;
pub mod config;
pub mod import;
pub mod init;
pub mod log;
pub mod run;
pub mod status;

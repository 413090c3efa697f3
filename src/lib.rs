pub mod config;
pub mod domain;
pub mod remote;
pub mod storage;
pub mod sync;

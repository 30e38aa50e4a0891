pub mod backend;
pub mod chat;
pub mod cli;
pub mod core;
pub mod storage;

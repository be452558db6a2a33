//! Storage and environment
//!
//! - `store`: the object store trait and an in-memory store
//! - `database`: loose objects on disk
//! - `staging`: overlay buffering the objects a merge creates
//! - `config`: merge settings read from the environment
//! - `repository`: the object database plus an output sink, used by commands

pub mod config;
pub mod database;
pub mod repository;
pub mod staging;
pub mod store;

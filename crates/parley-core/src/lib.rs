//! Core types and trait definitions for the Parley comment store.
//!
//! This crate is deliberately free of database dependencies. Storage backends
//! implement the traits in [`store`]; everything else depends on them.

#![allow(async_fn_in_trait)]

pub mod bloom;
pub mod comment;
pub mod error;
pub mod policy;
pub mod query;
pub mod store;
pub mod thread;

pub use bloom::{BloomFilter, BloomParams};
pub use error::{Error, Result};
pub use policy::Policy;

// src/lib.rs

//! notice-relay library
//!
//! Fetches a notice board, keeps a cache of its notices for the query API
//! and relays every notice not seen before to one messaging channel.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod test_support;

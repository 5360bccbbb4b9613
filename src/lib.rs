//! Classified-ads listings service: a record store fronted by a cache-aside
//! snapshot of the most recent advertisements.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

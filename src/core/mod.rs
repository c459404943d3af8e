//! Domain types and configuration shared by every stage of an export

pub mod config;
pub mod models;

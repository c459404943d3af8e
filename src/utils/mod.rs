//! Helpers shared across the pipeline and the CLI

pub mod dates;
pub mod filters;
pub mod links;
pub mod mime;
pub mod naming;

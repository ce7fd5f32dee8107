//! Public facade crate for `tera`.
//!
//! The default build is IO-free: research types, capability traits, budgets and
//! the [`ResearchCoordinator`] from `tera-core`. Embedders plug in their own
//! search and model backends through the capability traits, or enable the
//! `local` feature for the HTTP ones under [`local`].

pub use tera_core::*;

#[cfg(feature = "local")]
pub use tera_local as local;

//! Household income-tax simulator: a pure computation engine in [`core`] and
//! the HTTP/CLI input layer in [`api`].

pub mod api;
pub mod core;

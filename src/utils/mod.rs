//! The `utils` module collects the pieces shared by every other module of
//! `replymq`: the crate-wide error type and the logging bootstrap.

pub mod error;
pub mod logging;

pub use error::{Error, Result};

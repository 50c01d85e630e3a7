//! bankfind library
//!
//! Cache-aside bank search: a local JSON store answers first, the partner
//! bank directory fills misses, and refreshed records are written back in the
//! background.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod lookup;
pub mod persist;

pub use error::LookupError;
pub use lookup::{BankLookup, LookupOutcome, LookupResponse, Source};

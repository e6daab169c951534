//! Data layer for the contacts service
//!
//! This module contains the data access layer for the contacts service,
//! including database entities, repositories, the cache store and
//! data-specific error messages.

pub mod cache;
pub mod entities;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod repositories;

pub use cache::*;
pub use entities::*;
pub use error::*;
pub use repositories::*;

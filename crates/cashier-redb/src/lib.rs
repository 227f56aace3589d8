//! Redb storage backend for Cashier

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod error;
#[cfg(feature = "wallet")]
pub mod memory;

#[cfg(feature = "wallet")]
pub mod wallet;

#[cfg(feature = "wallet")]
pub use wallet::RedbDraftDatabase;

//! `forgeledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the ledger crates
//! (identifiers, aggregate traits, the base error type). No infrastructure
//! concerns live here.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::DomainError;
pub use id::{AccountId, EntryId};

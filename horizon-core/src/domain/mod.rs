//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod identity;
mod item;
pub mod result;
mod scope;
mod session;
mod transaction;

pub use account::Account;
pub use identity::{Identity, NewIdentity, Tier};
pub use item::{AccessCredential, LinkToken, LinkedItem, NewLinkedItem};
pub use result::{Error, Result};
pub use scope::{AdminScope, UserScope};
pub use session::Session;
pub use transaction::Transaction;

#![forbid(unsafe_code)]

//! SQLite persistence for the chore engine: templates, assignments and the
//! append-only balance ledger, one transaction per operation.

mod store;

pub use store::*;

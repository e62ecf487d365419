//! Foundational types: accounts, transactions, configuration, errors.

pub mod account;
pub mod config;
pub mod error;
pub mod transaction;

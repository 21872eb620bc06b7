//! Command implementations behind the `crm-migrate` binary. Each takes already-connected
//! stores so they can be driven from tests with the in-memory store.
pub mod counts;
pub mod migrate;

//! Shared startup plumbing (tracing, env loading, database pool construction) used by
//! every binary in this workspace, so each one wires up logging and connections the same
//! way instead of repeating it per-crate.

pub mod bootstrap;

pub use bootstrap::{init_db, init_env, init_tracing};

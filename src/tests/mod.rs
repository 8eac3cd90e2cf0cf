//! Consolidated test modules.
//!
//! End-to-end scenarios that run login and access checks through a fully
//! wired security manager.

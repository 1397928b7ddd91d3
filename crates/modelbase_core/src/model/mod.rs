//! Domain model shared by every persisted object.
//!
//! # Responsibility
//! - Define the base record carrying identity, timestamps and open attributes.
//! - Provide the mapping export/import pair used by storage collaborators.
//!
//! # Invariants
//! - Every instance is identified by a stable `id` assigned at construction.
//! - The reserved class-tag key never lives among the open attributes.

pub mod base;

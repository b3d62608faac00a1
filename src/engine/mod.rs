//! # Engine Module
//!
//! Storage engine implementation.
//!
//! This module contains the core building blocks, leaves first:
//! - Layout constants and identifiers
//! - Bit masks
//! - Type registry
//! - Column storage
//! - Archetypes and the archetype registry
//! - Query execution
//! - Entity bookkeeping
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod error;
pub mod mask;
pub mod component;
pub mod storage;
pub mod archetype;
pub mod registry;
pub mod query;
pub mod entity;
pub mod manager;

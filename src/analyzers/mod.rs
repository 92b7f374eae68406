//! Community analytics core.
//!
//! Records are resolved to community keys, folded into per-community
//! aggregates, then scored, matched against stations, or windowed into
//! velocity trends before classification and ranking.

pub mod aggregate;
pub mod geo;
pub mod grade;
pub mod keys;
pub mod rank;
pub mod score;
pub mod types;
pub mod utility;
pub mod velocity;

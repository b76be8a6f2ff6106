//! Hashing y canonicalización JSON.
//!
//! Se usa para fijar la identidad de una definición compilada: dos
//! compilaciones del mismo input producen el mismo `definition_hash`.

pub mod canonical_json;
pub mod hash;

pub use canonical_json::to_canonical_json;
pub use hash::{hash_str, hash_value};

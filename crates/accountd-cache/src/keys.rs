//! Cache key naming convention.
//!
//! ## Key Formats
//!
//! - `cache:object:{entity}:id:{id}`: a serialized entity by primary key
//! - `cache:id:{entity}:{natural_key}`: a natural key mapped to a primary key
//! - `lock:{key}`: the distributed lock guarding recomputation of `key`

use std::fmt::Display;

/// Stored in place of a value when the backing store confirmed absence.
pub const NIL_VALUE: &[u8] = b"null";

/// Prefix of every lock key.
pub const LOCK_PREFIX: &str = "lock:";

/// Key for a serialized entity, e.g. `cache:object:user:id:42`.
#[inline]
pub fn object_key(entity: &str, id: impl Display) -> String {
    format!("cache:object:{entity}:id:{id}")
}

/// Key mapping a natural key to an id, e.g. `cache:id:user_email:a@b.c`.
#[inline]
pub fn id_key(entity: &str, natural_key: impl Display) -> String {
    format!("cache:id:{entity}:{natural_key}")
}

/// Lock key guarding `key`.
#[inline]
pub fn lock_key(key: &str) -> String {
    format!("{LOCK_PREFIX}{key}")
}

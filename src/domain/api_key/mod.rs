//! API key domain
//!
//! Key records, their derived usability state, pagination types and the
//! store contract the lifecycle engine is written against.

mod entity;
mod repository;
mod validation;

pub use entity::{
    KeyId, KeyPage, KeyRecord, PageRequest, Usability, UsageLimit, UsageLogEntry,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use repository::{KeyStore, UseIncrement};
pub use validation::{
    is_well_formed_value, validate_label, KeyValidationError, KEY_SEGMENT_LEN, KEY_VALUE_BYTES,
    MAX_LABEL_LENGTH,
};

#[cfg(test)]
pub use repository::MockKeyStore;

pub mod idempotency;

pub use idempotency::{derive_idempotency_key, resolve_idempotency_key};

//! Authentication primitives and request extractors.
//!
//! - `password` – Argon2id hashing and verification
//! - `jwt` – access-token issue and decode
//! - `extract` – `AuthUser` and the minimum-role extractors used by routes

mod extract;
pub mod jwt;
pub mod password;

pub use extract::{authenticate, bearer_token, RequireAdmin, RequireOperator, RequireViewer};

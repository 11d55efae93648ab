//! Concrete auth providers and row stores: in-memory for local runs and tests, HTTP for the
//! hosted backend.

pub mod http;
pub mod memory;
pub mod token;

pub use http::{HttpAuthProvider, HttpBackend, HttpStore};
pub use memory::{MemoryAuthProvider, MemoryStore};

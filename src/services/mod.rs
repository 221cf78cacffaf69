//! Concrete object-storage backends.

pub mod local_store;

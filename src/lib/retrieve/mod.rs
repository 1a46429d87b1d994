//! Retrieval: downloading (§4.4) and unpacking (§4.5) package sources.

pub mod extract;
pub mod fetch;

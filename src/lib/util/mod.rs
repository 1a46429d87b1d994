//! Small, focused collaborators shared across modules: the error taxonomy,
//! advisory filesystem locking, the process-exec wrapper, and a hashing
//! helper. Mirrors the teacher's own flat `util` module.

pub mod errors;
pub mod hash;
pub mod lock;
pub mod process;

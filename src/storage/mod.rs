//! Collaborators behind narrow traits: the session revocation list and the
//! image object store.

pub mod objects;
pub mod revocation;

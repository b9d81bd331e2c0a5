//! Collaborator seams: the chain RPC source and the search index backend

pub mod index;
pub mod rpc;

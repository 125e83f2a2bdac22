mod call_context;
mod relationship_service;
mod token_verifier;

pub use call_context::*;
pub use relationship_service::*;
pub use token_verifier::*;

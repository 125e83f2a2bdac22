mod friendship_tx_engine;
mod relationship_service_impl;
mod token_verifier_jwt;

pub use friendship_tx_engine::*;
pub use relationship_service_impl::*;
pub use token_verifier_jwt::*;

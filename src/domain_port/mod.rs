// store

mod relation_store;

pub use relation_store::*;

// remote

mod profile_lookup;

pub use profile_lookup::*;

mod repo_tx;

pub use repo_tx::*;

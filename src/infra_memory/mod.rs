mod profile_lookup_memory;
mod relation_store_memory;

pub use profile_lookup_memory::*;
pub use relation_store_memory::*;

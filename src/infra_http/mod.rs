mod profile_lookup_http;

pub use profile_lookup_http::*;

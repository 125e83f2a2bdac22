//! Settings are parsed once at startup from a TOML file plus
//! `FRIENDGRAPH__SECTION__KEY` environment overrides.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;

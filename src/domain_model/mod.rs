mod event;
mod relation;
mod user;

pub use event::*;
pub use relation::*;
pub use user::*;

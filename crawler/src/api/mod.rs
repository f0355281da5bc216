pub mod admin;
pub mod channels;

pub use admin::*;
pub use channels::*;

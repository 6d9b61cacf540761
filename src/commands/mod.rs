pub mod config;
pub mod controls;
pub mod permissions;
pub mod recording;

pub use config::*;
pub use controls::*;
pub use permissions::*;
pub use recording::*;

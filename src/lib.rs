pub mod capture;
pub mod config;
pub mod coordinate;
pub mod error;
pub mod image;
pub mod render;
pub mod state;
pub mod sync;
pub mod thumbnail;

pub use error::{Result, ViewerError};

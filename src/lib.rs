// Library for tests to access modules

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod protocol;
pub mod stream;
pub mod transport;
pub mod version;

pub use error::{Error, Result};

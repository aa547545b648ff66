// beanstalk-common - Wire vocabulary and error types for the beanstalkd client
//
// This crate defines the text protocol as data so every other crate formats
// and classifies replies the same way.

pub mod error;
pub mod protocol;
pub mod types;

// Re-export for convenience
pub use error::*;
pub use protocol::*;
pub use types::*;

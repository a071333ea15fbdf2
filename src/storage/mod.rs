//! Object store clients.
//!
//! The [`backend::ObjectStore`] trait abstracts over the S3-compatible store
//! the gateway talks to.  [`s3::S3Store`] speaks to a real endpoint through
//! the AWS SDK; [`memory::MemoryStore`] keeps everything in process.

pub mod backend;
pub mod memory;
pub mod s3;

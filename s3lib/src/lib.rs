#![doc = include_str!("../README.md")]

pub mod credentials;
pub mod s3;

#[cfg(feature = "pipe")]
pub mod pipe;

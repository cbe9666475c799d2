mod basic;
mod types_rs;

pub use types_rs::*;

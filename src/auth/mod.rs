pub mod gate;
pub mod hasher;
pub mod token;

pub use token::{Identity, TokenKeys, VerificationError};

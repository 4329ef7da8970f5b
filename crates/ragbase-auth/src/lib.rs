#![allow(clippy::result_large_err)]

pub mod errors;
pub mod keyset;
pub mod prelude;
pub mod verifier;

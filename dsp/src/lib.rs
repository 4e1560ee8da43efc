#![cfg_attr(not(test), no_std)]

mod tools;
pub use tools::*;
pub mod iir;
pub mod xcorr;

#[cfg(test)]
pub mod testing;

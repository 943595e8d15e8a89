//! Reshaping and transmission of fetched capture data

pub mod frame;
pub mod transmitter;

pub use frame::{decode, encode, extract, Frame};
pub use transmitter::Transmitter;

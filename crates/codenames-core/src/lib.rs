pub mod board;
pub mod protocol;
pub mod transport;
pub mod words;

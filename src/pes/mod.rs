//! Packetized elementary stream.
//!
//! # References
//!
//! - [Packetized elementary stream](https://en.wikipedia.org/wiki/Packetized_elementary_stream)
pub use self::extractor::PesExtractor;
pub use self::packet::PesHeader;

mod extractor;
mod packet;

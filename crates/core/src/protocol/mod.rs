pub mod codec;
pub mod messages;

pub use codec::{decode_line, encode_line};
pub use messages::{Capabilities, WireMessage};

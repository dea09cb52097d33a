//! Wire protocol for hashback.
//!
//! Peers talk over a plain byte stream in length-prefixed frames:
//!
//! ```text
//! [u32 BE length][u8 type tag][bincode payload]
//! ```
//!
//! where `length` counts the tag and the payload. After a `Hello` /
//! `HelloAck` exchange the client issues numbered calls and the server
//! answers each with a `Reply` or an `Error` carrying the same id. Every
//! store operation is a variant of [`StoreRequest`]; there is no dispatch
//! by method name.

pub mod codec;
pub mod error;
pub mod io;
pub mod message;

pub use codec::HbCodec;
pub use error::{ProtocolError, ProtocolResult};
pub use io::{read_message, write_message};
pub use message::{
    error_codes, HbMessage, StoreRequest, StoreResponse, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};

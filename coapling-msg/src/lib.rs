//! Low-level representation of draft-07 CoAP packets.
//!
//! The most notable item in `coapling_msg` is [`Packet`];
//! a CoAP packet that keeps its options and payload in a single
//! fixed-size byte arena, very close to the actual byte layout.
//!
//! ## Allocation
//! Nothing in this crate allocates. Options are encoded in place at the front
//! of the arena (delta-encoded, ascending by number) and the payload is placed at
//! the back of it. Running out of room is always reported as [`Error::NoMem`],
//! never by truncating or panicking.
//!
//! ```
//! use coapling_msg::{CoapPacket, Code, Id, OptNumber, Type};
//!
//! let mut req = CoapPacket::new();
//! req.set_type(Type::Con);
//! req.set_code(Code::GET);
//! req.set_id(Id(1));
//! req.set_uri_path("/sensors/temp").unwrap();
//! req.set_observe(0).unwrap();
//!
//! let mut bytes = [0u8; 64];
//! let len = req.serialize(&mut bytes).unwrap();
//! assert_eq!(len, req.serialize_length());
//!
//! let parsed = CoapPacket::try_from_bytes(&bytes[..len]).unwrap();
//! assert_eq!(parsed.uri_path().unwrap().as_str(), "sensors/temp");
//! assert!(parsed.is_set(OptNumber::OBSERVE));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(not(test), forbid(missing_debug_implementations, unreachable_pub))]
#![cfg_attr(not(test), deny(unsafe_code))]
#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
#![deny(missing_docs)]

#[cfg(feature = "alloc")]
extern crate alloc as std_alloc;

/// Message codes
pub mod code;

/// Codec errors
pub mod error;

/// Fixed-capacity opaque byte values
pub mod opaque;

/// Option numbers and their static format table
pub mod opt;

/// The packet arena
pub mod packet;

/// Resource path comparison
pub mod path;

/// Message type and id
pub mod ty;

#[doc(inline)]
pub use code::Code;
#[doc(inline)]
pub use error::{Error, ErrorContext};
#[doc(inline)]
pub use opaque::OpaqueData;
#[doc(inline)]
pub use opt::{ContentFormat, Format, OptNumber, OptValue};
#[doc(inline)]
pub use packet::{CoapPacket, Opt, OptString, Packet};
#[doc(inline)]
pub use path::{path_cmp, PathCompare};
#[doc(inline)]
pub use ty::{Id, Type};

/// The only protocol version this crate speaks
pub const COAP_VERSION: u8 = 1;

/// Well-known UDP port for CoAP
pub const COAP_STD_PORT: u16 = 5683;

/// Max-Age assumed when a packet carries no Max-Age option
pub const COAP_DEFAULT_MAX_AGE: u32 = 60;

/// Longest value a single string option segment may have
/// (15 + the 255 encodable in the extended length byte)
pub const COAP_STRING_OPTS_MAXLEN: usize = 270;

/// Length of the fixed packet header
pub const HEADER_LEN: usize = 4;

/// Default size of a packet's option & payload arena
pub const DEFAULT_STORAGE_SIZE: usize = 128;

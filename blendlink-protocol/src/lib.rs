//! blendlink-protocol: Control-socket wire definitions
//!
//! This crate defines the messages exchanged between the blendlink host
//! and a launched Blender instance, and the framing codec that carries
//! them over the local control socket. One JSON document per message,
//! prefixed with a 4-byte big-endian length.

pub mod codec;
pub mod messages;

pub use codec::{CodecError, HostCodec, InstanceCodec};
pub use messages::{DocumentError, HostRequest, InstanceResponse};

/// TCP port the host's control listener binds on localhost
pub const CONTROL_PORT: u16 = 8525;

//! Protocol layer: request ids, message shapes, and the wire codec.
//!
//! Everything here is transport-agnostic. The client layer composes these
//! pieces with a [`Transport`](crate::Transport) to provide correlation and
//! push dispatch.
pub mod catalog;
mod codec;
mod correlation;
mod registry;

pub use codec::{Envelope, JsonMarshaler, Marshaler, WireCodec, ID_KEY, TYPE_KEY};
pub use correlation::RequestId;
pub(crate) use correlation::RequestIdGenerator;
pub use registry::{decode_shape, encode_shape, DecodeFn, EncodeFn, Fields, Record, Shape, TypeRegistry};

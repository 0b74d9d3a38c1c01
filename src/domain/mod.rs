//! Domain layer public interface.
//!
//! This module defines domain-level abstractions that are independent of
//! transport implementations or the message catalog.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod transport;

// --- Transport domain re-exports ---

pub use transport::{
    //
    Transport,
    TransportBase,
    TransportConfig,
    TransportPtr,
};

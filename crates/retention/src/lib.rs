#![warn(missing_docs)]
//! Chunk-ticket reconciliation: keeps each owner's retained regions in step
//! with a host ticket authority.

mod authority;
mod component;
mod error;
mod reconcile;
mod record;
mod source;
mod validation;

pub use authority::{Anchor, SharedAuthority, TicketAuthority, TicketIndex, TicketSet};
pub use component::ChunkRetention;
pub use error::RecordError;
pub use reconcile::{reconcile, Reconciliation, TicketOp};
pub use record::{RetentionRecord, TileRecord, CHUNK_SET_FIELD};
pub use source::{LoadRequestSource, OwnerLookup, OwnerSlot, RetentionOwner};
pub use validation::{validate_world, ValidationReport};

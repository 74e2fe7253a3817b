//! Lifecycle state of vertex and edge populations.
//!
//! Every identity moves through *not yet available* → *active* → *removed*;
//! removal is terminal. The trackers only record transitions. Scheduling and
//! warnings belong to the engine.

mod edge;
mod vertex;

pub use self::{
    edge::EdgeLifecycle,
    vertex::{Removal, VertexLifecycle},
};

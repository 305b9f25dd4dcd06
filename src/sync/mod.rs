//! Real-time sync and derived views: the collection cache, the projections built from it,
//! the calendar and carousel state, and the inline edit lifecycle.

pub mod cache;
pub mod calendar;
pub mod edit;
pub mod hub;
pub mod projector;

#[cfg(test)]
pub(crate) mod testing;

pub use hub::{ContentHub, ExcerptLimits};

//! formflow - state machines behind multi-step forms, carousels and paged feeds
//!
//! The crate holds no rendering code. Views own a [`form::FormController`],
//! a [`carousel::Carousel`] or a [`fetch::PageFeed`] and re-render from the
//! snapshots they publish.

pub mod carousel;
pub mod config;
pub mod fetch;
pub mod form;
pub mod logging;
pub mod script;
pub mod theme;

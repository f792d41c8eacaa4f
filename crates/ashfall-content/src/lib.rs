//! Static content for the Ashfall engine: the immutable world graph,
//! localized strings, data definitions for weapons / mobs / items /
//! loot / recipes, and the JSON loaders that build them.
//!
//! Everything in this crate is read-only after boot and can be shared
//! freely by reference.

pub mod defaults;
pub mod defs;
pub mod loader;
pub mod model;
pub mod registry;
pub mod strings;

pub use registry::ContentRegistry;

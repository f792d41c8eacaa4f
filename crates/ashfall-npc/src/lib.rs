//! NPC dialogue adapter.
//!
//! The dialogue backend is a pluggable oracle: the core hands it two
//! strings and expects strict JSON back. Replies are validated against
//! the schema and against game state; anything invalid degrades to a
//! neutral fallback — the adapter never raises.

pub mod adapter;
pub mod memory;
pub mod schema;

pub use adapter::{npc_turn, NpcProfile, Oracle, SceneContext};
pub use memory::MemoryStore;
pub use schema::NpcReply;

// Implementations of the mute storage port.

pub mod in_memory;
pub mod json_mute_store;
pub mod sqlite_mute_store;

pub use in_memory::InMemoryMuteStore;
pub use json_mute_store::JsonMuteStore;
pub use sqlite_mute_store::SqliteMuteStore;

pub mod entries;
pub mod memory;
pub mod pool;

pub use entries::{EntryStore, PgEntryStore};
pub use memory::MemoryEntryStore;

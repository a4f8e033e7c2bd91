//! # mediaq-database
//!
//! PostgreSQL connection management, migrations, and the item store
//! implementations (PostgreSQL repository and in-memory map).

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryItemStore;
pub use repositories::MediaItemRepository;
pub use store::create_item_store;

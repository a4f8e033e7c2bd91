//! Repository implementations for MediaQ entities.

pub mod media_item;

pub use media_item::MediaItemRepository;

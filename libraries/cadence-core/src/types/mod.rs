mod ids;
mod item;
mod locator;
mod playlist;

pub use ids::{EntryId, ItemId, PlaylistId};
pub use item::{AudioItem, ItemBuilder, ItemMetadata, MetadataUpdate, SharedItem};
pub use locator::Locator;
pub use playlist::{AddMode, Entry, EntryKind, PlaylistRef};

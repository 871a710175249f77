pub mod aliases;
pub mod index;
pub mod loader;
pub mod watcher;

pub use aliases::LinkAliases;
pub use index::LinkIndex;
pub use loader::{parse_links, LinkLoader, LoadError, LoadReport};
pub use watcher::{FileEvent, FileStamp, FileWatcher};

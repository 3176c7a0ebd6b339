// Contactsync Notion Adapter
//
// Implements the ContactStore port on top of the Notion REST API.

mod client;
pub mod properties;

pub use client::{NotionConfig, NotionContactStore, NotionStoreFactory, DEFAULT_BASE_URL, NOTION_VERSION};

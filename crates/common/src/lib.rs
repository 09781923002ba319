// folio-common: storage-free building blocks shared by the folio crates.

pub mod backlink;
pub mod metadata;
pub mod protocol;
pub mod slug;
pub mod types;

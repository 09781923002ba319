// Structured metadata stored inline in page text.
//
// Pages have no dedicated columns for tags or folders, so both ride along in
// the free-text fields: tags as a `tags: a, b` header line on the body and the
// folder as a `[folder] ` prefix on the title.

mod folder;
mod tags;

pub use folder::{fold_into_title, normalize_folder, unfold_title};
pub use tags::{
    add_tags, decode_tags, encode_tags, normalize_tag, parse_tag_list, remove_tags, TaggedBody,
    MAX_TAG_CHARS,
};

mod directory;
mod frontmatter;
mod source_type;

use std::path::PathBuf;

pub(crate) use directory::{is_markdown, markdown_files};
pub(crate) use frontmatter::{SplitDocument, parse_frontmatter, scan_key, split_frontmatter};
pub use source_type::SourceType;

pub(crate) fn home_dir() -> Option<PathBuf> {
    directories::UserDirs::new().map(|d| d.home_dir().to_path_buf())
}

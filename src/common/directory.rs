use std::path::{Path, PathBuf};

pub fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "md")
}

/// Repository documentation that lives next to capability documents.
pub fn is_readme(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.eq_ignore_ascii_case("README.md"))
}

fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|s| s.starts_with('.'))
    })
}

/// Recursively collect capability markdown files under `root`, sorted by path.
///
/// A missing root yields an empty list. Unreadable entries are logged and skipped.
pub fn markdown_files(root: &Path) -> crate::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let root_str = root.to_str().ok_or_else(|| {
        crate::Error::Config(format!("Root path is not valid UTF-8: {}", root.display()))
    })?;
    let pattern = format!("{}/**/*.md", glob::Pattern::escape(root_str));

    let paths = glob::glob(&pattern)
        .map_err(|e| crate::Error::Config(format!("Invalid scan pattern {}: {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                let relative = path.strip_prefix(root).unwrap_or(&path);
                if path.is_file() && !is_readme(&path) && !is_hidden(relative) {
                    files.push(path);
                }
            }
            Err(e) => tracing::warn!("Failed to read {}: {}", e.path().display(), e.error()),
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_markdown() {
        assert!(is_markdown(Path::new("file.md")));
        assert!(is_markdown(Path::new("/path/to/file.md")));
        assert!(!is_markdown(Path::new("file.txt")));
        assert!(!is_markdown(Path::new("file")));
    }

    #[test]
    fn test_is_readme() {
        assert!(is_readme(Path::new("README.md")));
        assert!(is_readme(Path::new("agents/readme.md")));
        assert!(!is_readme(Path::new("reader.md")));
    }

    #[test]
    fn test_markdown_files_missing_root() {
        let result = markdown_files(Path::new("/nonexistent/path")).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_markdown_files_recursive_sorted() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("specialized/dotnet")).unwrap();
        std::fs::create_dir_all(root.join("core")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("specialized/dotnet/webapi.md"), "a").unwrap();
        std::fs::write(root.join("core/code-reviewer.md"), "b").unwrap();
        std::fs::write(root.join("core/notes.txt"), "c").unwrap();
        std::fs::write(root.join("README.md"), "d").unwrap();
        std::fs::write(root.join(".git/HEAD.md"), "e").unwrap();

        let files = markdown_files(root).unwrap();
        let relative: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("core/code-reviewer.md"),
                PathBuf::from("specialized/dotnet/webapi.md"),
            ]
        );
    }
}

//! Leading `---` metadata block handling for capability documents.

use serde::de::DeserializeOwned;

const DELIMITER: &str = "---";

/// Result of splitting a document into its metadata block and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitDocument<'a> {
    /// No leading delimiter; the whole content is body.
    Absent { body: &'a str },
    /// A terminated block was found.
    Block { yaml: &'a str, body: &'a str },
    /// Opening delimiter without a closing one.
    Unterminated,
}

/// Split `content` on line-anchored `---` delimiters.
///
/// Only a delimiter on the very first line opens a block, and only a later line
/// consisting of `---` closes it. `---` inside a value does not count.
pub fn split_frontmatter(content: &str) -> SplitDocument<'_> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let Some(first_line_end) = content.find('\n') else {
        return if content.trim_end() == DELIMITER {
            SplitDocument::Unterminated
        } else {
            SplitDocument::Absent { body: content }
        };
    };

    if content[..first_line_end].trim_end() != DELIMITER {
        return SplitDocument::Absent { body: content };
    }

    let rest = &content[first_line_end + 1..];
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return SplitDocument::Block {
                yaml,
                body: body.trim_start_matches(['\r', '\n']),
            };
        }
        offset += line.len();
    }

    SplitDocument::Unterminated
}

/// Deserialize a metadata block. Empty blocks yield `F::default()`.
pub fn parse_frontmatter<F: DeserializeOwned + Default>(yaml: &str) -> Result<F, String> {
    if yaml.trim().is_empty() {
        return Ok(F::default());
    }
    serde_yaml_bw::from_str(yaml).map_err(|e| e.to_string())
}

/// Line-oriented recovery for blocks that are not valid YAML.
///
/// Agent descriptions routinely contain unquoted `: ` sequences, which YAML rejects.
/// Returns the raw value of `key` when a top-level `key:` line exists.
pub fn scan_key<'a>(yaml: &'a str, key: &str) -> Option<&'a str> {
    yaml.lines().find_map(|line| {
        let rest = line.strip_prefix(key)?.strip_prefix(':')?;
        let value = rest.trim().trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct TestFrontmatter {
        name: Option<String>,
        #[serde(default)]
        description: Option<String>,
    }

    #[test]
    fn test_split_valid() {
        let content = "---\nname: test\ndescription: A test\n---\n\nBody content here.";
        let SplitDocument::Block { yaml, body } = split_frontmatter(content) else {
            panic!("expected block");
        };
        assert_eq!(yaml, "name: test\ndescription: A test\n");
        assert_eq!(body, "Body content here.");

        let fm: TestFrontmatter = parse_frontmatter(yaml).unwrap();
        assert_eq!(fm.name.as_deref(), Some("test"));
        assert_eq!(fm.description.as_deref(), Some("A test"));
    }

    #[test]
    fn test_split_no_frontmatter() {
        let content = "Just content without frontmatter";
        assert_eq!(
            split_frontmatter(content),
            SplitDocument::Absent { body: content }
        );
    }

    #[test]
    fn test_split_unterminated() {
        assert_eq!(
            split_frontmatter("---\nname: test\nNo closing delimiter"),
            SplitDocument::Unterminated
        );
        assert_eq!(split_frontmatter("---"), SplitDocument::Unterminated);
    }

    #[test]
    fn test_delimiter_inside_value_is_ignored() {
        let content = "---\nname: dashes\ndescription: a---b\n---\nbody";
        let SplitDocument::Block { yaml, body } = split_frontmatter(content) else {
            panic!("expected block");
        };
        assert!(yaml.contains("a---b"));
        assert_eq!(body, "body");
    }

    #[test]
    fn test_crlf_delimiters() {
        let content = "---\r\nname: win\r\n---\r\nbody\r\n";
        let SplitDocument::Block { yaml, body } = split_frontmatter(content) else {
            panic!("expected block");
        };
        assert!(yaml.contains("name: win"));
        assert_eq!(body, "body\r\n");
    }

    #[test]
    fn test_empty_block() {
        let SplitDocument::Block { yaml, body } = split_frontmatter("---\n---\n") else {
            panic!("expected block");
        };
        let fm: TestFrontmatter = parse_frontmatter(yaml).unwrap();
        assert_eq!(fm, TestFrontmatter::default());
        assert!(body.is_empty());
    }

    #[test]
    fn test_invalid_yaml_and_scan_recovery() {
        let yaml = "name: dotnet-webapi-expert\ndescription: Use when: building APIs. Example: x\n";
        assert!(parse_frontmatter::<TestFrontmatter>(yaml).is_err());
        assert_eq!(scan_key(yaml, "name"), Some("dotnet-webapi-expert"));
        assert_eq!(
            scan_key(yaml, "description"),
            Some("Use when: building APIs. Example: x")
        );
        assert_eq!(scan_key(yaml, "model"), None);
    }

    #[test]
    fn test_scan_key_requires_exact_key() {
        assert_eq!(scan_key("names: a\n", "name"), None);
        assert_eq!(scan_key("name: \"quoted\"\n", "name"), Some("quoted"));
    }
}

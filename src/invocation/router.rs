//! Resolution of reference tokens to registry documents.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Serialize;

use super::token::ReferenceToken;
use crate::registry::{CapabilityDocument, CapabilityKind, ResolvedRegistry, normalize_name};

/// Substituted for `$ARGUMENTS` when the caller passes no argument text.
pub const DEFAULT_ARGUMENTS_PHRASE: &str = "(no arguments provided)";

const MAX_SUGGESTIONS: usize = 5;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$(ARGUMENTS|[1-9])").expect("valid placeholder regex"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    pub reference_token: String,
    pub argument_text: String,
}

impl InvocationRequest {
    pub fn new(reference_token: impl Into<String>, argument_text: impl Into<String>) -> Self {
        Self {
            reference_token: reference_token.into(),
            argument_text: argument_text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResult {
    pub document: CapabilityDocument,
    /// Argument text as handed to the document.
    pub rendered_arguments: String,
    /// Document content with `$ARGUMENTS` and `$1`..`$9` substituted.
    pub rendered_content: String,
}

/// Read-only lookup over a [`ResolvedRegistry`].
pub struct InvocationRouter;

impl InvocationRouter {
    pub fn route(
        request: &InvocationRequest,
        registry: &ResolvedRegistry,
    ) -> crate::Result<InvocationResult> {
        Self::resolve(&request.reference_token, &request.argument_text, registry)
    }

    /// Resolve `token` to exactly one document and render it with `argument_text`.
    ///
    /// Exact key matches win. Otherwise a unique prefix match is accepted; no match
    /// or several prefix matches are reported as unknown with suggestions.
    pub fn resolve(
        token: &str,
        argument_text: &str,
        registry: &ResolvedRegistry,
    ) -> crate::Result<InvocationResult> {
        let reference = ReferenceToken::parse(token)?;
        let document = Self::lookup(&reference, registry)?;
        tracing::debug!(token = %reference, id = %document.id, "Reference resolved");

        let (rendered_arguments, rendered_content) = render(&document.content, argument_text);
        Ok(InvocationResult {
            document: document.clone(),
            rendered_arguments,
            rendered_content,
        })
    }

    pub fn lookup<'a>(
        reference: &ReferenceToken,
        registry: &'a ResolvedRegistry,
    ) -> crate::Result<&'a CapabilityDocument> {
        let documents: Vec<&CapabilityDocument> = registry.documents(reference.kind).collect();

        let exact: Vec<&CapabilityDocument> = documents
            .iter()
            .copied()
            .filter(|d| lookup_keys(d).iter().any(|k| *k == reference.name))
            .collect();
        match exact.as_slice() {
            [single] => return Ok(*single),
            [] => {}
            several => {
                return Err(crate::Error::AmbiguousReference {
                    token: reference.to_string(),
                    candidates: several.iter().map(|d| d.id.clone()).collect(),
                });
            }
        }

        let prefixed: Vec<&CapabilityDocument> = documents
            .iter()
            .copied()
            .filter(|d| lookup_keys(d).iter().any(|k| k.starts_with(&reference.name)))
            .collect();
        if let [single] = prefixed.as_slice() {
            return Ok(*single);
        }

        let suggestions: BTreeSet<String> = if prefixed.is_empty() {
            documents
                .iter()
                .filter(|d| {
                    lookup_keys(d)
                        .iter()
                        .any(|k| k.contains(&reference.name) || reference.name.contains(k.as_str()))
                })
                .map(|d| d.name.clone())
                .collect()
        } else {
            prefixed.iter().map(|d| d.name.clone()).collect()
        };

        tracing::debug!(
            token = %reference,
            prefix_matches = prefixed.len(),
            "Reference not resolved"
        );
        Err(crate::Error::UnknownReference {
            token: reference.to_string(),
            suggestions: suggestions.into_iter().take(MAX_SUGGESTIONS).collect(),
        })
    }
}

fn lookup_keys(document: &CapabilityDocument) -> Vec<String> {
    let mut keys = vec![normalize_name(&document.name)];
    if document.kind == CapabilityKind::Agent {
        let id_key = document.id.replace('/', "-");
        if !keys.contains(&id_key) {
            keys.push(id_key);
        }
    }
    keys
}

/// Substitute placeholders in one pass, so argument text is never re-expanded.
fn render(content: &str, argument_text: &str) -> (String, String) {
    let arguments = if argument_text.trim().is_empty() {
        DEFAULT_ARGUMENTS_PHRASE.to_string()
    } else {
        argument_text.to_string()
    };
    let positional: Vec<&str> = argument_text.split_whitespace().take(9).collect();

    let rendered = placeholder_regex().replace_all(content, |caps: &Captures<'_>| {
        match &caps[1] {
            "ARGUMENTS" => arguments.clone(),
            digit => digit
                .parse::<usize>()
                .ok()
                .and_then(|n| positional.get(n - 1))
                .map(|s| s.to_string())
                .unwrap_or_default(),
        }
    });
    (arguments, rendered.into_owned())
}

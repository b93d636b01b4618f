//! Prompt template substitution
//!
//! Agent templates contain exactly two placeholders, `{context}` and
//! `{query}`; every other brace is literal text. Host `format!`-style
//! facilities are not safe against arbitrary braces, so substitution is a
//! small string rewriter: double every brace, restore only the two known
//! placeholders, then apply them with a scanner.

use crate::error::TemplateError;

/// Placeholder for the retrieved context
pub const CONTEXT_PLACEHOLDER: &str = "{context}";
/// Placeholder for the user query
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Substitute `{context}` and `{query}` into a template, preserving all
/// other braces verbatim.
pub fn substitute(
    template: &str,
    context: &str,
    query: &str,
) -> Result<String, TemplateError> {
    let escaped = escape_braces(template);
    apply_placeholders(&escaped, context, query)
}

/// Double every brace, then restore single braces for the two known
/// placeholders only.
fn escape_braces(template: &str) -> String {
    template
        .replace('{', "{{")
        .replace('}', "}}")
        .replace("{{context}}", CONTEXT_PLACEHOLDER)
        .replace("{{query}}", QUERY_PLACEHOLDER)
}

/// Apply the two named placeholders to an escaped template.
///
/// `{{`/`}}` emit a literal brace. A single-brace placeholder other than
/// `{context}` or `{query}` is an error, as is a dangling brace.
pub fn apply_placeholders(
    escaped: &str,
    context: &str,
    query: &str,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(escaped.len() + context.len() + query.len());
    let mut chars = escaped.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, c)) => name.push(c),
                        None => return Err(TemplateError::UnmatchedBrace(offset)),
                    }
                }
                match name.as_str() {
                    "context" => out.push_str(context),
                    "query" => out.push_str(query),
                    _ => return Err(TemplateError::UnknownPlaceholder(name)),
                }
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(TemplateError::UnmatchedBrace(offset));
                }
            }
            _ => out.push(ch),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_both_placeholders() {
        let out = substitute("{context}\n\n{query}", "ctx", "q").unwrap();
        assert_eq!(out, "ctx\n\nq");
    }

    #[test]
    fn test_literal_braces_survive() {
        // Template with only literal braces and no placeholders is identity.
        let template = "JSON example: {\"k\": 1} and {{double}}";
        let out = substitute(template, "c", "q").unwrap();
        assert_eq!(out, template);
    }

    #[test]
    fn test_unknown_single_brace_survives_full_pipeline() {
        let out = substitute("Usa {context}. Pregunta: {query}. Nota: {autor}", "X", "Y").unwrap();
        assert_eq!(out, "Usa X. Pregunta: Y. Nota: {autor}");
    }

    #[test]
    fn test_unknown_placeholder_rejected_at_format() {
        let err = apply_placeholders("hello {foo}", "c", "q").unwrap_err();
        assert!(matches!(err, TemplateError::UnknownPlaceholder(name) if name == "foo"));
    }

    #[test]
    fn test_unmatched_brace_rejected_at_format() {
        let err = apply_placeholders("dangling }", "c", "q").unwrap_err();
        assert!(matches!(err, TemplateError::UnmatchedBrace(_)));

        let err = apply_placeholders("open { forever", "c", "q").unwrap_err();
        assert!(matches!(err, TemplateError::UnmatchedBrace(_)));
    }

    #[test]
    fn test_values_with_braces_are_not_reinterpreted() {
        let out = substitute("{context}|{query}", "{query}", "{x}").unwrap();
        assert_eq!(out, "{query}|{x}");
    }

    #[test]
    fn test_spanish_default_template_shape() {
        let template = "--- CONTEXTO ---\n{context}\n\n--- PREGUNTA ---\n{query}\n";
        let out = substitute(template, "dato", "¿qué es?").unwrap();
        assert!(out.contains("dato"));
        assert!(out.contains("¿qué es?"));
        assert!(!out.contains("{context}"));
    }
}

//! Rewriting of document-store hosts embedded in API responses.
//!
//! Some deployments expose the document store on a different host:port than
//! the one the backend embeds in its responses. The rewriter swaps the two
//! authorities lexically, in either direction, preserving the scheme of each
//! match. Matching is over the full serialized text, so authorities inside
//! nested values are rewritten too.

use crate::config::RewriteRule;
use crate::errors::{CaseworkError, CaseworkResult};
use serde_json::Value;

/// Bidirectional document-store URL rewriter.
///
/// A rewriter built without a rule is the identity in both directions.
#[derive(Debug, Clone, Default)]
pub struct DocumentUrlRewriter {
    rule: Option<RewriteRule>,
}

impl DocumentUrlRewriter {
    /// Creates a rewriter, enabled when a rule is given.
    pub fn new(rule: Option<RewriteRule>) -> Self {
        Self { rule }
    }

    /// Whether rewriting is enabled.
    pub fn is_enabled(&self) -> bool {
        self.rule.is_some()
    }

    /// Rewrites internal authorities to external ones over a raw body.
    pub fn rewrite_outbound(&self, body: &str) -> String {
        match &self.rule {
            None => body.to_owned(),
            Some(rule) => swap_authority(
                body,
                &rule.internal_authority(),
                &rule.external_authority(),
            ),
        }
    }

    /// Rewrites external authorities back to internal ones over a decoded
    /// structure, by serializing, substituting, and re-parsing.
    pub fn rewrite_inbound(&self, value: Value) -> CaseworkResult<Value> {
        let Some(rule) = &self.rule else {
            return Ok(value);
        };
        let text = serde_json::to_string(&value)
            .map_err(|e| CaseworkError::decode(format!("failed to serialize body for rewrite: {e}")))?;
        let swapped = swap_authority(
            &text,
            &rule.external_authority(),
            &rule.internal_authority(),
        );
        serde_json::from_str(&swapped)
            .map_err(|e| CaseworkError::decode(format!("failed to re-parse rewritten body: {e}")))
    }
}

/// Swaps one authority for another after each `http://` or `https://`,
/// keeping the scheme of the match.
fn swap_authority(text: &str, from: &str, to: &str) -> String {
    text.replace(&format!("http://{from}"), &format!("http://{to}"))
        .replace(&format!("https://{from}"), &format!("https://{to}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rewriter() -> DocumentUrlRewriter {
        DocumentUrlRewriter::new(Some(RewriteRule::new(
            "internalhost",
            1111,
            "externalhost",
            2222,
        )))
    }

    #[test]
    fn outbound_swaps_internal_for_external() {
        let body = r#"{"href":"http://internalhost:1111/documents/1"}"#;
        assert_eq!(
            rewriter().rewrite_outbound(body),
            r#"{"href":"http://externalhost:2222/documents/1"}"#
        );
    }

    #[test]
    fn outbound_preserves_scheme() {
        let body = "https://internalhost:1111/a and http://internalhost:1111/b";
        assert_eq!(
            rewriter().rewrite_outbound(body),
            "https://externalhost:2222/a and http://externalhost:2222/b"
        );
    }

    #[test]
    fn inbound_swaps_external_for_internal_in_nested_values() {
        let value = json!({
            "documents": [
                {"_links": {"self": {"href": "http://externalhost:2222/documents/9"}}}
            ]
        });
        let rewritten = rewriter().rewrite_inbound(value).unwrap();
        assert_eq!(
            rewritten["documents"][0]["_links"]["self"]["href"],
            "http://internalhost:1111/documents/9"
        );
    }

    #[test]
    fn round_trip_is_identity_over_matching_text() {
        let original = r#"{"href":"http://internalhost:1111/documents/1","other":"untouched"}"#;
        let outbound = rewriter().rewrite_outbound(original);
        let value: Value = serde_json::from_str(&outbound).unwrap();
        let back = rewriter().rewrite_inbound(value).unwrap();
        assert_eq!(serde_json::to_string(&back).unwrap(), original);
    }

    #[test]
    fn disabled_rewriter_is_identity() {
        let rewriter = DocumentUrlRewriter::new(None);
        assert!(!rewriter.is_enabled());

        let body = r#"{"href":"http://internalhost:1111/documents/1"}"#;
        assert_eq!(rewriter.rewrite_outbound(body), body);

        let value = json!({"href": "http://externalhost:2222/documents/1"});
        assert_eq!(rewriter.rewrite_inbound(value.clone()).unwrap(), value);
    }

    #[test]
    fn non_matching_authorities_are_untouched() {
        let body = "http://internalhost:9999/documents and http://otherhost:1111/documents";
        assert_eq!(rewriter().rewrite_outbound(body), body);
    }
}

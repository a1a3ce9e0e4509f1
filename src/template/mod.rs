//! Invitation message templates.
//!
//! Templates are plain strings with `{{variable}}` placeholders. Rendering is
//! pure substitution: placeholders whose key is missing from the context
//! resolve to the empty string, and no escaping is applied beyond the literal
//! replacement. Callers are responsible for any transport-specific encoding.

use std::collections::BTreeMap;

/// Placeholder name for the join link in invitation bodies.
pub const INVITE_LINK_PLACEHOLDER: &str = "inviteLink";

/// Subject used when an event carries no custom subject template.
pub const DEFAULT_SUBJECT: &str = "You are invited: {{eventName}}";

/// Body used when an event carries no custom body template.
pub const DEFAULT_BODY: &str = "Hello,\n\n\
You have been invited to {{eventName}}.\n\
{{eventDescription}}\n\
Starts: {{eventStart}}\n\
Ends: {{eventEnd}}\n\n\
Join here: {{inviteLink}}\n";

/// Named values available to a template.
///
/// Absent keys are legal: a placeholder without a context entry renders as
/// the empty string. Entries are kept sorted so rendering is deterministic.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    entries: BTreeMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value for a placeholder name.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Set a value only if it is present; an absent value leaves the key
    /// unset and the placeholder renders empty.
    pub fn set_opt(&mut self, key: impl Into<String>, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.entries.insert(key.into(), v.to_string());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// Render a template by substituting `{{name}}` placeholders from the context.
///
/// Unknown and absent keys resolve to the empty string rather than an error;
/// a missing description is an expected case, not a failure. Rendering the
/// same template with the same context is byte-identical, and once no
/// placeholders remain the output is a fixed point of `render`.
pub fn render(template: &str, ctx: &TemplateContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                if let Some(value) = ctx.get(key) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated braces are literal text.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Guarantee that a rendered body carries the join link.
///
/// Operators may save a custom body template that omits the link placeholder
/// entirely. If neither the `{{placeholder}}` nor the literal link text is
/// already present, a default line with the link is appended. Applying this
/// to its own output is a no-op.
pub fn ensure_join_link(body: &str, placeholder: &str, link: &str) -> String {
    let marker = format!("{{{{{}}}}}", placeholder);
    if body.contains(&marker) || body.contains(link) {
        return body.to_string();
    }

    let mut out = body.to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("\nJoin here: ");
    out.push_str(link);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> TemplateContext {
        let mut ctx = TemplateContext::new();
        for (k, v) in pairs {
            ctx.set(*k, *v);
        }
        ctx
    }

    #[test]
    fn test_render_simple() {
        let out = render("Hello, {{name}}!", &ctx(&[("name", "World")]));
        assert_eq!(out, "Hello, World!");
    }

    #[test]
    fn test_render_absent_key_is_empty() {
        let out = render("Hi {{name}}", &TemplateContext::new());
        assert_eq!(out, "Hi ");
    }

    #[test]
    fn test_render_unknown_key_is_empty() {
        let out = render("{{greeting}} {{name}}", &ctx(&[("name", "Ada")]));
        assert_eq!(out, " Ada");
    }

    #[test]
    fn test_render_multiple_occurrences() {
        let out = render(
            "{{event}} starts soon. Do not miss {{event}}.",
            &ctx(&[("event", "Launch")]),
        );
        assert_eq!(out, "Launch starts soon. Do not miss Launch.");
    }

    #[test]
    fn test_render_whitespace_in_placeholder() {
        let out = render("Hi {{ name }}", &ctx(&[("name", "Ada")]));
        assert_eq!(out, "Hi Ada");
    }

    #[test]
    fn test_render_unterminated_braces_are_literal() {
        let out = render("Hi {{name", &ctx(&[("name", "Ada")]));
        assert_eq!(out, "Hi {{name");
    }

    #[test]
    fn test_render_is_idempotent_once_plain() {
        let context = ctx(&[("name", "Ada")]);
        let once = render("Hi {{name}} and {{missing}}", &context);
        let twice = render(&once, &context);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_set_opt_absent_leaves_key_unset() {
        let mut context = TemplateContext::new();
        context.set_opt("eventDescription", None);
        let out = render("Note: {{eventDescription}}!", &context);
        assert_eq!(out, "Note: !");
    }

    #[test]
    fn test_ensure_join_link_appends_when_missing() {
        let link = "https://gather.test/join/abc123";
        let out = ensure_join_link("See you there.", INVITE_LINK_PLACEHOLDER, link);
        assert_eq!(out.matches(link).count(), 1);
        assert!(out.starts_with("See you there."));
    }

    #[test]
    fn test_ensure_join_link_keeps_placeholder_body() {
        let body = "Click {{inviteLink}} to join.";
        let out = ensure_join_link(body, INVITE_LINK_PLACEHOLDER, "https://x/join/t");
        assert_eq!(out, body);
    }

    #[test]
    fn test_ensure_join_link_keeps_literal_link() {
        let link = "https://gather.test/join/abc123";
        let body = format!("Join via {} today.", link);
        let out = ensure_join_link(&body, INVITE_LINK_PLACEHOLDER, link);
        assert_eq!(out, body);
    }

    #[test]
    fn test_ensure_join_link_is_idempotent() {
        let link = "https://gather.test/join/abc123";
        let once = ensure_join_link("See you there.", INVITE_LINK_PLACEHOLDER, link);
        let twice = ensure_join_link(&once, INVITE_LINK_PLACEHOLDER, link);
        assert_eq!(once, twice);
        assert_eq!(twice.matches(link).count(), 1);
    }

    #[test]
    fn test_default_body_renders_with_full_context() {
        let mut context = TemplateContext::new();
        context
            .set("eventName", "Demo Day")
            .set("eventDescription", "Quarterly demos.")
            .set("eventStart", "2026-03-01T18:00:00Z")
            .set("eventEnd", "2026-03-01T20:00:00Z")
            .set("inviteLink", "https://gather.test/join/tok");

        let out = render(DEFAULT_BODY, &context);
        assert!(out.contains("Demo Day"));
        assert!(out.contains("https://gather.test/join/tok"));
        assert!(!out.contains("{{"));
    }
}

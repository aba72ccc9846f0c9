//! Placeholder expansion for action arguments and environment values.
//!
//! Recognized tokens are `{path}`, `{rule}`, `{event}`, and `{outputs}`.
//! Expansion is one left-to-right pass: substituted text is never rescanned,
//! so a path or output label containing `{rule}` is passed through verbatim.

/// Values bound to the placeholders for one dispatch.
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub path: &'a str,
    pub rule: &'a str,
    pub event: &'a str,
    /// Output labels already joined with commas.
    pub outputs: &'a str,
}

impl TemplateContext<'_> {
    fn lookup(&self, token: &str) -> Option<&str> {
        match token {
            "path" => Some(self.path),
            "rule" => Some(self.rule),
            "event" => Some(self.event),
            "outputs" => Some(self.outputs),
            _ => None,
        }
    }

    pub fn expand(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after
                .find('}')
                .and_then(|close| self.lookup(&after[..close]).map(|v| (close, v)))
            {
                Some((close, value)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

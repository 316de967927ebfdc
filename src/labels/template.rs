//! Label value templating.
//!
//! Values may reference resource attributes, e.g.
//! `caddy.address = {{name}}.example.com`. Available fields: `id`, `name`,
//! `image`, `kind`, `labels.[<key>]`.

use handlebars::Handlebars;
use serde_json::Value;

/// Renders label values against a resource's template context.
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut hb = Handlebars::new();
        hb.register_escape_fn(handlebars::no_escape);
        Self { handlebars: hb }
    }

    /// Substitute variables in `value`.
    ///
    /// A value that fails to parse or render is returned verbatim.
    pub fn render(&self, value: &str, context: &Value) -> String {
        if !value.contains("{{") {
            return value.to_string();
        }
        match self.handlebars.render_template(value, context) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!(value = %value, error = %e, "Label template failed, using raw value");
                value.to_string()
            }
        }
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer").finish_non_exhaustive()
    }
}

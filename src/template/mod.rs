//! Template rendering facade.
//!
//! The engine only ever needs `render(template_text, context) -> String`;
//! everything else about templating stays behind this boundary.

use handlebars::Handlebars;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template rendering failed: {message}")]
    RenderingFailed { message: String },
}

impl From<handlebars::RenderError> for TemplateError {
    fn from(error: handlebars::RenderError) -> Self {
        TemplateError::RenderingFailed {
            message: error.to_string(),
        }
    }
}

/// Render `text` with `context` as the template data.
pub fn render(text: &str, context: &Value) -> Result<String, TemplateError> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(false);
    Ok(handlebars.render_template(text, context)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_nested_context() {
        let out = render(
            "listen {{settings.port}} on {{host.name}}",
            &json!({"settings": {"port": 8080}, "host": {"name": "web"}}),
        )
        .unwrap();
        assert_eq!(out, "listen 8080 on web");
    }

    #[test]
    fn missing_keys_render_empty_in_lenient_mode() {
        let out = render("a{{missing}}b", &json!({})).unwrap();
        assert_eq!(out, "ab");
    }
}

//! Handlebars rendering of prompt templates.
//!
//! Helpers:
//! - default: value, or a fallback when it is null or blank

use crate::templates::TemplatesFile;
use crate::PromptError;
use handlebars::{handlebars_helper, Handlebars};
use serde_json::Value;

handlebars_helper!(default_helper: |value: Json, fallback: str| {
    match value {
        Value::Null => fallback.to_string(),
        Value::String(s) if s.trim().is_empty() => fallback.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
});

pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
    templates: TemplatesFile,
}

impl TemplateRenderer {
    pub fn new(templates: TemplatesFile) -> Result<Self, PromptError> {
        let mut handlebars = Handlebars::new();

        // Prompts are plain text, not HTML.
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(false);
        handlebars.register_helper("default", Box::new(default_helper));

        for (name, template) in &templates.templates {
            handlebars
                .register_template_string(name, &template.template)
                .map_err(|e| PromptError::Template {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
        }

        Ok(TemplateRenderer {
            handlebars,
            templates,
        })
    }

    pub fn render(&self, template_name: &str, data: &Value) -> Result<String, PromptError> {
        if !self.handlebars.has_template(template_name) {
            return Err(PromptError::MissingTemplate(template_name.to_string()));
        }
        self.handlebars
            .render(template_name, data)
            .map_err(|e| PromptError::Render {
                name: template_name.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn list_templates(&self) -> Vec<&str> {
        self.templates.list_templates()
    }
}

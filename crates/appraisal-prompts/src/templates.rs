//! Prompt template files.
//!
//! A templates file names one Handlebars template per prompt kind:
//!
//! ```yaml
//! version: "1.0"
//! templates:
//!   comment_generation:
//!     description: ...
//!     template: |
//!       **Topic:** {{topic}}
//! ```

use crate::PromptError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Templates shipped with the crate.
pub const BUNDLED: &str = include_str!("../templates/appraisal-prompts.yaml");

#[derive(Debug, Clone, Deserialize)]
pub struct TemplatesFile {
    pub version: String,
    pub templates: HashMap<String, Template>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub description: String,
    pub template: String,
    /// Sample data, handy when editing a template by hand.
    #[serde(default)]
    pub example: Option<serde_json::Value>,
}

impl TemplatesFile {
    pub fn bundled() -> Result<Self, PromptError> {
        Self::from_yaml(BUNDLED)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PromptError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PromptError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, PromptError> {
        serde_yaml::from_str(yaml).map_err(|e| PromptError::Load(e.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Template names, sorted.
    pub fn list_templates(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_templates_parse() {
        let file = TemplatesFile::bundled().unwrap();
        assert_eq!(file.version, "1.0");
        assert_eq!(file.list_templates(), vec!["comment_generation", "comment_review"]);
        assert!(file.get("comment_generation").unwrap().example.is_some());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            TemplatesFile::from_yaml("templates: [").unwrap_err(),
            PromptError::Load(_)
        ));
    }
}

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{AnalysisKind, FoodRecord, UserProfile};

/// Every placeholder a template may reference.
pub const PLACEHOLDERS: &[&str] = &[
    "age",
    "gender",
    "weight",
    "height",
    "health_conditions",
    "dietary_preference",
    "allergies",
    "health_goals",
    "activity_level",
    "name",
    "brand",
    "serving",
    "nutrition",
    "nutrition_scores",
    "dietary_info",
    "environmental_impact",
];

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read prompt template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template '{template}' references unknown placeholder '{field}'")]
    UnknownPlaceholder { template: String, field: String },

    #[error("template '{template}' is malformed at byte {offset}: {reason}")]
    Malformed {
        template: String,
        offset: usize,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Field(String),
}

/// A parsed template. Placeholders are `{field}`; `{{` and `}}` are literal braces.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse `source` and check every placeholder against [`PLACEHOLDERS`].
    pub fn parse(name: &str, source: &str) -> Result<Self, PromptError> {
        let malformed = |offset: usize, reason: &'static str| PromptError::Malformed {
            template: name.to_string(),
            offset,
            reason,
        };

        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' => {
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        text.push('{');
                        continue;
                    }

                    let mut field = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(malformed(offset, "nested '{' inside placeholder")),
                            _ => field.push(inner),
                        }
                    }
                    if !closed {
                        return Err(malformed(offset, "unclosed placeholder"));
                    }
                    if !is_identifier(&field) {
                        return Err(malformed(offset, "invalid placeholder name"));
                    }
                    if !PLACEHOLDERS.contains(&field.as_str()) {
                        return Err(PromptError::UnknownPlaceholder {
                            template: name.to_string(),
                            field,
                        });
                    }

                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Field(field));
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        text.push('}');
                    } else {
                        return Err(malformed(offset, "single '}' outside placeholder"));
                    }
                }
                _ => text.push(c),
            }
        }

        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self {
            name: name.to_string(),
            segments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Placeholders referenced by this template, in order of appearance.
    pub fn fields(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Field(f) => Some(f.as_str()),
                Segment::Text(_) => None,
            })
            .collect()
    }

    pub fn render(&self, user: &UserProfile, food: &FoodRecord) -> String {
        let values: HashMap<&str, String> = user
            .render_fields()
            .into_iter()
            .chain(food.render_fields())
            .collect();

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => out.push_str(t),
                // parse() only admits schema fields, all of which are in `values`
                Segment::Field(f) => out.push_str(values.get(f.as_str()).map(String::as_str).unwrap_or("")),
            }
        }
        out
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Loads `{name}_prompt_template.txt` files from a directory and renders them.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template_dir: PathBuf,
}

impl PromptBuilder {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
        }
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    pub fn template_path(&self, template_name: &str) -> PathBuf {
        self.template_dir
            .join(format!("{}_prompt_template.txt", template_name))
    }

    pub fn load(&self, template_name: &str) -> Result<PromptTemplate, PromptError> {
        let path = self.template_path(template_name);
        let source = fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PromptError::NotFound { path: path.clone() }
            } else {
                PromptError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        log::debug!("📄 Loaded template {} ({} bytes)", path.display(), source.len());
        PromptTemplate::parse(template_name, &source)
    }

    /// Load the named template and fill it with the user and food data.
    pub fn render(
        &self,
        template_name: &str,
        user: &UserProfile,
        food: &FoodRecord,
    ) -> Result<String, PromptError> {
        let template = self.load(template_name)?;
        Ok(template.render(user, food))
    }

    /// Check the templates for every [`AnalysisKind`] so a broken file fails at startup.
    pub fn validate_all(&self) -> Result<(), PromptError> {
        for kind in AnalysisKind::all() {
            let template = self.load(kind.template_name())?;
            log::info!(
                "✅ Template '{}' OK ({} placeholders)",
                template.name(),
                template.fields().len()
            );
        }
        Ok(())
    }
}

//! Template engine
//!
//! HTML pages are rendered with Tera. The templates shipped under
//! `templates/` are embedded into the binary; a directory configured as
//! `templates.path` may replace any of them by providing a file with the
//! same relative name.

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

use crate::models::User;

mod error;

pub use error::ThemeError;

/// Templates compiled into the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Renders the site's pages
pub struct ThemeEngine {
    tera: Tera,
    override_path: Option<PathBuf>,
}

impl ThemeEngine {
    /// Load the embedded templates, then overrides from `override_path`
    pub fn new(override_path: Option<&Path>) -> Result<Self> {
        let mut templates = embedded_templates()?;

        if let Some(dir) = override_path {
            if dir.is_dir() {
                let mut overrides = Vec::new();
                collect_templates_from_dir(dir, dir, &mut overrides)?;
                for (name, content) in overrides {
                    tracing::info!("Template '{}' overridden from {:?}", name, dir);
                    templates.insert(name, content);
                }
            } else {
                tracing::warn!("Template directory {:?} does not exist, using built-in templates", dir);
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())
            .map_err(|e| ThemeError::TemplateError(describe(&e)))?;

        Ok(Self {
            tera,
            override_path: override_path.map(Path::to_path_buf),
        })
    }

    /// Only the built-in templates
    pub fn embedded() -> Result<Self> {
        Self::new(None)
    }

    pub fn override_path(&self) -> Option<&Path> {
        self.override_path.as_deref()
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            ThemeError::TemplateError(format!("Failed to render '{}': {}", template, describe(&e)))
                .into()
        })
    }

    /// Render a template with the variables every page receives
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        full_context.insert("site_name", &standard_vars.site_name);
        full_context.insert("request_path", &standard_vars.request_path);
        full_context.insert("year", &standard_vars.year);
        full_context.insert("current_user", &standard_vars.current_user);

        self.render(template, &full_context)
    }

    /// Render `template`, falling back to `error.html` and finally to a bare
    /// HTML page; never fails
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("Failed to render template '{}': {}", template, e);

                let mut error_context = context.clone();
                error_context.insert("status", &500);
                error_context.insert("message", "The page could not be displayed.");

                match self.render("error.html", &error_context) {
                    Ok(html) => html,
                    Err(error_template_err) => {
                        tracing::error!("Failed to render error template: {}", error_template_err);
                        simple_error_page(500, "The page could not be displayed.")
                    }
                }
            }
        }
    }
}

/// Minimal page used when no template can be rendered
pub fn simple_error_page(status: u16, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Error {status}</title></head>
<body><h1>Error {status}</h1><p>{message}</p></body>
</html>"#,
        status = status,
        message = tera::escape_html(message),
    )
}

fn embedded_templates() -> Result<BTreeMap<String, String>> {
    let mut templates = BTreeMap::new();
    for name in EmbeddedTemplates::iter() {
        let file = EmbeddedTemplates::get(&name)
            .ok_or_else(|| ThemeError::NotFound(name.to_string()))?;
        let content = String::from_utf8(file.data.into_owned())
            .with_context(|| format!("Template is not valid UTF-8: {}", name))?;
        templates.insert(name.replace('\\', "/"), content);
    }
    Ok(templates)
}

/// Collect `.html` files below `current_path`, named relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(current_path)
        .with_context(|| format!("Failed to read template directory: {:?}", current_path))?
    {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().map_or(false, |ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.push((template_name, content));
        }
    }
    Ok(())
}

/// Tera error with its chain of causes
fn describe(e: &tera::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        msg.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    msg
}

/// Variables available to every page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardTemplateVars {
    pub site_name: String,
    /// Path (and query) of the current request
    pub request_path: String,
    pub current_user: Option<CurrentUser>,
    /// Current year (for the footer)
    pub year: i32,
}

impl StandardTemplateVars {
    pub fn new(site_name: impl Into<String>, request_path: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
            request_path: request_path.into(),
            current_user: None,
            year: chrono::Utc::now().year(),
        }
    }

    pub fn with_user(mut self, user: Option<&User>) -> Self {
        self.current_user = user.map(CurrentUser::from);
        self
    }
}

/// The logged-in user as templates see it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin(),
        }
    }
}

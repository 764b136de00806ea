//! Theme engine
//!
//! Pages are rendered with Tera. The default templates are compiled into
//! the binary; any `.html` file under the configured override directory
//! replaces the embedded template with the same relative name, so a site
//! can restyle single pages without shipping a whole theme.

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera, Value};

use crate::models::User;
use crate::services::MarkdownRenderer;

mod error;

pub use error::ThemeError;

/// Template rendered for 403, 404 and 500 responses
pub const ERROR_TEMPLATE: &str = "error.html";

/// Default templates shipped with the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Theme engine for rendering templates
pub struct ThemeEngine {
    tera: Tera,
}

impl ThemeEngine {
    /// Build the engine from the embedded templates plus overrides found
    /// under `overrides_path`. A missing directory means no overrides.
    pub fn new(overrides_path: &Path) -> Result<Self> {
        let mut templates = embedded_templates()?;

        if overrides_path.is_dir() {
            let mut overrides = BTreeMap::new();
            collect_templates_from_dir(overrides_path, overrides_path, &mut overrides)?;
            for name in overrides.keys() {
                tracing::debug!("Template '{}' overridden from {:?}", name, overrides_path);
            }
            templates.extend(overrides);
        }

        let tera = build_tera(templates)?;
        tracing::info!(
            "Loaded {} templates",
            tera.get_template_names().count()
        );

        Ok(Self { tera })
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            ThemeError::TemplateError(error_msg).into()
        })
    }

    /// Render a template with the standard variables added to `context`
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        standard_vars.insert_into(&mut full_context);
        self.render(template, &full_context)
    }
}

/// Last-resort page used when even the error template cannot render
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
        let Some(file) = EmbeddedTemplates::get(&name) else {
            continue;
        };
        let content = String::from_utf8(file.data.into_owned())
            .map_err(|_| ThemeError::InvalidEncoding(name.to_string()))?;
        templates.insert(name.to_string(), content);
    }
    Ok(templates)
}

/// Collect `.html` files below `current_path`, named relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut BTreeMap<String, String>,
) -> Result<()> {
    for entry in fs::read_dir(current_path).map_err(ThemeError::from)? {
        let entry = entry.map_err(ThemeError::from)?;
        let path = entry.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().map_or(false, |ext| ext == "html") {
            let relative_path = path.strip_prefix(base_path).map_err(|_| {
                ThemeError::TemplateError("Failed to get relative path".to_string())
            })?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.insert(template_name, content);
        }
    }
    Ok(())
}

fn build_tera(templates: BTreeMap<String, String>) -> Result<Tera> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![".html"]);

    // add_raw_templates resolves inheritance once every template is known
    tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())
        .map_err(|e| {
            let mut error_msg = format!("Failed to load templates: {}", e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            ThemeError::TemplateError(error_msg)
        })?;

    tera.register_filter("markdown", markdown_filter);
    tera.register_filter("excerpt", excerpt_filter);
    Ok(tera)
}

/// `{{ blog.content | markdown | safe }}`
fn markdown_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let source = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("markdown filter expects a string"))?;
    Ok(Value::String(MarkdownRenderer::new().render(source)))
}

/// `{{ blog.content | excerpt(length=200) }}`: plain text preview
fn excerpt_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let source = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("excerpt filter expects a string"))?;
    let length = args
        .get("length")
        .and_then(Value::as_u64)
        .unwrap_or(200) as usize;
    Ok(Value::String(MarkdownRenderer::new().excerpt(source, length)))
}

/// Standard template variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardTemplateVars {
    pub site_name: String,
    pub site_description: String,
    /// Logged-in user, if any
    pub current_user: Option<CurrentUser>,
    pub request_path: String,
    /// Current year (for the footer)
    pub year: i32,
    /// Flash messages to show once
    pub messages: Vec<FlashMessage>,
}

/// Current user information for templates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub is_admin: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role.to_string(),
            is_admin: user.is_admin(),
        }
    }
}

/// One-shot message shown on the next rendered page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    /// `success`, `info` or `error`
    pub level: String,
    pub text: String,
}

impl FlashMessage {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: "success".to_string(),
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: "error".to_string(),
            text: text.into(),
        }
    }
}

impl StandardTemplateVars {
    pub fn new(
        site_name: impl Into<String>,
        site_description: impl Into<String>,
        request_path: impl Into<String>,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            site_description: site_description.into(),
            current_user: None,
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
            messages: Vec::new(),
        }
    }

    /// Set the current user
    pub fn with_user(mut self, user: Option<CurrentUser>) -> Self {
        self.current_user = user;
        self
    }

    pub fn with_messages(mut self, messages: Vec<FlashMessage>) -> Self {
        self.messages = messages;
        self
    }

    fn insert_into(&self, context: &mut TeraContext) {
        context.insert("site_name", &self.site_name);
        context.insert("site_description", &self.site_description);
        context.insert("request_path", &self.request_path);
        context.insert("year", &self.year);
        context.insert("messages", &self.messages);
        if let Some(ref user) = self.current_user {
            context.insert("current_user", user);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn has_template(engine: &ThemeEngine, name: &str) -> bool {
        engine.tera.get_template_names().any(|n| n == name)
    }

    fn vars() -> StandardTemplateVars {
        StandardTemplateVars::new("Field Notes", "Daily notes", "/")
    }

    #[test]
    fn test_embedded_templates_load() {
        let temp_dir = TempDir::new().unwrap();
        let engine = ThemeEngine::new(&temp_dir.path().join("missing")).unwrap();

        for name in [
            "base.html",
            "home.html",
            "error.html",
            "blog/detail.html",
            "blog/create.html",
            "blog/edit.html",
            "blog/delete.html",
            "blog/my_blogs.html",
            "categories/list.html",
            "categories/detail.html",
            "account/register.html",
            "account/login.html",
            "account/profile.html",
            "account/profile_detail.html",
            "admin/categories.html",
        ] {
            assert!(has_template(&engine, name), "missing template {}", name);
        }
    }

    #[test]
    fn test_override_replaces_embedded_template() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("account")).unwrap();
        fs::write(
            temp_dir.path().join("error.html"),
            "custom {{ status }} on {{ site_name }}",
        )
        .unwrap();
        fs::write(temp_dir.path().join("account/extra.html"), "extra").unwrap();

        let engine = ThemeEngine::new(temp_dir.path()).unwrap();
        let mut context = TeraContext::new();
        context.insert("status", &404);
        let html = engine
            .render_with_standard_vars("error.html", &context, &vars())
            .unwrap();
        assert_eq!(html, "custom 404 on Field Notes");
        assert!(has_template(&engine, "account/extra.html"));
        assert!(has_template(&engine, "home.html"));
    }

    #[test]
    fn test_invalid_override_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("home.html"), "{% if %}").unwrap();
        assert!(ThemeEngine::new(temp_dir.path()).is_err());
    }

    #[test]
    fn test_standard_vars_are_escaped_and_present() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("vars.html"),
            "{{ site_name }}|{{ year }}|{% for m in messages %}{{ m.level }}:{{ m.text }}{% endfor %}|{% if current_user %}{{ current_user.username }}{% endif %}",
        )
        .unwrap();

        let engine = ThemeEngine::new(temp_dir.path()).unwrap();
        let standard = StandardTemplateVars::new("<b>Notes</b>", "", "/")
            .with_messages(vec![FlashMessage::success("Saved")])
            .with_user(Some(CurrentUser {
                id: 1,
                username: "ada".to_string(),
                role: "admin".to_string(),
                is_admin: true,
            }));
        let html = engine
            .render_with_standard_vars("vars.html", &TeraContext::new(), &standard)
            .unwrap();
        let year = chrono::Utc::now().year();
        assert_eq!(
            html,
            format!("&lt;b&gt;Notes&lt;&#x2F;b&gt;|{}|success:Saved|ada", year)
        );
    }

    #[test]
    fn test_markdown_filters() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("md.html"),
            "{{ body | markdown | safe }}#{{ body | excerpt(length=5) }}",
        )
        .unwrap();

        let engine = ThemeEngine::new(temp_dir.path()).unwrap();
        let mut context = TeraContext::new();
        context.insert("body", "**bold** text");
        let html = engine.render("md.html", &context).unwrap();
        assert!(html.starts_with("<p><strong>bold</strong> text</p>"));
        assert!(html.contains('#'));
    }

    #[test]
    fn test_simple_error_page_escapes() {
        let page = simple_error_page(500, "<oops>");
        assert!(page.contains("Error 500"));
        assert!(page.contains("&lt;oops&gt;"));
    }
}

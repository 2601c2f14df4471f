//! Template registry and rendering.
//!
//! Templates are plain functions from a [`ViewContext`] to maud markup,
//! registered at startup under paths such as `"status/index"` or `"layout"`.

use anyhow::{anyhow, Result};
use maud::{html, Markup, PreEscaped};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Variables passed to a template
pub type Vars = Map<String, Value>;

/// Variable holding the rendered inner template inside a layout
pub const CONTENT_KEY: &str = "_content";

pub type Template = Arc<dyn Fn(&ViewContext) -> Markup + Send + Sync>;

/// HTML-escape a string for use in text or attribute position
pub fn escape(s: &str) -> String {
    html! { (s) }.into_string()
}

/// Build a [`Vars`] map from anything serializable as a JSON object
///
/// Non-object values give an empty map.
pub fn vars<T: Serialize>(value: T) -> Vars {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Vars::new(),
    }
}

/// What a template sees while rendering
#[derive(Debug, Clone, Default)]
pub struct ViewContext {
    vars: Vars,
}

impl ViewContext {
    pub fn new(vars: Vars) -> Self {
        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// String variable, `""` when missing or not a string
    pub fn str(&self, key: &str) -> &str {
        self.vars.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    pub fn bool(&self, key: &str) -> bool {
        self.vars.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Array variable, empty when missing
    pub fn list(&self, key: &str) -> &[Value] {
        self.vars
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Rendered inner template, for layouts
    pub fn content(&self) -> PreEscaped<&str> {
        PreEscaped(self.str(CONTENT_KEY))
    }

    pub fn base_url(&self) -> &str {
        self.str("base_url")
    }

    pub fn is_authenticated(&self) -> bool {
        self.bool("authenticated")
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }
}

/// All templates known to the application
#[derive(Clone, Default)]
pub struct ViewRegistry {
    templates: HashMap<String, Template>,
}

impl std::fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut paths: Vec<_> = self.templates.keys().collect();
        paths.sort();
        f.debug_struct("ViewRegistry").field("templates", &paths).finish()
    }
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, path: impl Into<String>, template: F) -> &mut Self
    where
        F: Fn(&ViewContext) -> Markup + Send + Sync + 'static,
    {
        self.templates.insert(path.into(), Arc::new(template));
        self
    }

    /// Builder form of [`ViewRegistry::register`]
    pub fn with<F>(mut self, path: impl Into<String>, template: F) -> Self
    where
        F: Fn(&ViewContext) -> Markup + Send + Sync + 'static,
    {
        self.register(path, template);
        self
    }

    pub fn get(&self, path: &str) -> Option<&Template> {
        self.templates.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.templates.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Renders templates with a fixed set of default variables
pub struct View<'a> {
    registry: &'a ViewRegistry,
    defaults: Vars,
    layout_vars: Vars,
}

impl<'a> View<'a> {
    pub fn new(registry: &'a ViewRegistry, defaults: Vars) -> Self {
        Self {
            registry,
            defaults,
            layout_vars: Vars::new(),
        }
    }

    /// Set a variable visible only to the layout (e.g. the page title)
    pub fn set_layout_var(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.layout_vars.insert(name.into(), value.into());
    }

    /// Render `path` with the defaults overlaid by `vars`, then wrap the
    /// result in `layout` when one is given
    pub fn render(&self, path: &str, vars: Vars, layout: Option<&str>) -> Result<String> {
        let mut merged = self.defaults.clone();
        merged.extend(vars);

        let content = self.render_template(path, merged)?;

        match layout {
            Some(layout) => {
                let mut merged = self.defaults.clone();
                merged.extend(self.layout_vars.clone());
                merged.insert(CONTENT_KEY.to_string(), Value::String(content));
                self.render_template(layout, merged)
            }
            None => Ok(content),
        }
    }

    fn render_template(&self, path: &str, vars: Vars) -> Result<String> {
        let template = self
            .registry
            .get(path)
            .ok_or_else(|| anyhow!("View template not found: {}", path))?;

        tracing::trace!(template = %path, "Rendering view");
        Ok(template(&ViewContext::new(vars)).into_string())
    }
}

/// Route definitions and their compiled form
///
/// A `RouteDefinition` is what the application declares; a `CompiledRoute`
/// is what the router matches against. Compilation happens once at startup.

pub mod pattern;

pub use pattern::{classify_segment, compile_pattern, PatternSegmentType};

use crate::path::pattern_segments;
use crate::{ResolvedParams, RouteError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A URL pattern mapped to a controller/action target plus literal defaults
///
/// Deserialises from a route table entry:
///
/// ```toml
/// [[routes]]
/// pattern = "/user/:user_name"
/// controller = "status"
/// action = "user"
/// defaults = { page = "1" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// URL pattern like "/users/:id"
    pub pattern: String,
    /// Controller name, e.g. "user" (resolved to `UserController`)
    pub controller: String,
    /// Action name, e.g. "show"
    pub action: String,
    /// Literal params merged under the captures
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

impl RouteDefinition {
    pub fn new(
        pattern: impl Into<String>,
        controller: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            controller: controller.into(),
            action: action.into(),
            defaults: BTreeMap::new(),
        }
    }

    /// Adds a literal default param
    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }
}

impl<P, C, A> From<(P, C, A)> for RouteDefinition
where
    P: Into<String>,
    C: Into<String>,
    A: Into<String>,
{
    fn from((pattern, controller, action): (P, C, A)) -> Self {
        RouteDefinition::new(pattern, controller, action)
    }
}

/// A route definition compiled to an anchored regular expression
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    definition: RouteDefinition,
    regex: Regex,
    params: Vec<String>,
}

impl CompiledRoute {
    /// Compiles a single definition
    pub fn compile(definition: RouteDefinition) -> Result<Self, RouteError> {
        let (source, params) = compile_pattern(&definition.pattern)?;
        let regex = Regex::new(&source).map_err(|e| RouteError::Regex {
            pattern: definition.pattern.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            definition,
            regex,
            params,
        })
    }

    /// The pattern as declared
    pub fn pattern(&self) -> &str {
        &self.definition.pattern
    }

    /// The anchored regex the pattern compiled to
    pub fn regex_source(&self) -> &str {
        self.regex.as_str()
    }

    /// Names of the captures, in pattern order
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn definition(&self) -> &RouteDefinition {
        &self.definition
    }

    /// Matches a normalized path, merging metadata, defaults and captures
    ///
    /// Merge order is metadata → defaults → captures, so a capture wins over a
    /// same-named default.
    pub fn resolve(&self, path: &str) -> Option<ResolvedParams> {
        let captures = self.regex.captures(path)?;

        let mut params: HashMap<String, String> = self
            .definition
            .defaults
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        params.insert("controller".to_string(), self.definition.controller.clone());
        params.insert("action".to_string(), self.definition.action.clone());

        for name in &self.params {
            if let Some(value) = captures.name(name) {
                params.insert(name.clone(), value.as_str().to_string());
            }
        }

        Some(ResolvedParams::new(params))
    }

    /// Builds a concrete path for this route, or `None` if a capture is
    /// missing or its value would not round-trip through `resolve`
    pub fn generate(&self, values: &HashMap<String, String>) -> Option<String> {
        let segments = pattern_segments(&self.definition.pattern)
            .map(|segment| match classify_segment(segment) {
                PatternSegmentType::Static(text) => Some(text.to_string()),
                PatternSegmentType::Param(name) => values
                    .get(name)
                    .or_else(|| self.definition.defaults.get(name))
                    .filter(|v| !v.is_empty() && !v.contains('/'))
                    .cloned(),
            })
            .collect::<Option<Vec<_>>>()?;

        Some(format!("/{}", segments.join("/")))
    }
}

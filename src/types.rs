//! Data model shared by the parsing passes.
//!
//! Everything here is created fresh for a single render call and dropped at
//! the end of it. Nothing is cached between calls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------
// Input
// ------------------------------------------------------------------

/// Raw markup plus the locale it is being rendered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupDocument {
    pub source: String,
    pub locale: String,
}

impl MarkupDocument {
    pub fn new(source: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            locale: locale.into(),
        }
    }
}

// ------------------------------------------------------------------
// Balanced tag tree
// ------------------------------------------------------------------

/// A node of the tree built by the tag balancer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Element(Element),
    Text(String),
}

/// An HTML-like element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub children: Vec<ContentNode>,
}

impl Element {
    pub fn new(name: impl Into<String>, attrs: Vec<Attribute>) -> Self {
        Self {
            name: name.into(),
            attrs,
            children: Vec::new(),
        }
    }
}

/// A single attribute. An empty value serializes as a bare boolean attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// ------------------------------------------------------------------
// {for} regions
// ------------------------------------------------------------------

/// Where a `{for}` or `{/for}` delimiter sits relative to its source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OwnLine {
    /// The delimiter is the only non-whitespace content on its line.
    pub on_own_line: bool,
    /// Nothing precedes the delimiter in the whole input.
    pub at_top: bool,
    /// Only whitespace follows the delimiter in the whole input.
    pub at_bottom: bool,
}

/// How an expanded region is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionDisplay {
    /// `<span class="for">`
    Inline,
    /// `<div class="for">`
    Block,
}

impl RegionDisplay {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Inline => "span",
            Self::Block => "div",
        }
    }
}

/// A `{for ...}` opener recorded while stripping regions out of the markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForRegion {
    /// Index carried by the placeholder token.
    pub index: usize,
    /// Target platform tokens from `{for mac, linux}`, whitespace-trimmed.
    pub targets: Vec<String>,
}

// ------------------------------------------------------------------
// Templates
// ------------------------------------------------------------------

/// A parsed `[[Template:name|arg|...]]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateInvocation {
    pub name: String,
    pub args: Vec<String>,
}

impl TemplateInvocation {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// `Template:<name>`, the document title the body is stored under.
    pub fn title(&self) -> String {
        format!("Template:{}", self.name)
    }
}

/// Bound template parameters, keyed by position (`"1"`, `"2"`), explicit
/// number, or name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterMap {
    values: BTreeMap<String, String>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a parameter. Returns `&mut Self` for chaining.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

// ------------------------------------------------------------------
// Reference resolution
// ------------------------------------------------------------------

/// The kinds of `[[...]]` references that resolve against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Template,
    Include,
    Video,
    Image,
}

impl ReferenceKind {
    /// The sentence rendered in place of a reference that did not resolve.
    pub fn missing_message(self, title: &str) -> String {
        match self {
            Self::Template => format!(
                "The template \"{title}\" does not exist or has no approved revision."
            ),
            Self::Include => format!("The document \"{title}\" does not exist."),
            Self::Video => format!("The video \"{title}\" does not exist."),
            Self::Image => format!("The image \"{title}\" does not exist."),
        }
    }
}

/// Outcome of resolving a template, include or media reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedReference {
    /// Content and the locale it was actually found in.
    Found { content: String, locale: String },
    NotFound { title: String },
    /// The document exists but has no approved revision (templates only).
    NotApproved { title: String },
}

impl ResolvedReference {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Found { content, .. } => Some(content),
            Self::NotFound { .. } | Self::NotApproved { .. } => None,
        }
    }
}

// ------------------------------------------------------------------
// Store records
// ------------------------------------------------------------------

/// A document revision as returned by the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContent {
    pub content: String,
    #[serde(default = "default_approved")]
    pub approved: bool,
}

fn default_approved() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// A media asset with per-format URLs. Images use `url`; videos use the
/// encoded formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub kind: MediaKind,
    pub title: String,
    pub locale: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub webm: Option<String>,
    #[serde(default)]
    pub ogv: Option<String>,
    #[serde(default)]
    pub flv: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
}

impl MediaAsset {
    pub fn new(kind: MediaKind, title: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            locale: locale.into(),
            url: None,
            webm: None,
            ogv: None,
            flv: None,
            poster: None,
        }
    }
}

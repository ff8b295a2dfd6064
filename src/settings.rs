//! Named package settings and the `%(NAME)s` placeholder templates they fill.
//!
//! Templates are parsed once, when a descriptor is loaded, so every placeholder
//! a package references can be checked against its settings before anything
//! runs. Rendering a template against settings that lack a referenced name is
//! still a [`BootstrapError::Config`].

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{BootstrapError, Result};

/// Setting name to value mapping for one package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, String>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.0.insert(name.into(), value.into());
    }

    /// Merges entries into the settings; a later value replaces an earlier one
    /// for the same name.
    pub fn update<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in entries {
            self.insert(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut settings = Settings::new();
        settings.update(iter);
        settings
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Text with `%(NAME)s` placeholders. `%%` stands for a literal `%`; any other
/// `%` is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = text;

        while let Some(pos) = rest.find('%') {
            literal.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];

            if let Some(after) = tail.strip_prefix('%') {
                literal.push('%');
                rest = after;
            } else if let Some(open) = tail.strip_prefix('(') {
                let close = open.find(')').ok_or_else(|| {
                    BootstrapError::config(format!("unterminated placeholder in {text:?}"))
                })?;
                let name = &open[..close];
                let after = open[close + 1..].strip_prefix('s').ok_or_else(|| {
                    BootstrapError::config(format!(
                        "placeholder %({name}) must end with `s` in {text:?}"
                    ))
                })?;
                if name.is_empty() || name.contains('(') {
                    return Err(BootstrapError::config(format!(
                        "invalid placeholder name {name:?} in {text:?}"
                    )));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name.to_string()));
                rest = after;
            } else {
                literal.push('%');
                rest = tail;
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: text.to_string(),
            segments,
        })
    }

    /// The unparsed template text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Setting names referenced by this template, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Referenced names that `settings` does not define.
    pub fn missing<'a>(&'a self, settings: &Settings) -> Vec<&'a str> {
        self.placeholders()
            .filter(|name| !settings.contains(name))
            .collect()
    }

    pub fn render(&self, settings: &Settings) -> Result<String> {
        self.render_with(settings, |value| Cow::Borrowed(value))
    }

    /// Renders the template, passing every setting value through `escape`
    /// before it is inserted. Literal text is never escaped.
    pub fn render_with<F>(&self, settings: &Settings, escape: F) -> Result<String>
    where
        F: for<'v> Fn(&'v str) -> Cow<'v, str>,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = settings.get(name).ok_or_else(|| {
                        BootstrapError::config(format!(
                            "unresolved setting %({name})s in {:?}",
                            self.source
                        ))
                    })?;
                    out.push_str(&escape(value));
                }
            }
        }
        Ok(out)
    }
}

impl FromStr for Template {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self> {
        Template::parse(s)
    }
}

impl TryFrom<String> for Template {
    type Error = BootstrapError;

    fn try_from(value: String) -> Result<Self> {
        Template::parse(&value)
    }
}

impl From<Template> for String {
    fn from(template: Template) -> Self {
        template.source
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

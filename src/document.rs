//! Parsed gateway documents and the tree queries run against them.
//!
//! The gateway emits bare `&` characters inside free-text fields (location and
//! rule names), so every body goes through [`escape_illegal_ampersands`] before
//! it reaches the XML parser.
//!
//! Queries are expressed as [`Selector`] paths: a chain of child steps, each
//! matching a tag (or any tag) and optionally a predicate on the matched
//! element. A selector is evaluated from a context element, never from the
//! document root implicitly, so `Selector::child("rule")` on the root means
//! "top-level rules" only.

use std::borrow::Cow;
use xmltree::{Element, XMLNode};

use crate::error::AnnaError;

/// Rewrite every `&` that does not start an entity or character reference.
///
/// An entity start is an ASCII letter or `#`; anything else, including end of
/// input, makes the ampersand literal text.
pub fn escape_illegal_ampersands(raw: &str) -> Cow<'_, str> {
    let bytes = raw.as_bytes();
    let is_bare = |i: usize| !matches!(bytes.get(i + 1), Some(b) if b.is_ascii_alphabetic() || *b == b'#');
    if !bytes.iter().enumerate().any(|(i, b)| *b == b'&' && is_bare(i)) {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len() + 16);
    for (i, ch) in raw.char_indices() {
        if ch == '&' && is_bare(i) {
            out.push_str("&amp;");
        } else {
            out.push(ch);
        }
    }
    Cow::Owned(out)
}

/// One fetched snapshot of the gateway object graph.
#[derive(Debug, Clone)]
pub struct Document {
    root: Element,
}

impl Document {
    pub fn parse(raw: &str) -> Result<Self, AnnaError> {
        let normalized = escape_illegal_ampersands(raw);
        let root = Element::parse(normalized.as_bytes())?;
        Ok(Document { root })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }
}

/// Child elements of `el`, in document order.
pub fn child_elements(el: &Element) -> impl Iterator<Item = &Element> {
    el.children.iter().filter_map(|node| match node {
        XMLNode::Element(child) => Some(child),
        _ => None,
    })
}

/// Every element below `el` (not `el` itself) named `tag`, depth first in document order.
pub fn descendants<'a>(el: &'a Element, tag: &str) -> Vec<&'a Element> {
    let mut out = Vec::new();
    collect_descendants(el, tag, &mut out);
    out
}

fn collect_descendants<'a>(el: &'a Element, tag: &str, out: &mut Vec<&'a Element>) {
    for child in child_elements(el) {
        if child.name == tag {
            out.push(child);
        }
        collect_descendants(child, tag, out);
    }
}

pub fn attr<'a>(el: &'a Element, name: &str) -> Option<&'a str> {
    el.attributes.get(name).map(String::as_str)
}

/// Trimmed text content of `el`; `None` for elements without (non-blank) text.
pub fn text(el: &Element) -> Option<String> {
    let t = el.get_text()?;
    let trimmed = t.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

/// Trimmed text of the first child named `tag`.
pub fn child_text(el: &Element, tag: &str) -> Option<String> {
    child_elements(el).find(|c| c.name == tag).and_then(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate<'s> {
    /// `[@name='value']`
    Attr(&'s str, &'s str),
    /// `[@name]`
    HasAttr(&'s str),
    /// `[child='text']`
    ChildText(&'s str, &'s str),
}

impl Predicate<'_> {
    fn matches(&self, el: &Element) -> bool {
        match *self {
            Predicate::Attr(name, value) => attr(el, name) == Some(value),
            Predicate::HasAttr(name) => el.attributes.contains_key(name),
            Predicate::ChildText(tag, value) => child_elements(el)
                .filter(|c| c.name == tag)
                .any(|c| text(c).as_deref() == Some(value)),
        }
    }
}

#[derive(Debug, Clone)]
struct Step<'s> {
    /// `None` matches any tag.
    tag: Option<&'s str>,
    predicates: Vec<Predicate<'s>>,
}

impl Step<'_> {
    fn matches(&self, el: &Element) -> bool {
        self.tag.is_none_or(|t| el.name == t) && self.predicates.iter().all(|p| p.matches(el))
    }
}

/// A relative child path, e.g. `appliance[type='thermostat']/logs/point_log`.
#[derive(Debug, Clone, Default)]
pub struct Selector<'s> {
    steps: Vec<Step<'s>>,
}

impl<'s> Selector<'s> {
    pub fn child(tag: &'s str) -> Self {
        Selector::default().then(tag)
    }

    /// Append a step matching children named `tag`.
    pub fn then(mut self, tag: &'s str) -> Self {
        self.steps.push(Step {
            tag: Some(tag),
            predicates: Vec::new(),
        });
        self
    }

    /// Append a step matching children of any name.
    pub fn any(mut self) -> Self {
        self.steps.push(Step {
            tag: None,
            predicates: Vec::new(),
        });
        self
    }

    /// Constrain the last step. A selector without steps ignores predicates.
    pub fn filter(mut self, predicate: Predicate<'s>) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.predicates.push(predicate);
        }
        self
    }

    pub fn with_attr(self, name: &'s str, value: &'s str) -> Self {
        self.filter(Predicate::Attr(name, value))
    }

    pub fn has_attr(self, name: &'s str) -> Self {
        self.filter(Predicate::HasAttr(name))
    }

    pub fn with_child_text(self, tag: &'s str, value: &'s str) -> Self {
        self.filter(Predicate::ChildText(tag, value))
    }

    /// All matches in document order.
    pub fn find_all<'a>(&self, context: &'a Element) -> Vec<&'a Element> {
        let mut current = vec![context];
        for step in &self.steps {
            current = current
                .into_iter()
                .flat_map(|el| child_elements(el))
                .filter(|el| step.matches(el))
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// First match in document order.
    pub fn find<'a>(&self, context: &'a Element) -> Option<&'a Element> {
        self.find_all(context).into_iter().next()
    }

    /// Text of the first match.
    pub fn find_text(&self, context: &Element) -> Option<String> {
        self.find(context).and_then(text)
    }
}

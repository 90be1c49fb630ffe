//! Single-field extraction rules over a fetched document.
//!
//! Rules are data: a CSS selector, a regex, a JSON path or an XML element
//! name. Applying a rule either yields the field's raw text or
//! [`Error::FieldNotFound`].

use crate::core::error::{Error, Result};
use crate::core::metadata::{Field, FieldValue};
use crate::utils::clean_description_html;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    Json,
    Xml,
    Text,
}

enum Parsed {
    Html(Html),
    Json(Value),
    Xml(HashMap<String, String>),
    Text,
}

/// A response body together with its parsed form. The raw body is kept for
/// regex rules.
pub struct Document {
    raw: String,
    parsed: Parsed,
}

impl Document {
    pub fn parse(kind: DocumentKind, body: &str) -> Result<Self> {
        let parsed = match kind {
            DocumentKind::Html => Parsed::Html(Html::parse_document(body)),
            DocumentKind::Json => Parsed::Json(serde_json::from_str(body)?),
            DocumentKind::Xml => Parsed::Xml(xml_element_texts(body)?),
            DocumentKind::Text => Parsed::Text,
        };
        Ok(Self {
            raw: body.to_string(),
            parsed,
        })
    }

    /// Text of the first element with this local name, for XML documents.
    pub fn xml_text(&self, element: &str) -> Option<&str> {
        match &self.parsed {
            Parsed::Xml(values) => values.get(element).map(String::as_str),
            _ => None,
        }
    }
}

/// Flattens an XML document into `local name -> text of first occurrence`.
/// CDATA sections count as text.
pub fn xml_element_texts(body: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut open: Vec<(String, String)> = Vec::new();
    let mut values = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                open.push((name, String::new()));
            }
            Event::Text(text) => {
                if let Some((_, buffer)) = open.last_mut() {
                    buffer.push_str(&text.unescape()?);
                }
            }
            Event::CData(cdata) => {
                if let Some((_, buffer)) = open.last_mut() {
                    buffer.push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                }
            }
            Event::End(_) => {
                if let Some((name, text)) = open.pop() {
                    values.entry(name).or_insert(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(values)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone)]
pub enum Rule {
    Css {
        selector: String,
        attr: Option<String>,
        inner_html: bool,
    },
    Regex {
        pattern: Regex,
        group: usize,
    },
    JsonPath(Vec<PathSegment>),
    XmlText(String),
}

impl Rule {
    pub fn css(selector: &str) -> Self {
        Rule::Css {
            selector: selector.to_string(),
            attr: None,
            inner_html: false,
        }
    }

    pub fn css_attr(selector: &str, attr: &str) -> Self {
        Rule::Css {
            selector: selector.to_string(),
            attr: Some(attr.to_string()),
            inner_html: false,
        }
    }

    pub fn css_inner_html(selector: &str) -> Self {
        Rule::Css {
            selector: selector.to_string(),
            attr: None,
            inner_html: true,
        }
    }

    /// First capture group of `pattern`.
    pub fn regex(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| Error::Config(e.to_string()))?;
        Ok(Rule::Regex { pattern, group: 1 })
    }

    /// Dotted path; purely numeric segments index into arrays.
    pub fn json(path: &str) -> Self {
        let segments = path
            .split('.')
            .filter(|s| !s.is_empty())
            .map(|s| match s.parse::<usize>() {
                Ok(index) => PathSegment::Index(index),
                Err(_) => PathSegment::Key(s.to_string()),
            })
            .collect();
        Rule::JsonPath(segments)
    }

    pub fn xml(element: &str) -> Self {
        Rule::XmlText(element.to_string())
    }

    pub fn apply(&self, doc: &Document) -> Result<String> {
        match self {
            Rule::Css {
                selector,
                attr,
                inner_html,
            } => {
                let Parsed::Html(html) = &doc.parsed else {
                    return Err(Error::parse("CSS rule applied to a non-HTML document"));
                };
                let parsed = Selector::parse(selector)
                    .map_err(|e| Error::Config(format!("bad selector {}: {:?}", selector, e)))?;
                let element = html
                    .select(&parsed)
                    .next()
                    .ok_or_else(|| Error::field_not_found(selector.as_str()))?;
                match (attr, inner_html) {
                    (Some(attr), _) => element
                        .value()
                        .attr(attr)
                        .map(str::to_string)
                        .ok_or_else(|| Error::field_not_found(format!("{}@{}", selector, attr))),
                    (None, true) => Ok(element.inner_html()),
                    (None, false) => Ok(element.text().collect::<String>().trim().to_string()),
                }
            }
            Rule::Regex { pattern, group } => pattern
                .captures(&doc.raw)
                .and_then(|captures| captures.get(*group))
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| Error::field_not_found(pattern.as_str())),
            Rule::JsonPath(segments) => {
                let Parsed::Json(root) = &doc.parsed else {
                    return Err(Error::parse("JSON rule applied to a non-JSON document"));
                };
                let value = walk_json(root, segments)
                    .ok_or_else(|| Error::field_not_found(describe_path(segments)))?;
                json_scalar(value).ok_or_else(|| Error::field_not_found(describe_path(segments)))
            }
            Rule::XmlText(element) => {
                if !matches!(doc.parsed, Parsed::Xml(_)) {
                    return Err(Error::parse("XML rule applied to a non-XML document"));
                }
                doc.xml_text(element)
                    .map(str::to_string)
                    .ok_or_else(|| Error::field_not_found(element.as_str()))
            }
        }
    }
}

fn walk_json<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |value, segment| match segment {
        PathSegment::Key(key) => value.get(key.as_str()),
        PathSegment::Index(index) => value.get(*index),
    })
}

/// Strings come back verbatim; numbers and booleans are rendered; null is
/// treated as absent.
pub fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn describe_path(segments: &[PathSegment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            PathSegment::Key(key) => key.clone(),
            PathSegment::Index(index) => index.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Verbatim,
    CleanHtml,
}

/// One canonical field bound to the rule that extracts it.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: Field,
    pub rule: Rule,
    pub transform: Transform,
}

impl FieldRule {
    pub fn new(field: Field, rule: Rule) -> Self {
        Self {
            field,
            rule,
            transform: Transform::Verbatim,
        }
    }

    pub fn cleaned(field: Field, rule: Rule) -> Self {
        Self {
            field,
            rule,
            transform: Transform::CleanHtml,
        }
    }

    pub fn extract(&self, doc: &Document) -> Result<FieldValue> {
        let raw = self.rule.apply(doc)?;
        Ok(match self.transform {
            Transform::Verbatim => FieldValue::Text(raw),
            Transform::CleanHtml => FieldValue::Text(clean_description_html(&raw)),
        })
    }
}

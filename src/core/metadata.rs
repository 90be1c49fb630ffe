use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical field names of a normalized video record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Link,
    Description,
    ThumbnailUrl,
    User,
    UserUrl,
    Tags,
    PublishDatetime,
    EmbedCode,
    FileUrl,
    FileUrlMimetype,
    FileUrlExpires,
    FileUrlIsFlaky,
    FlashEnclosureUrl,
    Guid,
    IsEmbeddable,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Link => "link",
            Field::Description => "description",
            Field::ThumbnailUrl => "thumbnail_url",
            Field::User => "user",
            Field::UserUrl => "user_url",
            Field::Tags => "tags",
            Field::PublishDatetime => "publish_datetime",
            Field::EmbedCode => "embed_code",
            Field::FileUrl => "file_url",
            Field::FileUrlMimetype => "file_url_mimetype",
            Field::FileUrlExpires => "file_url_expires",
            Field::FileUrlIsFlaky => "file_url_is_flaky",
            Field::FlashEnclosureUrl => "flash_enclosure_url",
            Field::Guid => "guid",
            Field::IsEmbeddable => "is_embeddable",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Tags(Vec<String>),
    DateTime(DateTime<Utc>),
    Bool(bool),
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::Tags(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::DateTime(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// A normalized video record.
///
/// A field is present only when some extraction method supplied it. A value
/// that was supplied as empty (or `false`) is still present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct VideoRecord {
    fields: BTreeMap<Field, FieldValue>,
}

impl VideoRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: Field, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: Field, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.fields.insert(field, value.into())
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        match self.fields.get(&field) {
            Some(FieldValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn tags(&self) -> Option<&[String]> {
        match self.fields.get(&Field::Tags) {
            Some(FieldValue::Tags(tags)) => Some(tags),
            _ => None,
        }
    }

    pub fn datetime(&self, field: Field) -> Option<DateTime<Utc>> {
        match self.fields.get(&field) {
            Some(FieldValue::DateTime(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn flag(&self, field: Field) -> Option<bool> {
        match self.fields.get(&field) {
            Some(FieldValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.text(Field::Title)
    }

    pub fn link(&self) -> Option<&str> {
        self.text(Field::Link)
    }

    pub fn description(&self) -> Option<&str> {
        self.text(Field::Description)
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.text(Field::ThumbnailUrl)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.fields.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Folds a later method's output into this record. Every field `later`
    /// supplies overwrites ours; fields it does not supply are left alone.
    pub fn merge(&mut self, later: VideoRecord) {
        self.fields.extend(later.fields);
    }
}

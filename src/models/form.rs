//! Form definitions
//!
//! A form definition is a FHIR-style `Questionnaire`: a tree of question
//! nodes, keyed by `url|version`.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Composite identifier `formURL|version` of one form definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormKey {
    pub form_id: String,
    pub version: String,
}

impl FormKey {
    pub fn new(form_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            form_id: form_id.into(),
            version: version.into(),
        }
    }

    /// Parse a canonical `url|version` reference
    ///
    /// A reference without a version separator yields an empty version.
    pub fn parse(canonical: &str) -> Self {
        match canonical.split_once('|') {
            Some((id, version)) => Self::new(id, version),
            None => Self::new(canonical, ""),
        }
    }
}

impl fmt::Display for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.form_id, self.version)
    }
}

impl Serialize for FormKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A form definition as served by the questionnaire endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormDefinition {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub item: Vec<FormNode>,
}

/// Fields shared by every definition node
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFields {
    #[serde(default)]
    pub link_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub extension: Option<Value>,
    /// Everything else the backend sends (type, required, answerOption, ...)
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// One node of a form definition tree
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawFormItem")]
pub enum FormNode {
    Group {
        fields: ItemFields,
        children: Vec<FormNode>,
    },
    Question {
        fields: ItemFields,
    },
}

impl FormNode {
    pub fn fields(&self) -> &ItemFields {
        match self {
            Self::Group { fields, .. } | Self::Question { fields } => fields,
        }
    }
}

#[derive(Deserialize)]
struct RawFormItem {
    #[serde(flatten)]
    fields: ItemFields,
    #[serde(default)]
    item: Option<Vec<FormNode>>,
}

impl From<RawFormItem> for FormNode {
    fn from(raw: RawFormItem) -> Self {
        match raw.item {
            Some(children) => Self::Group {
                fields: raw.fields,
                children,
            },
            None => Self::Question { fields: raw.fields },
        }
    }
}

/// A definition node pruned to its structural fields, with answers merged in
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Vec<ReconciledItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<Value>,
}

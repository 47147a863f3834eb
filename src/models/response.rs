//! Decrypted response trees
//!
//! Items arrive as FHIR-style `QuestionnaireResponse.item` objects. An item
//! carrying an `item` list is a group; everything else is a leaf answering
//! one question.

use serde::Deserialize;
use serde_json::Value;

/// The decrypted response document
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ResponseDocument {
    /// Canonical reference of the form this response answers (`url|version`)
    #[serde(default)]
    pub questionnaire: Option<String>,
    #[serde(default)]
    pub item: Option<Vec<ResponseNode>>,
}

impl ResponseDocument {
    /// Top-level items, empty when the response has none
    pub fn items(&self) -> &[ResponseNode] {
        self.item.as_deref().unwrap_or_default()
    }
}

/// One node of a response tree
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawResponseItem")]
pub enum ResponseNode {
    Group {
        link_id: Option<String>,
        children: Vec<ResponseNode>,
    },
    Leaf {
        link_id: Option<String>,
        definition: Option<String>,
        /// Raw `answer` value, normally a list of `value[x]` objects
        answer: Option<Value>,
    },
}

impl ResponseNode {
    /// Build a leaf with a list of answer entries
    pub fn leaf(link_id: &str, answers: Vec<Value>) -> Self {
        Self::Leaf {
            link_id: Some(link_id.to_string()),
            definition: None,
            answer: Some(Value::Array(answers)),
        }
    }

    pub fn group(link_id: &str, children: Vec<ResponseNode>) -> Self {
        Self::Group {
            link_id: Some(link_id.to_string()),
            children,
        }
    }

    pub fn link_id(&self) -> Option<&str> {
        match self {
            Self::Group { link_id, .. } | Self::Leaf { link_id, .. } => link_id.as_deref(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResponseItem {
    #[serde(default)]
    link_id: Option<String>,
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    answer: Option<Value>,
    #[serde(default)]
    item: Option<Vec<ResponseNode>>,
}

impl From<RawResponseItem> for ResponseNode {
    fn from(raw: RawResponseItem) -> Self {
        match raw.item {
            Some(children) => Self::Group {
                link_id: raw.link_id,
                children,
            },
            None => Self::Leaf {
                link_id: raw.link_id,
                definition: raw.definition,
                answer: raw.answer,
            },
        }
    }
}

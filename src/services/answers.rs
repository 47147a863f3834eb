//! Answer extraction, reconciliation and flattening
//!
//! Three walks over the trees of one response:
//!
//! - [`extract_answers`] collects the raw answer of every leaf by `linkId`
//! - [`reconcile`] prunes a form definition to its structural fields and
//!   merges those answers in
//! - [`flatten_answers`] turns the response tree into the column/value pairs
//!   of one export row

use serde_json::{Map, Value};
use tracing::error;

use crate::models::{FormNode, ReconciledItem, ResponseNode};

/// Raw answers of one response, keyed by `linkId`, in discovery order
pub type AnswerMap = Map<String, Value>;

/// Collect the raw answer of every leaf in the response tree
///
/// A leaf without an answer maps to an empty string. Later leaves with the
/// same `linkId` overwrite earlier ones.
pub fn extract_answers(items: &[ResponseNode]) -> AnswerMap {
    let mut answers = AnswerMap::new();
    collect_answers(items, &mut answers);
    answers
}

fn collect_answers(items: &[ResponseNode], answers: &mut AnswerMap) {
    for node in items {
        match node {
            ResponseNode::Group { children, .. } => collect_answers(children, answers),
            ResponseNode::Leaf {
                link_id: Some(link_id),
                answer,
                ..
            } => {
                let value = answer.clone().unwrap_or_else(|| Value::String(String::new()));
                answers.insert(link_id.clone(), value);
            }
            ResponseNode::Leaf { link_id: None, .. } => {}
        }
    }
}

/// Prune a form definition and merge a response's answers into it
///
/// Each node keeps only `linkId`, `text`, `definition`, `answer`, `item` and
/// `extension`. Questions take the answer recorded for their `linkId`, or an
/// empty list when there is none.
pub fn reconcile(items: &[FormNode], answers: &AnswerMap) -> Vec<ReconciledItem> {
    items
        .iter()
        .map(|node| {
            let fields = node.fields();
            let mut item = ReconciledItem {
                link_id: fields.link_id.clone(),
                text: fields.text.clone(),
                definition: fields.definition.clone(),
                answer: None,
                item: None,
                extension: fields.extension.clone(),
            };
            match node {
                FormNode::Group { children, .. } => {
                    item.item = Some(reconcile(children, answers));
                }
                FormNode::Question { .. } => {
                    let answer = fields
                        .link_id
                        .as_ref()
                        .and_then(|id| answers.get(id))
                        .filter(|value| is_present(value))
                        .cloned()
                        .unwrap_or_else(|| Value::Array(Vec::new()));
                    item.answer = Some(answer);
                }
            }
            item
        })
        .collect()
}

/// Whether an extracted answer counts as given
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::Bool(true) | Value::Array(_) | Value::Object(_) => true,
    }
}

/// Column/value pairs of one export row, in discovery order
///
/// Inserting an existing column replaces its value but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatAnswers {
    entries: Vec<(String, String)>,
}

impl FlatAnswers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Flatten a response tree into export columns
///
/// A leaf is keyed by its `definition`, falling back to its `linkId`; a leaf
/// with neither is logged and skipped. Its value is every answer entry
/// rendered and quoted, joined with `", "`.
pub fn flatten_answers(items: &[ResponseNode]) -> FlatAnswers {
    let mut flat = FlatAnswers::new();
    flatten_into(items, &mut flat);
    flat
}

fn flatten_into(items: &[ResponseNode], flat: &mut FlatAnswers) {
    for node in items {
        match node {
            ResponseNode::Group { children, .. } => flatten_into(children, flat),
            ResponseNode::Leaf {
                link_id,
                definition,
                answer,
            } => {
                let column = non_empty(definition).or_else(|| non_empty(link_id));
                let Some(column) = column else {
                    error!("Answer item has neither definition nor linkId");
                    continue;
                };
                flat.insert(column, render_answer(answer.as_ref()));
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Render an answer list as `"a", "b"`
pub fn render_answer(answer: Option<&Value>) -> String {
    let Some(Value::Array(entries)) = answer else {
        return String::new();
    };
    entries
        .iter()
        .map(|entry| format!("\"{}\"", entry_text(entry).replace('"', "'")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Text of one answer entry
///
/// An entry is normally an object with a single `value[x]` field; coded
/// values contribute their `code`.
fn entry_text(entry: &Value) -> String {
    let value = match entry {
        Value::Object(fields) => fields
            .iter()
            .find(|(key, v)| key.starts_with("value") && !v.is_null())
            .or_else(|| fields.iter().find(|(_, v)| !v.is_null()))
            .map(|(_, v)| v),
        other => Some(other),
    };

    match value {
        Some(Value::Object(coded)) => coded.get("code").map(scalar_text).unwrap_or_default(),
        Some(other) => scalar_text(other),
        None => String::new(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

//! Form data
//!
//! Collects the entry list of a form the way a browser does on submission,
//! and encodes it for the wire.

use url::form_urlencoded;

use crate::{DomTree, NodeId};

/// Form encoding type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormEnctype {
    #[default]
    UrlEncoded,
    Multipart,
    TextPlain,
}

impl FormEnctype {
    /// Parse an `enctype` attribute. Unknown values fall back to url-encoded.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "multipart/form-data" => Self::Multipart,
            "text/plain" => Self::TextPlain,
            _ => Self::UrlEncoded,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::UrlEncoded => "application/x-www-form-urlencoded",
            Self::Multipart => "multipart/form-data",
            Self::TextPlain => "text/plain",
        }
    }
}

/// Form data for submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    entries: Vec<(String, FormDataValue)>,
}

/// Form data value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormDataValue {
    Text(String),
    File {
        name: String,
        content: Vec<u8>,
        mime_type: String,
    },
}

impl FormData {
    /// Create empty form data
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text value
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .push((name.into(), FormDataValue::Text(value.into())));
    }

    /// Append a file
    pub fn append_file(
        &mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content: Vec<u8>,
        mime_type: impl Into<String>,
    ) {
        self.entries.push((
            name.into(),
            FormDataValue::File {
                name: filename.into(),
                content,
                mime_type: mime_type.into(),
            },
        ));
    }

    /// First text value for a name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find_map(|(n, v)| match v {
            FormDataValue::Text(s) if n == name => Some(s.as_str()),
            _ => None,
        })
    }

    /// All text values for a name
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n == name)
            .filter_map(|(_, v)| match v {
                FormDataValue::Text(s) => Some(s.as_str()),
                FormDataValue::File { .. } => None,
            })
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Delete all entries with name
    pub fn delete(&mut self, name: &str) {
        self.entries.retain(|(n, _)| n != name);
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &FormDataValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Text entries as string pairs; file entries are dropped
    pub fn url_encoded_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|(n, v)| match v {
                FormDataValue::Text(s) => Some((n.clone(), s.clone())),
                FormDataValue::File { .. } => None,
            })
            .collect()
    }

    /// Convert to an `application/x-www-form-urlencoded` string
    pub fn to_url_encoded(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.url_encoded_pairs())
            .finish()
    }

    /// Convert to a `text/plain` body
    pub fn to_text_plain(&self) -> String {
        self.url_encoded_pairs()
            .into_iter()
            .map(|(n, v)| format!("{n}={v}\r\n"))
            .collect()
    }

    /// Build the entry list of `form` as submitted by `submitter`
    pub fn from_form(tree: &DomTree, form: NodeId, submitter: Option<NodeId>) -> Self {
        let mut data = Self::new();
        let controls = tree
            .descendants(NodeId::ROOT)
            .filter(|&el| is_listed_control(tree, el) && form_owner(tree, el) == Some(form));

        for control in controls {
            if is_disabled(tree, control) {
                continue;
            }
            let name = tree.get_attribute(control, "name").unwrap_or_default();
            match tree.tag_name(control).unwrap_or_default() {
                "input" => collect_input(tree, control, name, submitter, &mut data),
                "button" => {
                    let kind = tree
                        .get_attribute(control, "type")
                        .map(str::to_ascii_lowercase);
                    let submits = matches!(kind.as_deref(), None | Some("submit"));
                    if submits && submitter == Some(control) && !name.is_empty() {
                        data.append(name, tree.get_attribute(control, "value").unwrap_or_default());
                    }
                }
                "select" if !name.is_empty() => {
                    for value in selected_options(tree, control) {
                        data.append(name, value);
                    }
                }
                "textarea" if !name.is_empty() => {
                    data.append(name, tree.text_content(control));
                }
                _ => {}
            }
        }
        data
    }
}

fn collect_input(
    tree: &DomTree,
    input: NodeId,
    name: &str,
    submitter: Option<NodeId>,
    data: &mut FormData,
) {
    let kind = tree
        .get_attribute(input, "type")
        .unwrap_or("text")
        .to_ascii_lowercase();
    let value = tree.get_attribute(input, "value");

    match kind.as_str() {
        "image" => {
            if submitter == Some(input) {
                let prefix = if name.is_empty() {
                    String::new()
                } else {
                    format!("{name}.")
                };
                data.append(format!("{prefix}x"), "0");
                data.append(format!("{prefix}y"), "0");
            }
        }
        _ if name.is_empty() => {}
        "checkbox" | "radio" => {
            if tree.has_attribute(input, "checked") {
                data.append(name, value.unwrap_or("on"));
            }
        }
        "submit" => {
            if submitter == Some(input) {
                data.append(name, value.unwrap_or_default());
            }
        }
        "button" | "reset" => {}
        "file" => data.append_file(name, "", Vec::new(), "application/octet-stream"),
        _ => data.append(name, value.unwrap_or_default()),
    }
}

fn selected_options(tree: &DomTree, select: NodeId) -> Vec<String> {
    let options: Vec<NodeId> = tree
        .descendants(select)
        .filter(|&o| tree.is_tag(o, "option") && !tree.has_attribute(o, "disabled"))
        .collect();
    let mut chosen: Vec<NodeId> = options
        .iter()
        .copied()
        .filter(|&o| tree.has_attribute(o, "selected"))
        .collect();
    if chosen.is_empty() && !tree.has_attribute(select, "multiple") {
        chosen.extend(options.first().copied());
    }
    if !tree.has_attribute(select, "multiple") {
        chosen.truncate(1);
    }
    chosen
        .into_iter()
        .map(|o| match tree.get_attribute(o, "value") {
            Some(v) => v.to_string(),
            None => tree
                .text_content(o)
                .split_ascii_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
        })
        .collect()
}

fn is_listed_control(tree: &DomTree, id: NodeId) -> bool {
    matches!(
        tree.tag_name(id),
        Some("input" | "button" | "select" | "textarea")
    )
}

fn is_disabled(tree: &DomTree, control: NodeId) -> bool {
    if tree.has_attribute(control, "disabled") {
        return true;
    }
    let mut cursor = tree.parent(control);
    while let Some(ancestor) = cursor {
        if tree.is_tag(ancestor, "fieldset") && tree.has_attribute(ancestor, "disabled") {
            return true;
        }
        cursor = tree.parent(ancestor);
    }
    false
}

/// The form a control belongs to: the element named by its `form`
/// attribute, otherwise its nearest ancestor form
pub fn form_owner(tree: &DomTree, control: NodeId) -> Option<NodeId> {
    if let Some(form_id) = tree.get_attribute(control, "form") {
        return tree
            .find_element_by_id(NodeId::ROOT, form_id)
            .filter(|&f| tree.is_tag(f, "form"));
    }
    let parent = tree.parent(control)?;
    tree.closest(parent, "form")
}

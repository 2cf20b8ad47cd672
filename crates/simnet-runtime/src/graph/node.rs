//! Pipeline node types.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use super::NodeId;
use crate::content::ContentType;

/// A vertex of the pipeline graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier.
    pub id: NodeId,
    /// Display name, also used to name File node targets.
    #[serde(default)]
    pub name: String,
    /// Declared type of the data this node produces.
    #[serde(default)]
    pub data_type: ContentType,
    /// Role-specific configuration.
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    /// Creates a node with a fresh identifier.
    pub fn new(name: impl Into<String>, kind: impl Into<NodeKind>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            data_type: ContentType::default(),
            kind: kind.into(),
        }
    }

    /// Creates an input node.
    pub fn input(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Input)
    }

    /// Creates a model node.
    pub fn model(name: impl Into<String>, model: ModelNode) -> Self {
        Self::new(name, model)
    }

    /// Creates an output node.
    pub fn output(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Output)
    }

    /// Creates a file node.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::File)
    }

    /// Replaces the node identifier.
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Sets the declared data type.
    pub fn with_data_type(mut self, data_type: ContentType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Returns the role of this node.
    pub fn role(&self) -> NodeRole {
        self.kind.role()
    }

    /// Returns the model configuration, if this is a model node.
    pub fn as_model(&self) -> Option<&ModelNode> {
        match &self.kind {
            NodeKind::Model(model) => Some(model),
            _ => None,
        }
    }

    /// Returns whether this is a model node.
    pub const fn is_model(&self) -> bool {
        matches!(self.kind, NodeKind::Model(_))
    }

    /// Returns whether this is an input node.
    pub const fn is_input(&self) -> bool {
        matches!(self.kind, NodeKind::Input)
    }

    /// Returns whether this is a file node.
    pub const fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File)
    }
}

/// Role-specific node configuration.
///
/// Only model nodes carry configuration; input content comes from the
/// content store and file nodes receive propagated model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Captured data, read per step from the content store.
    Input,
    /// Inference unit.
    Model(ModelNode),
    /// Presentation sink; never a data source.
    Output,
    /// Memory file receiving model output.
    File,
}

impl NodeKind {
    /// Returns the role of this configuration.
    pub const fn role(&self) -> NodeRole {
        match self {
            Self::Input => NodeRole::Input,
            Self::Model(_) => NodeRole::Model,
            Self::Output => NodeRole::Output,
            Self::File => NodeRole::File,
        }
    }
}

impl From<ModelNode> for NodeKind {
    fn from(model: ModelNode) -> Self {
        Self::Model(model)
    }
}

/// Role of a node in the pipeline graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum NodeRole {
    /// Input node.
    Input,
    /// Model node.
    Model,
    /// Output node.
    Output,
    /// File node.
    File,
}

/// Configuration of a model node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelNode {
    /// Number of present inputs required to run; values above one mark an
    /// ensemble node.
    #[serde(default = "default_required_inputs")]
    pub required_inputs: usize,
    /// How multiple inputs are merged.
    #[serde(default)]
    pub combination: CombinationMethod,
    /// Optional classification appended to the combined input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
}

fn default_required_inputs() -> usize {
    1
}

impl Default for ModelNode {
    fn default() -> Self {
        Self {
            required_inputs: default_required_inputs(),
            combination: CombinationMethod::default(),
            classification: None,
        }
    }
}

impl ModelNode {
    /// Creates a single-input model node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an ensemble model node requiring `required_inputs` inputs.
    pub fn ensemble(required_inputs: usize, combination: CombinationMethod) -> Self {
        Self {
            required_inputs,
            combination,
            classification: None,
        }
    }

    /// Sets the classification appended to the combined input.
    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    /// Returns the number of required inputs, never less than one.
    pub fn required_inputs(&self) -> usize {
        self.required_inputs.max(1)
    }

    /// Returns whether this node merges multiple inputs.
    pub fn is_ensemble(&self) -> bool {
        self.required_inputs() > 1
    }
}

/// Policy for merging the inputs of an ensemble node.
///
/// The labeled variants only change the header of the concatenation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CombinationMethod {
    /// Join all values with a blank line.
    #[default]
    Concatenate,
    /// Concatenation labeled as an average.
    AverageLabel,
    /// Concatenation labeled as a vote.
    VoteLabel,
    /// Concatenation labeled as a weighted combination.
    WeightLabel,
}

/// Classification text appended to a model's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Classification label, e.g. `Goal` or `Action`.
    pub label: String,
    /// Current classification text.
    pub text: String,
}

impl Classification {
    /// Creates a new classification.
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }

    /// Appends this classification to `input`, unless label or text is empty.
    pub fn apply(&self, input: String) -> String {
        if self.label.is_empty() || self.text.is_empty() {
            return input;
        }

        format!("{input}\n\n{}: {}", self.label, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_inputs_clamped() {
        let model = ModelNode::ensemble(0, CombinationMethod::Concatenate);
        assert_eq!(model.required_inputs(), 1);
        assert!(!model.is_ensemble());
        assert!(ModelNode::ensemble(3, CombinationMethod::VoteLabel).is_ensemble());
    }

    #[test]
    fn test_node_roles() {
        assert_eq!(Node::input("camera").role(), NodeRole::Input);
        assert_eq!(Node::model("gpt", ModelNode::new()).role(), NodeRole::Model);
        assert_eq!(Node::file("goals").role().as_ref(), "file");
    }

    #[test]
    fn test_classification_suffix() {
        let classification = Classification::new("Goal", "open the editor");
        assert_eq!(
            classification.apply("screen text".into()),
            "screen text\n\nGoal: open the editor"
        );
        assert_eq!(Classification::new("Goal", "").apply("x".into()), "x");
    }

    #[test]
    fn test_node_deserializes_with_defaults() {
        let json = serde_json::json!({
            "id": NodeId::new(),
            "name": "summarizer",
            "kind": "model",
        });

        let node: Node = serde_json::from_value(json).unwrap();
        let model = node.as_model().unwrap();
        assert_eq!(model.required_inputs(), 1);
        assert_eq!(model.combination, CombinationMethod::Concatenate);
        assert_eq!(node.data_type, ContentType::Unknown);
    }

    #[test]
    fn test_combination_method_parses() {
        assert_eq!(
            "vote_label".parse::<CombinationMethod>().unwrap(),
            CombinationMethod::VoteLabel
        );
    }
}

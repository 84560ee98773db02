//! Node and relationship types for the medical knowledge graph.
//!
//! The graph vocabulary is closed: four node labels and three relationship
//! types, all of which originate at a `Disease` node. Relationship types are
//! stored lowercase, exactly as the query-generation prompt instructs the
//! model to write them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The label of a node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    /// An illness; the source of every relationship.
    Disease,
    /// Something a patient experiences or presents with.
    Symptom,
    /// A therapy, drug, or intervention.
    Treatment,
    /// An origin or risk factor of a disease.
    Cause,
}

impl NodeLabel {
    /// All labels, in schema order.
    pub const ALL: [NodeLabel; 4] = [
        NodeLabel::Disease,
        NodeLabel::Symptom,
        NodeLabel::Treatment,
        NodeLabel::Cause,
    ];

    /// Returns the label as written in Cypher (`Disease`, `Symptom`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Disease => "Disease",
            NodeLabel::Symptom => "Symptom",
            NodeLabel::Treatment => "Treatment",
            NodeLabel::Cause => "Cause",
        }
    }

    /// Returns the lowercase prefix used in node IDs.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            NodeLabel::Disease => "disease",
            NodeLabel::Symptom => "symptom",
            NodeLabel::Treatment => "treatment",
            NodeLabel::Cause => "cause",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relationship type between a disease and one of its attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// `(:Disease)-[:has_symptom]->(:Symptom)`
    HasSymptom,
    /// `(:Disease)-[:treated_with]->(:Treatment)`
    TreatedWith,
    /// `(:Disease)-[:caused_by]->(:Cause)`
    CausedBy,
}

impl Relation {
    /// All relations in their fixed order: symptom, treatment, cause.
    pub const ALL: [Relation; 3] = [
        Relation::HasSymptom,
        Relation::TreatedWith,
        Relation::CausedBy,
    ];

    /// Returns the relationship type as stored and queried.
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::HasSymptom => "has_symptom",
            Relation::TreatedWith => "treated_with",
            Relation::CausedBy => "caused_by",
        }
    }

    /// Label of the node this relation points to.
    pub fn target_label(&self) -> NodeLabel {
        match self {
            Relation::HasSymptom => NodeLabel::Symptom,
            Relation::TreatedWith => NodeLabel::Treatment,
            Relation::CausedBy => NodeLabel::Cause,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Relation::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("Unknown relation: {}", s))
    }
}

/// A labeled, named node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub label: NodeLabel,
    pub name: String,
}

impl Node {
    pub fn new(label: NodeLabel, name: impl Into<String>) -> Self {
        Self {
            label,
            name: name.into(),
        }
    }

    pub fn disease(name: impl Into<String>) -> Self {
        Self::new(NodeLabel::Disease, name)
    }

    /// Stable node ID, e.g. `disease:flu`.
    ///
    /// Names are trimmed and lowercased so that `Flu` and `flu ` collapse
    /// into the same node.
    pub fn id(&self) -> String {
        format!(
            "{}:{}",
            self.label.id_prefix(),
            self.name.trim().to_lowercase()
        )
    }
}

/// A directed relationship from a disease to one of its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub disease: String,
    pub relation: Relation,
    pub target: String,
}

impl Relationship {
    pub fn new(disease: impl Into<String>, relation: Relation, target: impl Into<String>) -> Self {
        Self {
            disease: disease.into(),
            relation,
            target: target.into(),
        }
    }

    /// Source node (always a disease).
    pub fn source_node(&self) -> Node {
        Node::disease(self.disease.clone())
    }

    /// Target node, labeled by the relation.
    pub fn target_node(&self) -> Node {
        Node::new(self.relation.target_label(), self.target.clone())
    }
}

/// One disease with its attributes, the unit of bulk loading.
///
/// On disk a dataset is a JSON array of these records:
///
/// ```json
/// [{"name": "Flu", "symptoms": ["Fever"], "treatments": ["Rest"], "causes": ["Influenza virus"]}]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseRecord {
    pub name: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub treatments: Vec<String>,
    #[serde(default)]
    pub causes: Vec<String>,
}

impl DiseaseRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_symptom(mut self, symptom: impl Into<String>) -> Self {
        self.symptoms.push(symptom.into());
        self
    }

    pub fn with_treatment(mut self, treatment: impl Into<String>) -> Self {
        self.treatments.push(treatment.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Attribute values for a relation.
    pub fn targets(&self, relation: Relation) -> &[String] {
        match relation {
            Relation::HasSymptom => &self.symptoms,
            Relation::TreatedWith => &self.treatments,
            Relation::CausedBy => &self.causes,
        }
    }

    /// All relationships described by this record, in symptom, treatment, cause order.
    pub fn relationships(&self) -> Vec<Relationship> {
        Relation::ALL
            .into_iter()
            .flat_map(|relation| {
                self.targets(relation)
                    .iter()
                    .map(move |target| Relationship::new(self.name.clone(), relation, target))
            })
            .collect()
    }
}

//! Textual schema description handed to the query-generation prompt.

use crate::model::{NodeLabel, Relation};

/// Describe the graph schema in the layout Cypher-generating models expect.
///
/// ```text
/// Node properties:
/// Disease {name: STRING}
/// ...
/// The relationships:
/// (:Disease)-[:has_symptom]->(:Symptom)
/// ...
/// ```
pub fn schema_text() -> String {
    let mut out = String::from("Node properties:\n");
    for label in NodeLabel::ALL {
        out.push_str(&format!("{} {{name: STRING}}\n", label));
    }

    out.push_str("Relationship properties:\n");
    out.push_str("(none)\n");

    out.push_str("The relationships:\n");
    for relation in Relation::ALL {
        out.push_str(&format!(
            "(:{})-[:{}]->(:{})\n",
            NodeLabel::Disease,
            relation,
            relation.target_label()
        ));
    }

    out
}

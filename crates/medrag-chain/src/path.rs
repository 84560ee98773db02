//! Graph-path synthesis from raw query rows.
//!
//! Rows come back from the chain as JSON objects keyed by column name. A row
//! may name its columns either after the node label (`Disease`, `Symptom`)
//! or after the Cypher projection (`d.name`, `s.name`); both spellings are
//! accepted. Entries are illustrative: depth and score are fixed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use medrag_graph::{NodeLabel, Relation};

/// Disease name used when a row names none.
pub const UNKNOWN_DISEASE: &str = "Unknown Disease";

/// Attribute name used when an attribute column is present but every candidate is empty.
pub const UNKNOWN_ATTRIBUTE: &str = "Unknown";

const PATH_DEPTH: u32 = 1;
const PATH_SCORE: f64 = 1.0;

const DISEASE_KEYS: [&str; 2] = ["Disease", "d.name"];

/// One synthesized edge from a disease to one of its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPathEntry {
    /// Source node, rendered as `"Disease: <name>"`.
    pub node: String,
    pub relation: Relation,
    /// Target node, rendered as `"<Label>: <name>"`.
    pub next_node: String,
    pub depth: u32,
    pub score: f64,
}

impl GraphPathEntry {
    fn new(disease: &str, relation: Relation, target: &str) -> Self {
        Self {
            node: format!("{}: {}", NodeLabel::Disease, disease),
            relation,
            next_node: format!("{}: {}", relation.target_label(), target),
            depth: PATH_DEPTH,
            score: PATH_SCORE,
        }
    }
}

/// Whether a value counts as empty: null, false, zero, `""`, `[]` or `{}`.
pub(crate) fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Return the value of the first key in `keys` whose value is not empty.
///
/// Missing keys and empty values fall through to the next key.
pub fn lookup_first<'a>(
    row: &'a serde_json::Map<String, Value>,
    keys: &[&str],
) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| row.get(*key))
        .find(|value| !is_empty_value(value))
}

/// Candidate keys for the target of `relation`, label spelling first.
fn attribute_keys(relation: Relation) -> [&'static str; 2] {
    match relation {
        Relation::HasSymptom => ["Symptom", "s.name"],
        Relation::TreatedWith => ["Treatment", "t.name"],
        Relation::CausedBy => ["Cause", "c.name"],
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Path entries for one row, in symptom, treatment, cause order.
///
/// An attribute yields an entry whenever one of its columns is present,
/// even if the value is null.
pub fn path_from_row(row: &serde_json::Map<String, Value>) -> Vec<GraphPathEntry> {
    let disease = lookup_first(row, &DISEASE_KEYS)
        .map(display_value)
        .unwrap_or_else(|| UNKNOWN_DISEASE.to_string());

    Relation::ALL
        .iter()
        .filter_map(|&relation| {
            let keys = attribute_keys(relation);
            if !keys.iter().any(|key| row.contains_key(*key)) {
                return None;
            }
            let target = lookup_first(row, &keys)
                .map(display_value)
                .unwrap_or_else(|| UNKNOWN_ATTRIBUTE.to_string());
            Some(GraphPathEntry::new(&disease, relation, &target))
        })
        .collect()
}

/// Path entries for every row, preserving row order. Non-object rows are skipped.
pub fn synthesize_path(rows: &[Value]) -> Vec<GraphPathEntry> {
    rows.iter()
        .filter_map(Value::as_object)
        .flat_map(path_from_row)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_lookup_first_order() {
        let r = row(json!({"d.name": "Cold", "Disease": "Flu"}));
        assert_eq!(lookup_first(&r, &["Disease", "d.name"]), Some(&json!("Flu")));
        assert_eq!(lookup_first(&r, &["d.name", "Disease"]), Some(&json!("Cold")));
        assert_eq!(lookup_first(&r, &["x"]), None);
    }

    #[test]
    fn test_lookup_first_skips_null() {
        let r = row(json!({"Disease": null, "d.name": "Flu"}));
        assert_eq!(lookup_first(&r, &DISEASE_KEYS), Some(&json!("Flu")));

        let r = row(json!({"Symptom": null}));
        assert_eq!(lookup_first(&r, &["Symptom", "s.name"]), None);
    }

    #[test]
    fn test_lookup_first_skips_empty_values() {
        let r = row(json!({"Disease": "", "d.name": "Flu"}));
        assert_eq!(lookup_first(&r, &DISEASE_KEYS), Some(&json!("Flu")));

        let r = row(json!({"Symptom": [], "s.name": 0}));
        assert_eq!(lookup_first(&r, &["Symptom", "s.name"]), None);
    }

    #[test]
    fn test_empty_disease_falls_through_to_dotted_key() {
        let path = synthesize_path(&[json!({"Disease": "", "d.name": "Flu", "Symptom": "Fever"})]);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].node, "Disease: Flu");

        let path = synthesize_path(&[json!({"Disease": "", "Symptom": "Fever"})]);
        assert_eq!(path[0].node, "Disease: Unknown Disease");
    }

    #[test]
    fn test_empty_attribute_falls_through_to_dotted_key() {
        let path = synthesize_path(&[json!({"Disease": "Flu", "Symptom": "", "s.name": "Fever"})]);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].next_node, "Symptom: Fever");
    }

    #[test]
    fn test_present_null_attribute_still_yields_entry() {
        // OPTIONAL MATCH misses come back as a present column holding null
        let path = synthesize_path(&[json!({"Disease": "Flu", "Symptom": null})]);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].node, "Disease: Flu");
        assert_eq!(path[0].relation, Relation::HasSymptom);
        assert_eq!(path[0].next_node, "Symptom: Unknown");

        let path = synthesize_path(&[json!({"d.name": "Flu", "t.name": null, "c.name": "Virus"})]);
        let targets: Vec<&str> = path.iter().map(|e| e.next_node.as_str()).collect();
        assert_eq!(targets, vec!["Treatment: Unknown", "Cause: Virus"]);
    }

    #[test]
    fn test_single_symptom_row() {
        let path = synthesize_path(&[json!({"Disease": "Flu", "Symptom": "Fever"})]);
        assert_eq!(
            serde_json::to_value(&path).unwrap(),
            json!([{
                "node": "Disease: Flu",
                "relation": "has_symptom",
                "next_node": "Symptom: Fever",
                "depth": 1,
                "score": 1.0
            }])
        );
    }

    #[test]
    fn test_dotted_aliases_and_attribute_order() {
        let path = synthesize_path(&[json!({
            "c.name": "Virus",
            "t.name": "Rest",
            "d.name": "Flu",
            "s.name": "Cough"
        })]);

        let relations: Vec<Relation> = path.iter().map(|e| e.relation).collect();
        assert_eq!(
            relations,
            vec![Relation::HasSymptom, Relation::TreatedWith, Relation::CausedBy]
        );
        assert_eq!(path[0].node, "Disease: Flu");
        assert_eq!(path[1].next_node, "Treatment: Rest");
        assert_eq!(path[2].next_node, "Cause: Virus");
    }

    #[test]
    fn test_unknown_disease() {
        let path = synthesize_path(&[json!({"Cause": "Virus"})]);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].node, "Disease: Unknown Disease");
        assert_eq!(path[0].relation, Relation::CausedBy);
    }

    #[test]
    fn test_rows_without_attributes() {
        assert!(synthesize_path(&[json!({"d.name": "Flu"})]).is_empty());
        assert!(synthesize_path(&[]).is_empty());
    }

    #[test]
    fn test_non_object_rows_skipped() {
        let path = synthesize_path(&[
            json!("Flu"),
            json!(["Flu", "Fever"]),
            json!({"Disease": "Cold", "Symptom": "Sneezing"}),
        ]);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].node, "Disease: Cold");
    }

    #[test]
    fn test_non_string_values_render_as_json() {
        let path = synthesize_path(&[json!({"Disease": 42, "Symptom": true})]);
        assert_eq!(path[0].node, "Disease: 42");
        assert_eq!(path[0].next_node, "Symptom: true");
    }

    #[test]
    fn test_row_order_preserved() {
        let path = synthesize_path(&[
            json!({"Disease": "Flu", "Symptom": "Fever"}),
            json!({"Disease": "Cold", "Symptom": "Cough"}),
        ]);
        assert_eq!(path[0].node, "Disease: Flu");
        assert_eq!(path[1].node, "Disease: Cold");
    }
}

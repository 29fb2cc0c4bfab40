//! The lineage manifest document.
//!
//! Hosts that orchestrate many models exchange lineage as a JSON document:
//! one entry per model, one entry per output column carrying its formula
//! and upstream `{model, columns}` pairs. The engine fills the per-model
//! entries from [`ColumnTraces`]; naming upstream models is the host's
//! concern, so `from_traces` takes a naming function (the default renders
//! the relation path).

use crate::lineage::ColumnTraces;
use crate::relation::Relation;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The full manifest: lineage for a set of models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Manifest {
    pub models: Vec<ModelLineage>,
}

/// Column lineage of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelLineage {
    pub name: String,
    pub columns: Vec<ColumnEntry>,
}

/// One output column: its reconstructed formula and its upstream columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

/// Columns consumed from one upstream model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceEntry {
    pub name: String,
    pub columns: Vec<String>,
}

impl ModelLineage {
    /// Builds a model entry from resolved traces. `model_name` maps each
    /// input relation to the host's identifier for it.
    pub fn from_traces(
        name: impl Into<String>,
        traces: &ColumnTraces,
        mut model_name: impl FnMut(&Relation) -> String,
    ) -> Self {
        let columns = traces
            .iter()
            .map(|(column, trace)| ColumnEntry {
                name: column.clone(),
                formula: Some(trace.formula.clone()),
                sources: trace
                    .lineage
                    .iter()
                    .map(|(relation, columns)| SourceEntry {
                        name: model_name(relation),
                        columns: columns.clone(),
                    })
                    .collect(),
            })
            .collect();

        ModelLineage {
            name: name.into(),
            columns,
        }
    }

    /// `from_traces` with relations named by their path.
    pub fn from_traces_with_paths(name: impl Into<String>, traces: &ColumnTraces) -> Self {
        Self::from_traces(name, traces, |relation| relation.path.to_string())
    }
}

impl Manifest {
    pub fn new(models: Vec<ModelLineage>) -> Self {
        Manifest { models }
    }

    pub fn to_json_string(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::Path;
    use crate::resolve_column_traces;

    #[test]
    fn renders_the_manifest_shape() {
        let t = Relation::new(Path::from_parts(&["analytics", "t"]).unwrap(), ["x"]);
        let traces =
            resolve_column_traces("SELECT x AS y FROM analytics.t", &[t]).expect("traces");

        let manifest = Manifest::new(vec![ModelLineage::from_traces_with_paths(
            "model.demo.out",
            &traces,
        )]);

        let json = manifest.to_json_string(false).expect("serialize");
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");

        assert_eq!(value["models"][0]["name"], "model.demo.out");
        assert_eq!(value["models"][0]["columns"][0]["name"], "y");
        assert_eq!(value["models"][0]["columns"][0]["formula"], "x");
        assert_eq!(
            value["models"][0]["columns"][0]["sources"][0]["name"],
            "analytics.t"
        );
        assert_eq!(
            value["models"][0]["columns"][0]["sources"][0]["columns"][0],
            "x"
        );
    }

    #[test]
    fn roundtrips_through_serde() {
        let manifest = Manifest::new(vec![ModelLineage {
            name: "m".to_string(),
            columns: vec![ColumnEntry {
                name: "c".to_string(),
                formula: None,
                sources: Vec::new(),
            }],
        }]);

        let json = manifest.to_json_string(true).expect("serialize");
        let parsed: Manifest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, manifest);
    }
}

//! Decision table editor JSON to DMN 1.1 XML.
//!
//! ```text
//! {
//!   "hitIndicator": "FIRST",
//!   "inputExpressions":  [{"id": "in1", "label": "Age", "variableId": "age", "type": "number"}],
//!   "outputExpressions": [{"id": "out1", "label": "Risk", "variableId": "risk", "type": "string"}],
//!   "rules": [{"in1": "< 18", "out1": "\"high\""}]
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::bpmn::{node_text, XmlOut};
use crate::error::ModelError;
use crate::model::Model;

const DMN_NS: &str = "http://www.omg.org/spec/DMN/20151101";
const ACTIVITI_DMN_NS: &str = "http://activiti.org/dmn";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionTableJson {
    #[serde(default)]
    hit_indicator: Option<String>,
    #[serde(default)]
    input_expressions: Vec<ClauseJson>,
    #[serde(default)]
    output_expressions: Vec<ClauseJson>,
    #[serde(default)]
    rules: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClauseJson {
    id: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    variable_id: Option<String>,
    #[serde(default, rename = "type")]
    type_ref: Option<String>,
}

/// Serialize a decision table model. The decision id is the model key.
pub fn to_dmn_xml(decision_table: &Model) -> Result<Vec<u8>, ModelError> {
    let table: DecisionTableJson = match decision_table.editor_json_or_null() {
        Value::Null => DecisionTableJson::default(),
        json => serde_json::from_value(json.clone())
            .map_err(|e| ModelError::serde(format!("decision table {}", decision_table.key), e))?,
    };

    let key = decision_table.key.as_str();
    let definition_id = format!("definition_{}", key);
    let table_id = format!("decisionTable_{}", key);
    let hit_policy = table.hit_indicator.as_deref().unwrap_or("FIRST");

    let mut out = XmlOut::new()?;
    out.start(
        "definitions",
        &[
            ("xmlns", DMN_NS),
            ("id", &definition_id),
            ("name", &decision_table.name),
            ("namespace", ACTIVITI_DMN_NS),
        ],
    )?;
    out.start("decision", &[("id", key), ("name", &decision_table.name)])?;
    out.start("decisionTable", &[("id", &table_id), ("hitPolicy", hit_policy)])?;

    for input in &table.input_expressions {
        let clause_id = format!("inputClause_{}", input.id);
        let expression_id = format!("inputExpression_{}", input.id);
        out.start(
            "input",
            &[("id", &clause_id), ("label", input.label.as_deref().unwrap_or(""))],
        )?;
        out.start(
            "inputExpression",
            &[
                ("id", &expression_id),
                ("typeRef", input.type_ref.as_deref().unwrap_or("string")),
            ],
        )?;
        out.text_element("text", &[], input.variable_id.as_deref().unwrap_or(""))?;
        out.end("inputExpression")?;
        out.end("input")?;
    }
    for output in &table.output_expressions {
        let clause_id = format!("outputClause_{}", output.id);
        out.empty(
            "output",
            &[
                ("id", &clause_id),
                ("label", output.label.as_deref().unwrap_or("")),
                ("name", output.variable_id.as_deref().unwrap_or("")),
                ("typeRef", output.type_ref.as_deref().unwrap_or("string")),
            ],
        )?;
    }

    for (i, rule) in table.rules.iter().enumerate() {
        out.start("rule", &[])?;
        for input in &table.input_expressions {
            let entry_id = format!("inputEntry_{}_{}", input.id, i);
            let text = node_text(Some(rule), &input.id).unwrap_or_else(|| "-".to_string());
            out.start("inputEntry", &[("id", &entry_id)])?;
            out.text_element("text", &[], &text)?;
            out.end("inputEntry")?;
        }
        for output in &table.output_expressions {
            let entry_id = format!("outputEntry_{}_{}", output.id, i);
            let text = node_text(Some(rule), &output.id).unwrap_or_default();
            out.start("outputEntry", &[("id", &entry_id)])?;
            out.text_element("text", &[], &text)?;
            out.end("outputEntry")?;
        }
        out.end("rule")?;
    }

    out.end("decisionTable")?;
    out.end("decision")?;
    out.end("definitions")?;
    Ok(out.finish())
}

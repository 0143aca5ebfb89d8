//! BPMN process graphs built from editor JSON.
//!
//! The editor stores diagrams as nested `childShapes` (each with a `stencil`,
//! `properties`, `outgoing` links and a `resourceId`). [`convert_to_bpmn`]
//! turns that into a [`BpmnModel`], [`to_bpmn_xml`] serializes the model as
//! BPMN 2.0 XML with the activiti extension attributes the runtime expects.

mod json;
mod xml;

pub use json::{convert_to_bpmn, decision_table_reference_ids, form_reference_ids};
pub(crate) use json::node_text;
pub(crate) use xml::XmlOut;
pub use xml::to_bpmn_xml;

use std::collections::HashMap;

use thiserror::Error;

use crate::error::ModelError;
use crate::model::Model;

/// Implementation class of the service tasks behind the `ClanTask` stencil.
pub const CLAN_TASK_CLASS: &str = "ch.claninfo.activiti.BoMethod";

/// Conversion failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BpmnError {
    #[error("invalid editor json: {0}")]
    InvalidJson(String),

    /// A form or decision table reference could not be mapped to a key.
    #[error("unresolved {kind} reference {id}")]
    UnresolvedReference { kind: &'static str, id: String },

    #[error("bpmn xml error: {0}")]
    Xml(String),
}

impl From<BpmnError> for ModelError {
    fn from(e: BpmnError) -> Self {
        match e {
            BpmnError::Xml(msg) => ModelError::Xml(msg),
            other => ModelError::Serde(other.to_string()),
        }
    }
}

/// Model id to model key maps for referenced forms and decision tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceKeys {
    pub forms: HashMap<String, String>,
    pub decision_tables: HashMap<String, String>,
}

impl ReferenceKeys {
    pub fn from_models<'a>(
        forms: impl IntoIterator<Item = &'a Model>,
        decision_tables: impl IntoIterator<Item = &'a Model>,
    ) -> Self {
        Self {
            forms: keyed(forms),
            decision_tables: keyed(decision_tables),
        }
    }
}

fn keyed<'a>(models: impl IntoIterator<Item = &'a Model>) -> HashMap<String, String> {
    models
        .into_iter()
        .filter_map(|m| m.id.clone().map(|id| (id, m.key.clone())))
        .collect()
}

/// A set of processes, as deployed from one `.bpmn` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BpmnModel {
    pub target_namespace: String,
    pub processes: Vec<Process>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Process {
    pub id: String,
    pub name: Option<String>,
    pub documentation: Option<String>,
    pub executable: bool,
    pub nodes: Vec<FlowNode>,
    pub flows: Vec<SequenceFlow>,
}

impl Process {
    /// The first start event without an event definition.
    pub fn none_start_event_mut(&mut self) -> Option<&mut StartEvent> {
        self.nodes.iter_mut().find_map(|node| match &mut node.kind {
            NodeKind::StartEvent(start) if start.definition.is_none() => Some(start),
            _ => None,
        })
    }
}

/// Any activity, event or gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowNode {
    pub id: String,
    pub name: Option<String>,
    pub documentation: Option<String>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    StartEvent(StartEvent),
    EndEvent,
    UserTask(UserTask),
    ServiceTask(ServiceTask),
    ScriptTask(ScriptTask),
    Gateway(Gateway),
    SubProcess(SubProcess),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartEvent {
    pub initiator: Option<String>,
    pub form_key: Option<String>,
    pub definition: Option<EventDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventDefinition {
    Timer(TimerDefinition),
    Message(String),
    Signal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimerDefinition {
    Date(String),
    Cycle(String),
    Duration(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserTask {
    pub assignee: Option<String>,
    pub candidate_users: Vec<String>,
    pub candidate_groups: Vec<String>,
    pub form_key: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Implementation {
    Class(String),
    Expression(String),
    DelegateExpression(String),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceTask {
    /// `activiti:type`, e.g. `dmn` for decision tasks.
    pub task_type: Option<String>,
    pub implementation: Implementation,
    pub fields: Vec<FieldExtension>,
    pub result_variable: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExtension {
    pub name: String,
    pub string_value: Option<String>,
    pub expression: Option<String>,
}

impl FieldExtension {
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            string_value: Some(value.into()),
            expression: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptTask {
    pub format: String,
    pub script: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    Exclusive,
    Parallel,
    Inclusive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gateway {
    pub kind: GatewayKind,
    pub default_flow: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubProcess {
    pub nodes: Vec<FlowNode>,
    pub flows: Vec<SequenceFlow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceFlow {
    pub id: String,
    pub name: Option<String>,
    pub source_ref: String,
    pub target_ref: String,
    pub condition: Option<String>,
}

/// Visit every user task of `nodes`, descending into sub-processes.
pub fn for_each_user_task(nodes: &mut [FlowNode], f: &mut dyn FnMut(&mut UserTask)) {
    for node in nodes {
        match &mut node.kind {
            NodeKind::UserTask(task) => f(task),
            NodeKind::SubProcess(sub) => for_each_user_task(&mut sub.nodes, f),
            _ => {}
        }
    }
}

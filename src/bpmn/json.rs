//! Editor JSON to [`BpmnModel`].

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use super::{
    BpmnError, BpmnModel, EventDefinition, FieldExtension, FlowNode, Gateway, GatewayKind,
    Implementation, NodeKind, Process, ReferenceKeys, ScriptTask, SequenceFlow, ServiceTask,
    StartEvent, SubProcess, TimerDefinition, UserTask, CLAN_TASK_CLASS,
};

const DEFAULT_NAMESPACE: &str = "http://www.activiti.org/processdef";

/// Text of a JSON member. Missing, `null` and empty values count as absent.
pub(crate) fn node_text(node: Option<&Value>, name: &str) -> Option<String> {
    match node?.get(name)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn child_shapes(node: &Value) -> &[Value] {
    node.get("childShapes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn stencil(shape: &Value) -> Option<&str> {
    shape.get("stencil")?.get("id")?.as_str()
}

fn visit_shapes<'a>(node: &'a Value, f: &mut dyn FnMut(&'a Value)) {
    for shape in child_shapes(node) {
        f(shape);
        visit_shapes(shape, f);
    }
}

fn reference_ids(editor_json: &Value, property: &str) -> Vec<String> {
    let mut ids = Vec::new();
    visit_shapes(editor_json, &mut |shape| {
        let id = shape
            .get("properties")
            .and_then(|p| p.get(property))
            .and_then(|r| node_text(Some(r), "id"));
        if let Some(id) = id {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    });
    ids
}

/// Ids of the forms a diagram references, in diagram order.
pub fn form_reference_ids(editor_json: &Value) -> Vec<String> {
    reference_ids(editor_json, "formreference")
}

/// Ids of the decision tables a diagram references, in diagram order.
pub fn decision_table_reference_ids(editor_json: &Value) -> Vec<String> {
    reference_ids(editor_json, "decisiontaskdecisiontablereference")
}

/// Convert a process diagram. Unknown stencils are skipped with a warning.
pub fn convert_to_bpmn(editor_json: &Value, refs: &ReferenceKeys) -> Result<BpmnModel, BpmnError> {
    if !editor_json.is_object() {
        return Err(BpmnError::InvalidJson("diagram is not an object".into()));
    }
    let props = editor_json.get("properties");

    let mut converter = Converter {
        refs,
        ids: HashMap::new(),
        sources: HashMap::new(),
    };
    visit_shapes(editor_json, &mut |shape| converter.index(shape));

    let (nodes, flows) = converter.container(child_shapes(editor_json))?;
    let process = Process {
        id: node_text(props, "process_id").unwrap_or_else(|| "process".to_string()),
        name: node_text(props, "name"),
        documentation: node_text(props, "documentation"),
        executable: !matches!(
            node_text(props, "process_executable").as_deref(),
            Some("No") | Some("false")
        ),
        nodes,
        flows,
    };

    Ok(BpmnModel {
        target_namespace: node_text(props, "process_namespace")
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        processes: vec![process],
    })
}

struct Converter<'a> {
    refs: &'a ReferenceKeys,
    /// resourceId to element id
    ids: HashMap<String, String>,
    /// sequence flow resourceId to the element id of its source
    sources: HashMap<String, String>,
}

impl Converter<'_> {
    fn index(&mut self, shape: &Value) {
        let Some(resource_id) = node_text(Some(shape), "resourceId") else { return };
        let id = element_id(shape).unwrap_or_else(|| resource_id.clone());

        if stencil(shape) != Some("SequenceFlow") {
            let outgoing = shape.get("outgoing").and_then(Value::as_array);
            for link in outgoing.into_iter().flatten() {
                if let Some(flow) = node_text(Some(link), "resourceId") {
                    self.sources.insert(flow, id.clone());
                }
            }
        }
        self.ids.insert(resource_id, id);
    }

    fn container(&self, shapes: &[Value]) -> Result<(Vec<FlowNode>, Vec<SequenceFlow>), BpmnError> {
        let mut nodes = Vec::new();
        let mut flows = Vec::new();
        let mut default_flows = Vec::new();

        for shape in shapes {
            match stencil(shape) {
                Some("SequenceFlow") => {
                    let (flow, is_default) = self.sequence_flow(shape)?;
                    if is_default {
                        default_flows.push((flow.source_ref.clone(), flow.id.clone()));
                    }
                    flows.push(flow);
                }
                Some("Pool") | Some("Lane") => {
                    let (inner_nodes, inner_flows) = self.container(child_shapes(shape))?;
                    nodes.extend(inner_nodes);
                    flows.extend(inner_flows);
                }
                Some(stencil_id) => match self.node(stencil_id, shape)? {
                    Some(node) => nodes.push(node),
                    None => warn!(stencil = stencil_id, "skipping unsupported stencil"),
                },
                None => warn!("skipping shape without stencil"),
            }
        }

        for (source, flow) in default_flows {
            for node in nodes.iter_mut().filter(|n| n.id == source) {
                if let NodeKind::Gateway(gateway) = &mut node.kind {
                    gateway.default_flow = Some(flow.clone());
                }
            }
        }
        Ok((nodes, flows))
    }

    fn sequence_flow(&self, shape: &Value) -> Result<(SequenceFlow, bool), BpmnError> {
        let props = shape.get("properties");
        let resource_id = node_text(Some(shape), "resourceId")
            .ok_or_else(|| BpmnError::InvalidJson("sequence flow without resourceId".into()))?;
        let id = element_id(shape).unwrap_or_else(|| resource_id.clone());

        let source_ref = self
            .sources
            .get(&resource_id)
            .cloned()
            .ok_or_else(|| BpmnError::InvalidJson(format!("sequence flow {} has no source", id)))?;
        let target = shape
            .get("target")
            .and_then(|t| node_text(Some(t), "resourceId"))
            .or_else(|| {
                shape
                    .get("outgoing")
                    .and_then(|o| o.get(0))
                    .and_then(|o| node_text(Some(o), "resourceId"))
            })
            .ok_or_else(|| BpmnError::InvalidJson(format!("sequence flow {} has no target", id)))?;
        let target_ref = self
            .ids
            .get(&target)
            .cloned()
            .ok_or_else(|| BpmnError::InvalidJson(format!("unknown target {} of {}", target, id)))?;

        let condition = props.and_then(|p| p.get("conditionsequenceflow")).and_then(|c| match c {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Object(_) => c
                .get("expression")
                .and_then(|e| node_text(Some(e), "staticValue")),
            _ => None,
        });
        let is_default = matches!(
            props.and_then(|p| p.get("defaultflow")),
            Some(Value::Bool(true))
        ) || node_text(props, "defaultflow").as_deref() == Some("true");

        Ok((
            SequenceFlow {
                id,
                name: node_text(props, "name"),
                source_ref,
                target_ref,
                condition,
            },
            is_default,
        ))
    }

    fn node(&self, stencil_id: &str, shape: &Value) -> Result<Option<FlowNode>, BpmnError> {
        let props = shape.get("properties");
        let kind = match stencil_id {
            "StartNoneEvent" => NodeKind::StartEvent(StartEvent {
                initiator: node_text(props, "initiator"),
                form_key: self.form_key(props)?,
                definition: None,
            }),
            "StartTimerEvent" => {
                let timer = if let Some(date) = node_text(props, "timerdatedefinition") {
                    TimerDefinition::Date(date)
                } else if let Some(cycle) = node_text(props, "timercycledefinition") {
                    TimerDefinition::Cycle(cycle)
                } else {
                    TimerDefinition::Duration(
                        node_text(props, "timerdurationdefinition").unwrap_or_default(),
                    )
                };
                NodeKind::StartEvent(StartEvent {
                    definition: Some(EventDefinition::Timer(timer)),
                    ..StartEvent::default()
                })
            }
            "StartMessageEvent" => NodeKind::StartEvent(StartEvent {
                definition: Some(EventDefinition::Message(
                    node_text(props, "messageref").unwrap_or_default(),
                )),
                ..StartEvent::default()
            }),
            "StartSignalEvent" => NodeKind::StartEvent(StartEvent {
                definition: Some(EventDefinition::Signal(
                    node_text(props, "signalref").unwrap_or_default(),
                )),
                ..StartEvent::default()
            }),
            "EndNoneEvent" => NodeKind::EndEvent,
            "UserTask" => NodeKind::UserTask(self.user_task(props)?),
            "ServiceTask" => NodeKind::ServiceTask(service_task(props)),
            "ClanTask" => NodeKind::ServiceTask(clan_task(props)),
            "DecisionTask" => NodeKind::ServiceTask(self.decision_task(props)?),
            "ScriptTask" => NodeKind::ScriptTask(ScriptTask {
                format: node_text(props, "scriptformat").unwrap_or_else(|| "javascript".into()),
                script: node_text(props, "scripttext").unwrap_or_default(),
            }),
            "ExclusiveGateway" => gateway(GatewayKind::Exclusive),
            "ParallelGateway" => gateway(GatewayKind::Parallel),
            "InclusiveGateway" => gateway(GatewayKind::Inclusive),
            "SubProcess" => {
                let (nodes, flows) = self.container(child_shapes(shape))?;
                NodeKind::SubProcess(SubProcess { nodes, flows })
            }
            _ => return Ok(None),
        };

        let id = element_id(shape)
            .or_else(|| node_text(Some(shape), "resourceId"))
            .ok_or_else(|| BpmnError::InvalidJson(format!("{} without resourceId", stencil_id)))?;
        Ok(Some(FlowNode {
            id,
            name: node_text(props, "name"),
            documentation: node_text(props, "documentation"),
            kind,
        }))
    }

    fn user_task(&self, props: Option<&Value>) -> Result<UserTask, BpmnError> {
        let assignment = props
            .and_then(|p| p.get("usertaskassignment"))
            .and_then(|a| a.get("assignment"));
        let values = |name: &str| -> Vec<String> {
            assignment
                .and_then(|a| a.get(name))
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|v| node_text(Some(v), "value"))
                .collect()
        };

        Ok(UserTask {
            assignee: node_text(assignment, "assignee"),
            candidate_users: values("candidateUsers"),
            candidate_groups: values("candidateGroups"),
            form_key: self.form_key(props)?,
            due_date: node_text(props, "duedatedefinition"),
        })
    }

    /// Explicit form key, else the key of the referenced form model.
    fn form_key(&self, props: Option<&Value>) -> Result<Option<String>, BpmnError> {
        if let Some(key) = node_text(props, "formkeydefinition") {
            return Ok(Some(key));
        }
        let Some(reference) = props.and_then(|p| p.get("formreference")) else {
            return Ok(None);
        };
        let Some(id) = node_text(Some(reference), "id") else {
            return Ok(None);
        };
        self.refs
            .forms
            .get(&id)
            .cloned()
            .or_else(|| node_text(Some(reference), "key"))
            .map(Some)
            .ok_or(BpmnError::UnresolvedReference { kind: "form", id })
    }

    fn decision_task(&self, props: Option<&Value>) -> Result<ServiceTask, BpmnError> {
        let reference = props.and_then(|p| p.get("decisiontaskdecisiontablereference"));
        let id = node_text(reference, "id").unwrap_or_default();
        let key = self
            .refs
            .decision_tables
            .get(&id)
            .cloned()
            .or_else(|| node_text(reference, "key"))
            .ok_or(BpmnError::UnresolvedReference {
                kind: "decision table",
                id,
            })?;

        Ok(ServiceTask {
            task_type: Some("dmn".into()),
            implementation: Implementation::None,
            fields: vec![FieldExtension::string("decisionTableReferenceKey", key)],
            result_variable: None,
        })
    }
}

fn element_id(shape: &Value) -> Option<String> {
    node_text(shape.get("properties"), "overrideid")
}

fn gateway(kind: GatewayKind) -> NodeKind {
    NodeKind::Gateway(Gateway {
        kind,
        default_flow: None,
    })
}

fn field_items(props: Option<&Value>) -> Option<&Vec<Value>> {
    props?
        .get("servicetaskfields")?
        .get("fields")?
        .as_array()
}

fn service_task(props: Option<&Value>) -> ServiceTask {
    let implementation = if let Some(class) = node_text(props, "servicetaskclass") {
        Implementation::Class(class)
    } else if let Some(expression) = node_text(props, "servicetaskexpression") {
        Implementation::Expression(expression)
    } else if let Some(delegate) = node_text(props, "servicetaskdelegateexpression") {
        Implementation::DelegateExpression(delegate)
    } else {
        Implementation::None
    };

    let fields = field_items(props)
        .into_iter()
        .flatten()
        .filter_map(|item| {
            Some(FieldExtension {
                name: node_text(Some(item), "name")?,
                string_value: node_text(Some(item), "stringValue")
                    .or_else(|| node_text(Some(item), "string")),
                expression: node_text(Some(item), "expression"),
            })
        })
        .collect();

    ServiceTask {
        task_type: None,
        implementation,
        fields,
        result_variable: node_text(props, "servicetaskresultvariable"),
    }
}

/// The `ClanTask` stencil: a business object method call.
///
/// `clantaskmethod` has the form `<modul>.<bo>/<method>`; service task
/// fields are flattened into one `inParamMapping` string.
fn clan_task(props: Option<&Value>) -> ServiceTask {
    let mut fields = Vec::new();

    if let Some(method) = node_text(props, "clantaskmethod") {
        if let (Some(dot), Some(slash)) = (method.find('.'), method.find('/')) {
            if dot > 0 && slash > dot {
                fields.push(FieldExtension::string("modul", &method[..dot]));
                fields.push(FieldExtension::string("bo", &method[dot + 1..slash]));
                fields.push(FieldExtension::string("method", &method[slash + 1..]));
            }
        }
    }
    for (property, field) in [
        ("clanlsname", "lsName"),
        ("clanxoname", "xoReport"),
        ("clancommitbefore", "commitBefore"),
    ] {
        if let Some(value) = node_text(props, property) {
            fields.push(FieldExtension::string(field, value));
        }
    }

    if let Some(items) = field_items(props) {
        let mapping: String = items
            .iter()
            .map(|item| {
                let value = node_text(Some(item), "stringValue")
                    .or_else(|| node_text(Some(item), "expression"))
                    .or_else(|| node_text(Some(item), "string"))
                    .unwrap_or_else(|| "${null}".to_string());
                format!("{}={};", node_text(Some(item), "name").unwrap_or_default(), value)
            })
            .collect();
        fields.push(FieldExtension::string("inParamMapping", mapping));
    }

    if let Some(names) = node_text(props, "servicetaskresultvariable") {
        fields.push(FieldExtension::string("outParamNames", names));
    }

    ServiceTask {
        task_type: None,
        implementation: Implementation::Class(CLAN_TASK_CLASS.to_string()),
        fields,
        result_variable: None,
    }
}

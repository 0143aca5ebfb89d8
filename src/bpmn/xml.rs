//! BPMN 2.0 XML output.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{
    BpmnError, BpmnModel, EventDefinition, FieldExtension, FlowNode, GatewayKind, Implementation,
    NodeKind, Process, SequenceFlow, TimerDefinition,
};

const BPMN_NS: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const ACTIVITI_NS: &str = "http://activiti.org/bpmn";

/// Indented XML writer with attribute lists as slices.
pub(crate) struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    pub(crate) fn new() -> Result<Self, BpmnError> {
        let mut out = Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        };
        out.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(out)
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), BpmnError> {
        self.writer
            .write_event(event)
            .map_err(|e| BpmnError::Xml(e.to_string()))
    }

    fn element<'a>(name: &'a str, attrs: &[(&'a str, &'a str)]) -> BytesStart<'a> {
        let mut start = BytesStart::new(name);
        for attr in attrs {
            start.push_attribute(*attr);
        }
        start
    }

    pub(crate) fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), BpmnError> {
        self.write(Event::Start(Self::element(name, attrs)))
    }

    pub(crate) fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), BpmnError> {
        self.write(Event::Empty(Self::element(name, attrs)))
    }

    pub(crate) fn end(&mut self, name: &str) -> Result<(), BpmnError> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    /// `<name attrs>text</name>`
    pub(crate) fn text_element(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> Result<(), BpmnError> {
        self.start(name, attrs)?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    pub(crate) fn cdata(&mut self, text: &str) -> Result<(), BpmnError> {
        self.write(Event::CData(BytesCData::new(text)))
    }

    pub(crate) fn cdata_element(&mut self, name: &str, text: &str) -> Result<(), BpmnError> {
        self.start(name, &[])?;
        self.cdata(text)?;
        self.end(name)
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

/// Serialize `model` as a `definitions` document.
pub fn to_bpmn_xml(model: &BpmnModel) -> Result<Vec<u8>, BpmnError> {
    let mut out = XmlOut::new()?;
    out.start(
        "definitions",
        &[
            ("xmlns", BPMN_NS),
            ("xmlns:xsi", XSI_NS),
            ("xmlns:activiti", ACTIVITI_NS),
            ("typeLanguage", "http://www.w3.org/2001/XMLSchema"),
            ("expressionLanguage", "http://www.w3.org/1999/XPath"),
            ("targetNamespace", &model.target_namespace),
        ],
    )?;
    for process in &model.processes {
        write_process(&mut out, process)?;
    }
    out.end("definitions")?;
    Ok(out.finish())
}

fn write_process(out: &mut XmlOut, process: &Process) -> Result<(), BpmnError> {
    let executable = if process.executable { "true" } else { "false" };
    let mut attrs = vec![("id", process.id.as_str())];
    if let Some(name) = &process.name {
        attrs.push(("name", name));
    }
    attrs.push(("isExecutable", executable));

    out.start("process", &attrs)?;
    if let Some(documentation) = &process.documentation {
        out.text_element("documentation", &[], documentation)?;
    }
    write_container(out, &process.nodes, &process.flows)?;
    out.end("process")
}

fn write_container(
    out: &mut XmlOut,
    nodes: &[FlowNode],
    flows: &[SequenceFlow],
) -> Result<(), BpmnError> {
    for node in nodes {
        write_node(out, node)?;
    }
    for flow in flows {
        write_flow(out, flow)?;
    }
    Ok(())
}

fn write_node(out: &mut XmlOut, node: &FlowNode) -> Result<(), BpmnError> {
    let users: String;
    let groups: String;
    let mut attrs = vec![("id", node.id.as_str())];
    if let Some(name) = &node.name {
        attrs.push(("name", name));
    }

    let tag = match &node.kind {
        NodeKind::StartEvent(start) => {
            if let Some(initiator) = &start.initiator {
                attrs.push(("activiti:initiator", initiator));
            }
            if let Some(form_key) = &start.form_key {
                attrs.push(("activiti:formKey", form_key));
            }
            out.start("startEvent", &attrs)?;
            write_documentation(out, node)?;
            match &start.definition {
                Some(EventDefinition::Timer(timer)) => {
                    out.start("timerEventDefinition", &[])?;
                    match timer {
                        TimerDefinition::Date(v) => out.text_element("timeDate", &[], v)?,
                        TimerDefinition::Cycle(v) => out.text_element("timeCycle", &[], v)?,
                        TimerDefinition::Duration(v) => out.text_element("timeDuration", &[], v)?,
                    }
                    out.end("timerEventDefinition")?;
                }
                Some(EventDefinition::Message(message)) => {
                    out.empty("messageEventDefinition", &[("messageRef", message)])?;
                }
                Some(EventDefinition::Signal(signal)) => {
                    out.empty("signalEventDefinition", &[("signalRef", signal)])?;
                }
                None => {}
            }
            "startEvent"
        }
        NodeKind::EndEvent => {
            out.start("endEvent", &attrs)?;
            write_documentation(out, node)?;
            "endEvent"
        }
        NodeKind::UserTask(task) => {
            users = task.candidate_users.join(",");
            groups = task.candidate_groups.join(",");
            if let Some(assignee) = &task.assignee {
                attrs.push(("activiti:assignee", assignee));
            }
            if !users.is_empty() {
                attrs.push(("activiti:candidateUsers", &users));
            }
            if !groups.is_empty() {
                attrs.push(("activiti:candidateGroups", &groups));
            }
            if let Some(form_key) = &task.form_key {
                attrs.push(("activiti:formKey", form_key));
            }
            if let Some(due_date) = &task.due_date {
                attrs.push(("activiti:dueDate", due_date));
            }
            out.start("userTask", &attrs)?;
            write_documentation(out, node)?;
            "userTask"
        }
        NodeKind::ServiceTask(task) => {
            match &task.implementation {
                Implementation::Class(class) => attrs.push(("activiti:class", class)),
                Implementation::Expression(e) => attrs.push(("activiti:expression", e)),
                Implementation::DelegateExpression(e) => {
                    attrs.push(("activiti:delegateExpression", e))
                }
                Implementation::None => {}
            }
            if let Some(task_type) = &task.task_type {
                attrs.push(("activiti:type", task_type));
            }
            if let Some(result) = &task.result_variable {
                attrs.push(("activiti:resultVariableName", result));
            }
            out.start("serviceTask", &attrs)?;
            write_documentation(out, node)?;
            write_fields(out, &task.fields)?;
            "serviceTask"
        }
        NodeKind::ScriptTask(task) => {
            attrs.push(("scriptFormat", &task.format));
            out.start("scriptTask", &attrs)?;
            write_documentation(out, node)?;
            out.cdata_element("script", &task.script)?;
            "scriptTask"
        }
        NodeKind::Gateway(gateway) => {
            if let Some(default_flow) = &gateway.default_flow {
                attrs.push(("default", default_flow));
            }
            let tag = match gateway.kind {
                GatewayKind::Exclusive => "exclusiveGateway",
                GatewayKind::Parallel => "parallelGateway",
                GatewayKind::Inclusive => "inclusiveGateway",
            };
            out.start(tag, &attrs)?;
            write_documentation(out, node)?;
            tag
        }
        NodeKind::SubProcess(sub) => {
            out.start("subProcess", &attrs)?;
            write_documentation(out, node)?;
            write_container(out, &sub.nodes, &sub.flows)?;
            "subProcess"
        }
    };
    out.end(tag)
}

fn write_documentation(out: &mut XmlOut, node: &FlowNode) -> Result<(), BpmnError> {
    match &node.documentation {
        Some(documentation) => out.text_element("documentation", &[], documentation),
        None => Ok(()),
    }
}

fn write_fields(out: &mut XmlOut, fields: &[FieldExtension]) -> Result<(), BpmnError> {
    if fields.is_empty() {
        return Ok(());
    }
    out.start("extensionElements", &[])?;
    for field in fields {
        out.start("activiti:field", &[("name", &field.name)])?;
        if let Some(value) = &field.string_value {
            out.cdata_element("activiti:string", value)?;
        } else if let Some(expression) = &field.expression {
            out.cdata_element("activiti:expression", expression)?;
        }
        out.end("activiti:field")?;
    }
    out.end("extensionElements")
}

fn write_flow(out: &mut XmlOut, flow: &SequenceFlow) -> Result<(), BpmnError> {
    let mut attrs = vec![("id", flow.id.as_str())];
    if let Some(name) = &flow.name {
        attrs.push(("name", name));
    }
    attrs.push(("sourceRef", &flow.source_ref));
    attrs.push(("targetRef", &flow.target_ref));

    match &flow.condition {
        Some(condition) => {
            out.start("sequenceFlow", &attrs)?;
            out.start("conditionExpression", &[("xsi:type", "tFormalExpression")])?;
            out.cdata(condition)?;
            out.end("conditionExpression")?;
            out.end("sequenceFlow")
        }
        None => out.empty("sequenceFlow", &attrs),
    }
}

//! Design-tool component trees
//!
//! Nodes follow the Figma document shape: `type`, `name`, `id`, optional
//! `children`. A bare `{ "document": {...} }` file response is accepted too.
//!
//! | Node type                                         | Role                      |
//! |---------------------------------------------------|---------------------------|
//! | DOCUMENT, CANVAS, PAGE                            | traversed                 |
//! | FRAME, SECTION                                    | screen (outermost), else container |
//! | GROUP                                             | container                 |
//! | INSTANCE, COMPONENT, COMPONENT_SET, RECTANGLE, TEXT | component               |
//! | anything else                                     | dropped, children visited |

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::{Error, Result};
use crate::model::{Component, ComponentType, Constraint, ConstraintKind};
use crate::util::slugify;
use serde_json::{Map, Value};

/// Screen id for components found outside any frame
pub const DEFAULT_SCREEN: &str = "Main";

const NAME_KEYWORDS: &[(ComponentType, &[&str])] = &[
    (ComponentType::Input, &["input", "field", "textbox", "text box"]),
    (ComponentType::Button, &["button", "btn"]),
    (ComponentType::Dropdown, &["dropdown", "select", "picker"]),
    (ComponentType::Checkbox, &["checkbox", "toggle", "switch"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeRole {
    Traverse,
    Screen,
    Container,
    Component,
}

fn node_role(node_type: &str) -> Option<NodeRole> {
    match node_type {
        "DOCUMENT" | "CANVAS" | "PAGE" => Some(NodeRole::Traverse),
        "FRAME" | "SECTION" => Some(NodeRole::Screen),
        "GROUP" => Some(NodeRole::Container),
        "INSTANCE" | "COMPONENT" | "COMPONENT_SET" | "RECTANGLE" | "TEXT" => {
            Some(NodeRole::Component)
        }
        _ => None,
    }
}

/// Components, their constraints and dropped-node warnings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedComponentTree {
    pub components: Vec<Component>,
    pub constraints: Vec<Constraint>,
    pub diagnostics: Vec<Diagnostic>,
}

struct Walker<'a> {
    source_id: &'a str,
    out: ParsedComponentTree,
}

/// Map a component tree into components and constraints
pub fn parse_component_tree(source_id: &str, root: &Value) -> Result<ParsedComponentTree> {
    let root = match root {
        Value::Object(map) if !map.contains_key("type") && map.contains_key("document") => {
            &map["document"]
        }
        other => other,
    };
    let mut walker = Walker {
        source_id,
        out: ParsedComponentTree::default(),
    };
    walker.visit(root, "root", DEFAULT_SCREEN, false)?;
    Ok(walker.out)
}

impl Walker<'_> {
    fn visit(&mut self, node: &Value, path: &str, screen: &str, in_screen: bool) -> Result<()> {
        let map = node.as_object().ok_or_else(|| {
            Error::source_parse(self.source_id, path, "node is not an object")
        })?;
        let node_type = map
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::source_parse(self.source_id, path, "node has no type"))?;
        let name = map.get("name").and_then(Value::as_str).unwrap_or_default();
        let label = if name.is_empty() {
            map.get("id").and_then(Value::as_str).unwrap_or(node_type)
        } else {
            name
        };

        let mut child_screen = screen.to_string();
        let mut child_in_screen = in_screen;
        match node_role(node_type) {
            Some(NodeRole::Screen) if !in_screen => {
                child_screen = label.to_string();
                child_in_screen = true;
            }
            Some(NodeRole::Screen) | Some(NodeRole::Container) | Some(NodeRole::Traverse) => {}
            Some(NodeRole::Component) => self.add_component(map, node_type, name, screen),
            None => {
                tracing::debug!(source = %self.source_id, node_type, node = %label, "dropping unmapped node");
                self.out.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::DroppedNode,
                        format!("unmapped node type {}", node_type),
                    )
                    .in_scope(self.source_id)
                    .about(label),
                );
            }
        }

        match map.get("children") {
            None | Some(Value::Null) => Ok(()),
            Some(Value::Array(children)) => {
                for (i, child) in children.iter().enumerate() {
                    let child_path = format!("{}/{}", path, child_label(child, i));
                    self.visit(child, &child_path, &child_screen, child_in_screen)?;
                }
                Ok(())
            }
            Some(_) => Err(Error::source_parse(
                self.source_id,
                path,
                "children is not an array",
            )),
        }
    }

    fn add_component(&mut self, map: &Map<String, Value>, node_type: &str, name: &str, screen: &str) {
        let id = map
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|s| !s.is_empty())
            .or_else(|| Some(slugify(name)).filter(|s| !s.is_empty()))
            .unwrap_or_else(|| {
                format!("{}-node-{}", self.source_id, self.out.components.len() + 1)
            });

        let mut component = Component::new(&id, screen, infer_type(name, node_type));
        component.properties = node_properties(map);
        component.states = node_states(map);

        for constraint in node_constraints(&id, map) {
            component.constraints.push(constraint.id.clone());
            self.out.constraints.push(constraint);
        }
        self.out.components.push(component);
    }
}

fn child_label(child: &Value, index: usize) -> String {
    child
        .get("name")
        .or_else(|| child.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| index.to_string())
}

/// Component type from name keywords, then from the node type
pub fn infer_type(name: &str, node_type: &str) -> ComponentType {
    let lower = name.to_lowercase();
    if let Some((typ, _)) = NAME_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
    {
        return *typ;
    }
    match node_type {
        "TEXT" => ComponentType::Text,
        "COMPONENT_SET" => ComponentType::Dropdown,
        _ => ComponentType::Other,
    }
}

fn node_properties(map: &Map<String, Value>) -> std::collections::BTreeMap<String, Value> {
    let mut props = std::collections::BTreeMap::new();
    if let Some(name) = map.get("name") {
        props.insert("name".to_string(), name.clone());
    }
    if let Some(text) = map.get("characters") {
        props.insert("text".to_string(), text.clone());
    }
    for key in ["visible", "locked"] {
        if let Some(value) = map.get(key) {
            props.insert(key.to_string(), value.clone());
        }
    }
    if let Some(Value::Object(bbox)) = map.get("absoluteBoundingBox") {
        for key in ["width", "height"] {
            if let Some(value) = bbox.get(key) {
                props.insert(key.to_string(), value.clone());
            }
        }
    }
    // Figma keys look like "Label#12:3"; the suffix is an internal id
    if let Some(Value::Object(component_props)) = map.get("componentProperties") {
        for (key, value) in component_props {
            let clean = key.split('#').next().unwrap_or(key).to_string();
            let value = match value {
                Value::Object(inner) => inner.get("value").cloned().unwrap_or(Value::Null),
                other => other.clone(),
            };
            props.insert(clean, value);
        }
    }
    props
}

fn node_states(map: &Map<String, Value>) -> Vec<String> {
    let mut states: Vec<String> = Vec::new();
    for key in ["states", "variants"] {
        if let Some(Value::Array(items)) = map.get(key) {
            for item in items {
                let state = match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_string),
                    _ => None,
                };
                if let Some(state) = state.filter(|s| !s.is_empty()) {
                    if !states.contains(&state) {
                        states.push(state);
                    }
                }
            }
        }
    }
    states
}

fn node_constraints(component_id: &str, map: &Map<String, Value>) -> Vec<Constraint> {
    let make = |kind: ConstraintKind| {
        Constraint::new(format!("{}-{}", component_id, kind.slug()), component_id, kind)
    };
    let mut constraints = Vec::new();

    if map.get("required").and_then(Value::as_bool) == Some(true) {
        constraints.push(make(ConstraintKind::Required));
    }
    if let Some(min) = map.get("minLength").filter(|v| v.is_number()) {
        constraints.push(make(ConstraintKind::MinLength).with_param("min", min.clone()));
    }
    if let Some(max) = map.get("maxLength").filter(|v| v.is_number()) {
        constraints.push(make(ConstraintKind::MaxLength).with_param("max", max.clone()));
    }
    if let Some(pattern) = map.get("pattern").and_then(Value::as_str) {
        constraints.push(make(ConstraintKind::Format).with_param("pattern", pattern));
    }
    if let Some(Value::Array(options)) = map.get("options") {
        if !options.is_empty() {
            constraints.push(make(ConstraintKind::Enum).with_param("values", Value::Array(options.clone())));
        }
    }
    constraints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::count_kind;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn login_tree() -> Value {
        json!({
            "document": {
                "type": "DOCUMENT",
                "children": [{
                    "type": "CANVAS",
                    "name": "Page 1",
                    "children": [{
                        "type": "FRAME",
                        "name": "Login",
                        "children": [
                            {
                                "type": "INSTANCE",
                                "id": "email-input",
                                "name": "Email input",
                                "required": true,
                                "pattern": "^[^@]+@[^@]+$"
                            },
                            {
                                "type": "INSTANCE",
                                "id": "password",
                                "name": "Password field",
                                "maxLength": 50
                            },
                            {
                                "type": "FRAME",
                                "name": "Actions",
                                "children": [
                                    {"type": "INSTANCE", "id": "btn-login", "name": "Login button",
                                     "states": ["default", "hover", "disabled", "hover"]},
                                    {"type": "VECTOR", "id": "9:1", "name": "icon"}
                                ]
                            },
                            {
                                "type": "COMPONENT_SET",
                                "id": "role",
                                "name": "Role",
                                "options": ["admin", "member"],
                                "componentProperties": {
                                    "Label#1:0": {"type": "TEXT", "value": "Role"}
                                }
                            }
                        ]
                    }]
                }]
            }
        })
    }

    #[test]
    fn test_login_tree() {
        let parsed = parse_component_tree("figma", &login_tree()).unwrap();
        let ids: Vec<&str> = parsed.components.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["email-input", "password", "btn-login", "role"]);
        assert!(parsed.components.iter().all(|c| c.screen_id == "Login"));

        let btn = &parsed.components[2];
        assert_eq!(btn.component_type, ComponentType::Button);
        assert_eq!(btn.states, vec!["default", "hover", "disabled"]);

        let role = &parsed.components[3];
        assert_eq!(role.component_type, ComponentType::Dropdown);
        assert_eq!(role.properties.get("Label"), Some(&json!("Role")));
        assert_eq!(role.constraints, vec!["role-enum"]);

        let constraint_ids: Vec<&str> = parsed.constraints.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            constraint_ids,
            vec!["email-input-required", "email-input-format", "password-maxlen", "role-enum"]
        );
        assert_eq!(parsed.constraints[2].number_param("max"), Some(50.0));
        assert_eq!(count_kind(&parsed.diagnostics, DiagnosticKind::DroppedNode), 1);
    }

    #[test]
    fn test_dropped_node_children_still_visited() {
        let root = json!({
            "type": "BOOLEAN_OPERATION",
            "name": "combo",
            "children": [{"type": "TEXT", "id": "t1", "name": "Caption", "characters": "Hello"}]
        });
        let parsed = parse_component_tree("figma", &root).unwrap();
        assert_eq!(parsed.components.len(), 1);
        assert_eq!(parsed.components[0].screen_id, DEFAULT_SCREEN);
        assert_eq!(parsed.components[0].component_type, ComponentType::Text);
        assert_eq!(parsed.components[0].properties.get("text"), Some(&json!("Hello")));
        assert_eq!(parsed.diagnostics.len(), 1);
    }

    #[test]
    fn test_missing_type_is_a_parse_error() {
        let root = json!({"type": "FRAME", "name": "Login", "children": [{"name": "orphan"}]});
        let err = parse_component_tree("figma", &root).unwrap_err();
        match err {
            Error::SourceParse { source_id, item, .. } => {
                assert_eq!(source_id, "figma");
                assert_eq!(item, "root/orphan");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_children_must_be_an_array() {
        let root = json!({"type": "FRAME", "name": "Login", "children": {"a": 1}});
        assert!(parse_component_tree("figma", &root).is_err());
    }

    #[test]
    fn test_missing_optional_fields_are_fine() {
        let root = json!({"type": "RECTANGLE"});
        let parsed = parse_component_tree("figma", &root).unwrap();
        assert_eq!(parsed.components[0].id, "figma-node-1");
        assert_eq!(parsed.components[0].component_type, ComponentType::Other);
    }

    #[rstest]
    #[case("Email field", "INSTANCE", ComponentType::Input)]
    #[case("btn-submit", "RECTANGLE", ComponentType::Button)]
    #[case("Country picker", "INSTANCE", ComponentType::Dropdown)]
    #[case("Dark mode toggle", "INSTANCE", ComponentType::Checkbox)]
    #[case("Heading", "TEXT", ComponentType::Text)]
    #[case("Sizes", "COMPONENT_SET", ComponentType::Dropdown)]
    #[case("Card", "COMPONENT", ComponentType::Other)]
    fn test_infer_type(#[case] name: &str, #[case] node_type: &str, #[case] expected: ComponentType) {
        assert_eq!(infer_type(name, node_type), expected);
    }
}

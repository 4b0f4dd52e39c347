//! API schemas (OpenAPI 3 and Swagger 2 shapes)
//!
//! Every `paths.<path>.<method>` operation becomes an `endpoint` component
//! scoped by its path. Parameters and JSON request-body properties become
//! constraints targeting `<componentId>.<field>`.

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::{Error, Result};
use crate::model::{Component, ComponentType, Constraint, ConstraintKind};
use crate::util::slugify;
use serde_json::{Map, Value};

const METHODS: &[&str] = &["get", "post", "put", "delete", "patch", "head", "options"];

/// Endpoints, field constraints and skipped-reference warnings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedApiSchema {
    pub components: Vec<Component>,
    pub constraints: Vec<Constraint>,
    pub diagnostics: Vec<Diagnostic>,
}

/// One field of an operation: parameter or body property
struct Field<'a> {
    name: String,
    location: String,
    required: bool,
    schema: &'a Map<String, Value>,
}

/// Map an API schema document into endpoint components
pub fn parse_api_schema(source_id: &str, document: &Value) -> Result<ParsedApiSchema> {
    let doc = document
        .as_object()
        .ok_or_else(|| Error::source_parse(source_id, "document", "expected a mapping"))?;
    let mut out = ParsedApiSchema::default();

    let paths = match doc.get("paths") {
        None | Some(Value::Null) => return Ok(out),
        Some(Value::Object(paths)) => paths,
        Some(_) => return Err(Error::source_parse(source_id, "paths", "expected a mapping")),
    };
    let base_url = base_url(doc);
    let globally_secured = non_empty_array(doc.get("security"));

    for (path, item) in paths {
        let item = item.as_object().ok_or_else(|| {
            Error::source_parse(source_id, format!("paths.{}", path), "expected a mapping")
        })?;
        let shared_params = item.get("parameters");

        for method in METHODS {
            let Some(operation) = item.get(*method) else {
                continue;
            };
            let operation = operation.as_object().ok_or_else(|| {
                Error::source_parse(
                    source_id,
                    format!("paths.{}.{}", path, method),
                    "expected a mapping",
                )
            })?;
            let upper = method.to_ascii_uppercase();
            let (id, prefix) = match operation.get("operationId").and_then(Value::as_str) {
                Some(op_id) if !op_id.is_empty() => (op_id.to_string(), op_id.to_string()),
                _ => {
                    let id = format!("{} {}", upper, path);
                    let prefix = slugify(&id);
                    (id, prefix)
                }
            };

            let mut component = Component::new(&id, path.as_str(), ComponentType::Endpoint);
            component.properties.insert("method".into(), Value::from(upper.clone()));
            component.properties.insert("path".into(), Value::from(path.as_str()));
            if let Some(summary) = operation.get("summary").and_then(Value::as_str) {
                component.properties.insert("summary".into(), Value::from(summary));
            }
            let secured = match operation.get("security") {
                Some(security) => non_empty_array(Some(security)),
                None => globally_secured,
            };
            component.properties.insert("secured".into(), Value::from(secured));
            let deprecated = operation
                .get("deprecated")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            component.properties.insert("deprecated".into(), Value::from(deprecated));
            if !base_url.is_empty() {
                component.properties.insert("base_url".into(), Value::from(base_url.as_str()));
            }

            let fields = collect_fields(
                source_id,
                &id,
                shared_params,
                operation,
                &mut out.diagnostics,
            )?;
            for field in fields {
                for constraint in field_constraints(&id, &prefix, &field) {
                    component.constraints.push(constraint.id.clone());
                    out.constraints.push(constraint);
                }
            }
            tracing::debug!(endpoint = %id, constraints = component.constraints.len(), "parsed endpoint");
            out.components.push(component);
        }
    }
    Ok(out)
}

fn base_url(doc: &Map<String, Value>) -> String {
    if let Some(url) = doc
        .get("servers")
        .and_then(Value::as_array)
        .and_then(|servers| servers.first())
        .and_then(|server| server.get("url"))
        .and_then(Value::as_str)
    {
        return url.to_string();
    }
    if let Some(host) = doc.get("host").and_then(Value::as_str) {
        let scheme = doc
            .get("schemes")
            .and_then(Value::as_array)
            .and_then(|s| s.first())
            .and_then(Value::as_str)
            .unwrap_or("https");
        let base_path = doc.get("basePath").and_then(Value::as_str).unwrap_or("");
        return format!("{}://{}{}", scheme, host, base_path);
    }
    String::new()
}

fn non_empty_array(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Array(items)) if !items.is_empty())
}

fn collect_fields<'a>(
    source_id: &str,
    endpoint_id: &str,
    shared_params: Option<&'a Value>,
    operation: &'a Map<String, Value>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Vec<Field<'a>>> {
    let mut fields: Vec<Field<'a>> = Vec::new();

    for params in [shared_params, operation.get("parameters")].into_iter().flatten() {
        let params = params.as_array().ok_or_else(|| {
            Error::source_parse(
                source_id,
                format!("{}.parameters", endpoint_id),
                "expected a list",
            )
        })?;
        for param in params {
            let Some(param) = param.as_object() else {
                return Err(Error::source_parse(
                    source_id,
                    format!("{}.parameters", endpoint_id),
                    "parameter is not a mapping",
                ));
            };
            if param.contains_key("$ref") {
                diagnostics.push(unresolved_ref(source_id, endpoint_id, param));
                continue;
            }
            let Some(name) = param.get("name").and_then(Value::as_str) else {
                continue;
            };
            let location = param.get("in").and_then(Value::as_str).unwrap_or("query");
            let required = param.get("required").and_then(Value::as_bool).unwrap_or(false);

            if location == "body" {
                if let Some(Value::Object(schema)) = param.get("schema") {
                    push_body_fields(&mut fields, schema);
                }
                continue;
            }
            // OpenAPI 3 nests the value schema; Swagger 2 inlines it
            let schema = match param.get("schema") {
                Some(Value::Object(schema)) => schema,
                _ => param,
            };
            let field = Field {
                name: name.to_string(),
                location: location.to_string(),
                required,
                schema,
            };
            // operation-level parameters override path-level ones
            match fields
                .iter()
                .position(|f| f.name == field.name && f.location == field.location)
            {
                Some(i) => fields[i] = field,
                None => fields.push(field),
            }
        }
    }

    if let Some(Value::Object(content)) = operation
        .get("requestBody")
        .and_then(|body| body.get("content"))
    {
        let media = content
            .get("application/json")
            .or_else(|| content.values().next());
        if let Some(Value::Object(schema)) = media.and_then(|m| m.get("schema")) {
            if schema.contains_key("$ref") {
                diagnostics.push(unresolved_ref(source_id, endpoint_id, schema));
            } else {
                push_body_fields(&mut fields, schema);
            }
        }
    }
    Ok(fields)
}

fn push_body_fields<'a>(fields: &mut Vec<Field<'a>>, schema: &'a Map<String, Value>) {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if let Some(Value::Object(properties)) = schema.get("properties") {
        for (name, prop) in properties {
            if let Value::Object(prop) = prop {
                fields.push(Field {
                    name: name.clone(),
                    location: "body".to_string(),
                    required: required.contains(&name.as_str()),
                    schema: prop,
                });
            }
        }
    }
}

fn unresolved_ref(source_id: &str, endpoint_id: &str, node: &Map<String, Value>) -> Diagnostic {
    let reference = node.get("$ref").and_then(Value::as_str).unwrap_or("?");
    Diagnostic::new(
        DiagnosticKind::DroppedNode,
        format!("unresolved reference {} skipped", reference),
    )
    .in_scope(source_id)
    .about(endpoint_id)
}

fn field_constraints(endpoint_id: &str, prefix: &str, field: &Field<'_>) -> Vec<Constraint> {
    let target = format!("{}.{}", endpoint_id, field.name);
    let make = |kind: ConstraintKind| {
        Constraint::new(format!("{}-{}-{}", prefix, field.name, kind.slug()), &target, kind)
    };
    let schema = field.schema;
    let mut constraints = Vec::new();

    if field.required {
        constraints.push(make(ConstraintKind::Required));
    }

    let typ = schema.get("type").and_then(Value::as_str);
    let format = schema.get("format").and_then(Value::as_str);
    let pattern = schema.get("pattern").and_then(Value::as_str);
    let typed = matches!(typ, Some("integer") | Some("number") | Some("boolean"));
    if typed || format.is_some() || pattern.is_some() {
        let mut c = make(ConstraintKind::Format);
        if let Some(typ) = typ {
            c = c.with_param("type", typ);
        }
        if let Some(format) = format {
            c = c.with_param("format", format);
        }
        if let Some(pattern) = pattern {
            c = c.with_param("pattern", pattern);
        }
        constraints.push(c);
    }

    if let Some(Value::Array(values)) = schema.get("enum") {
        if !values.is_empty() {
            constraints.push(make(ConstraintKind::Enum).with_param("values", Value::Array(values.clone())));
        }
    }

    let minimum = schema.get("minimum").filter(|v| v.is_number());
    let maximum = schema.get("maximum").filter(|v| v.is_number());
    if minimum.is_some() || maximum.is_some() {
        let mut c = make(ConstraintKind::Range);
        if let Some(min) = minimum {
            c = c.with_param("min", min.clone());
        }
        if let Some(max) = maximum {
            c = c.with_param("max", max.clone());
        }
        constraints.push(c);
    }

    if let Some(min) = schema.get("minLength").filter(|v| v.is_number()) {
        constraints.push(make(ConstraintKind::MinLength).with_param("min", min.clone()));
    }
    if let Some(max) = schema.get("maxLength").filter(|v| v.is_number()) {
        constraints.push(make(ConstraintKind::MaxLength).with_param("max", max.clone()));
    }
    constraints
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn petstore() -> Value {
        json!({
            "openapi": "3.0.0",
            "servers": [{"url": "https://api.example.com/v1"}],
            "paths": {
                "/pets": {
                    "get": {
                        "operationId": "listPets",
                        "summary": "List pets",
                        "parameters": [
                            {"name": "limit", "in": "query",
                             "schema": {"type": "integer", "minimum": 1, "maximum": 100}},
                            {"name": "status", "in": "query",
                             "schema": {"type": "string", "enum": ["available", "sold"]}}
                        ]
                    },
                    "post": {
                        "security": [{"bearer": []}],
                        "requestBody": {"content": {"application/json": {"schema": {
                            "type": "object",
                            "required": ["name"],
                            "properties": {
                                "name": {"type": "string", "minLength": 1, "maxLength": 40},
                                "tag": {"type": "string"}
                            }
                        }}}}
                    }
                },
                "/pets/{petId}": {
                    "parameters": [{"name": "petId", "in": "path", "required": true,
                                    "schema": {"type": "string"}}],
                    "delete": {"operationId": "deletePet", "deprecated": true}
                }
            }
        })
    }

    #[test]
    fn test_endpoints_and_properties() {
        let parsed = parse_api_schema("petstore", &petstore()).unwrap();
        let ids: Vec<&str> = parsed.components.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["listPets", "POST /pets", "deletePet"]);

        let post = &parsed.components[1];
        assert_eq!(post.component_type, ComponentType::Endpoint);
        assert_eq!(post.screen_id, "/pets");
        assert_eq!(post.properties.get("secured"), Some(&json!(true)));
        assert_eq!(
            post.properties.get("base_url"),
            Some(&json!("https://api.example.com/v1"))
        );
        assert_eq!(
            parsed.components[2].properties.get("deprecated"),
            Some(&json!(true))
        );
        assert_eq!(parsed.components[0].properties.get("secured"), Some(&json!(false)));
    }

    #[test]
    fn test_parameter_constraints() {
        let parsed = parse_api_schema("petstore", &petstore()).unwrap();
        let list = &parsed.components[0];
        assert_eq!(
            list.constraints,
            vec!["listPets-limit-format", "listPets-limit-range", "listPets-status-enum"]
        );
        let status = parsed
            .constraints
            .iter()
            .find(|c| c.id == "listPets-status-enum")
            .unwrap();
        assert_eq!(status.target_id, "listPets.status");
        assert_eq!(status.enum_values(), vec!["available", "sold"]);

        let post = &parsed.components[1];
        assert_eq!(
            post.constraints,
            vec![
                "post-pets-name-required",
                "post-pets-name-minlen",
                "post-pets-name-maxlen"
            ]
        );
        assert_eq!(parsed.components[2].constraints, vec!["deletePet-petId-required"]);
    }

    #[test]
    fn test_swagger_base_url_and_body_param() {
        let doc = json!({
            "swagger": "2.0",
            "host": "petstore.io",
            "basePath": "/v2",
            "schemes": ["http"],
            "security": [{"api_key": []}],
            "paths": {"/users": {"post": {
                "parameters": [{"name": "body", "in": "body", "schema": {
                    "required": ["email"],
                    "properties": {"email": {"type": "string", "format": "email"}}
                }}]
            }}}
        });
        let parsed = parse_api_schema("legacy", &doc).unwrap();
        let endpoint = &parsed.components[0];
        assert_eq!(endpoint.properties.get("base_url"), Some(&json!("http://petstore.io/v2")));
        assert_eq!(endpoint.properties.get("secured"), Some(&json!(true)));
        assert_eq!(
            endpoint.constraints,
            vec!["post-users-email-required", "post-users-email-format"]
        );
    }

    #[test]
    fn test_refs_are_reported_not_fatal() {
        let doc = json!({"paths": {"/a": {"get": {"parameters": [{"$ref": "#/components/parameters/Id"}]}}}});
        let parsed = parse_api_schema("refs", &doc).unwrap();
        assert_eq!(parsed.components.len(), 1);
        assert_eq!(parsed.diagnostics.len(), 1);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(parse_api_schema("x", &json!([1, 2])).is_err());
        assert!(parse_api_schema("x", &json!({"paths": ["a"]})).is_err());
        assert!(parse_api_schema("x", &json!({"paths": {"/a": 3}})).is_err());
        assert!(parse_api_schema("x", &json!({"paths": {"/a": {"get": "nope"}}})).is_err());
        let empty = parse_api_schema("x", &json!({"info": {}})).unwrap();
        assert!(empty.components.is_empty());
    }
}

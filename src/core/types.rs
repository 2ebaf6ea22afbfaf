//! Typed JSON documents emitted by the engine.
//!
//! Only the commonly used fields are modelled; nested structures whose shape
//! depends on providers are kept as [`serde_json::Value`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `terraform show -json` on a state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub format_version: String,
    #[serde(default)]
    pub terraform_version: Option<String>,
    #[serde(default)]
    pub values: Option<StateValues>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateValues {
    #[serde(default)]
    pub outputs: BTreeMap<String, StateOutput>,
    #[serde(default)]
    pub root_module: Option<StateModule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateOutput {
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub value: Value,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateModule {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub resources: Vec<StateResource>,
    #[serde(default)]
    pub child_modules: Vec<StateModule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateResource {
    pub address: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default, rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub index: Option<Value>,
    #[serde(default)]
    pub provider_name: String,
    #[serde(default)]
    pub schema_version: u64,
    #[serde(default)]
    pub values: Option<Value>,
    #[serde(default)]
    pub sensitive_values: Option<Value>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// `terraform show -json PLANFILE`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub format_version: String,
    #[serde(default)]
    pub terraform_version: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, PlanVariable>,
    #[serde(default)]
    pub planned_values: Option<StateValues>,
    #[serde(default)]
    pub resource_changes: Vec<ResourceChange>,
    #[serde(default)]
    pub output_changes: BTreeMap<String, Change>,
    #[serde(default)]
    pub prior_state: Option<State>,
    #[serde(default)]
    pub configuration: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanVariable {
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub address: String,
    #[serde(default)]
    pub module_address: Option<String>,
    #[serde(default)]
    pub mode: String,
    #[serde(default, rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub provider_name: String,
    #[serde(default)]
    pub change: Change,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub before: Value,
    #[serde(default)]
    pub after: Value,
    #[serde(default)]
    pub after_unknown: Value,
}

/// `terraform providers schema -json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSchemas {
    #[serde(default)]
    pub format_version: String,
    #[serde(default)]
    pub provider_schemas: BTreeMap<String, Value>,
}

/// `terraform validate -json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateOutput {
    #[serde(default)]
    pub format_version: String,
    pub valid: bool,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub warning_count: u64,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: String,
    pub summary: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub range: Option<Value>,
}

/// One entry of `terraform output -json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputMeta {
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<Value>,
    #[serde(default)]
    pub value: Value,
}

/// `terraform metadata functions -json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFunctions {
    #[serde(default)]
    pub format_version: String,
    #[serde(default)]
    pub function_signatures: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_output_type_is_not_serialized_as_null() {
        let meta: OutputMeta = serde_json::from_str(r#"{"sensitive":false,"value":1}"#).unwrap();
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("type").is_none(), "{json}");

        let state = serde_json::to_value(StateOutput::default()).unwrap();
        assert!(state.get("type").is_none(), "{state}");

        let typed: OutputMeta =
            serde_json::from_str(r#"{"sensitive":true,"type":"string","value":"db"}"#).unwrap();
        assert_eq!(serde_json::to_value(&typed).unwrap()["type"], "string");
    }

    #[test]
    fn test_integer_tokens_keep_their_precision() {
        let v: Value = serde_json::from_str(r#"{"n": 18446744073709551615}"#).unwrap();
        assert_eq!(v["n"].as_u64(), Some(u64::MAX));

        let v: Value = serde_json::from_str(r#"{"n": 123456789012345678901234567890}"#).unwrap();
        let n = v["n"].as_number().unwrap();
        assert!(!n.is_f64());
        assert_eq!(n.to_string(), "123456789012345678901234567890");
    }

    #[test]
    fn test_empty_state_decodes() {
        let state: State = serde_json::from_str(r#"{"format_version":"1.0"}"#).unwrap();
        assert_eq!(state.format_version, "1.0");
        assert!(state.values.is_none());
    }

    #[test]
    fn test_state_with_resources() {
        let raw = r#"{
          "format_version": "1.0",
          "terraform_version": "1.5.7",
          "values": {
            "outputs": {"id": {"sensitive": false, "value": "abc", "type": "string"}},
            "root_module": {
              "resources": [{
                "address": "null_resource.foo",
                "mode": "managed",
                "type": "null_resource",
                "name": "foo",
                "provider_name": "registry.terraform.io/hashicorp/null",
                "schema_version": 0,
                "values": {"id": "5577006791947779410", "triggers": null}
              }]
            }
          }
        }"#;
        let state: State = serde_json::from_str(raw).unwrap();
        let values = state.values.unwrap();
        assert_eq!(values.outputs["id"].value, Value::String("abc".into()));
        let root = values.root_module.unwrap();
        assert_eq!(root.resources[0].resource_type, "null_resource");
    }

    #[test]
    fn test_validate_output() {
        let raw = r#"{"format_version":"1.0","valid":false,"error_count":1,"warning_count":0,
          "diagnostics":[{"severity":"error","summary":"Unsupported argument","detail":"An argument named \"foo\" is not expected here."}]}"#;
        let out: ValidateOutput = serde_json::from_str(raw).unwrap();
        assert!(!out.valid);
        assert_eq!(out.diagnostics[0].severity, "error");
    }
}

//! Structural parameter schemas for tools.
//!
//! A [`ParameterSchema`] lists a tool's fields with their JSON types,
//! required-ness and numeric bounds. It is used twice: to validate the
//! arguments a model supplies before a tool runs, and to render the
//! JSON Schema fragment the model sees in the function definition.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// JSON type of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    /// Whether `value` has this JSON type. Integral floats (`5.0`) count as
    /// integers.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

/// One declared field of a tool's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

impl Parameter {
    /// An optional parameter of the given type.
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            description: String::new(),
            required: false,
            default: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Inclusive numeric bounds.
    pub fn range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn min(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    fn bound_json(&self, bound: f64) -> Value {
        if self.ty == ParamType::Integer {
            json!(bound as i64)
        } else {
            json!(bound)
        }
    }

    fn to_property(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.ty.as_str()));
        if !self.description.is_empty() {
            prop.insert("description".into(), json!(self.description));
        }
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.clone());
        }
        if let Some(min) = self.minimum {
            prop.insert("minimum".into(), self.bound_json(min));
        }
        if let Some(max) = self.maximum {
            prop.insert("maximum".into(), self.bound_json(max));
        }
        Value::Object(prop)
    }

    fn check(&self, value: &Value, errors: &mut Vec<String>) {
        if !self.ty.accepts(value) {
            errors.push(format!(
                "Parameter '{}': expected {}, got {}",
                self.name,
                self.ty.as_str(),
                json_type_name(value)
            ));
            return;
        }

        let Some(number) = value.as_f64() else {
            return;
        };
        if let Some(min) = self.minimum
            && number < min
        {
            errors.push(format!(
                "Parameter '{}': must be greater than or equal to {}",
                self.name,
                self.bound_json(min)
            ));
        }
        if let Some(max) = self.maximum
            && number > max
        {
            errors.push(format!(
                "Parameter '{}': must be less than or equal to {}",
                self.name,
                self.bound_json(max)
            ));
        }
    }
}

/// The declared parameters of a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub parameters: Vec<Parameter>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter (builder style).
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Names of the required parameters, in declaration order.
    pub fn required_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Check `params` against the schema. Returns every violation found;
    /// an empty list means the arguments are acceptable. Unknown fields are
    /// ignored.
    pub fn validate(&self, params: &Value) -> Vec<String> {
        let Some(object) = params.as_object() else {
            return vec![format!(
                "Parameters must be a JSON object, got {}",
                json_type_name(params)
            )];
        };

        let mut errors = Vec::new();
        for parameter in &self.parameters {
            match object.get(&parameter.name) {
                None | Some(Value::Null) => {
                    if parameter.required {
                        errors.push(format!("Parameter '{}': field required", parameter.name));
                    }
                }
                Some(value) => parameter.check(value, &mut errors),
            }
        }
        errors
    }

    /// Render as a JSON Schema object: `{type: "object", properties, required}`.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.to_property()))
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_names(),
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_schema() -> ParameterSchema {
        ParameterSchema::new()
            .param(
                Parameter::new("command", ParamType::String)
                    .required()
                    .describe("The shell command to execute"),
            )
            .param(
                Parameter::new("timeout", ParamType::Integer)
                    .default_value(json!(120))
                    .range(1.0, 600.0),
            )
    }

    #[test]
    fn valid_params_pass() {
        let errors = shell_schema().validate(&json!({"command": "ls", "timeout": 30}));
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn missing_required_field() {
        let errors = shell_schema().validate(&json!({"timeout": 30}));
        assert_eq!(errors, vec!["Parameter 'command': field required"]);
    }

    #[test]
    fn null_counts_as_missing() {
        let errors = shell_schema().validate(&json!({"command": null}));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn wrong_type_reported() {
        let errors = shell_schema().validate(&json!({"command": 5}));
        assert_eq!(errors, vec!["Parameter 'command': expected string, got integer"]);
    }

    #[test]
    fn out_of_range_reported() {
        let errors = shell_schema().validate(&json!({"command": "ls", "timeout": 0}));
        assert_eq!(
            errors,
            vec!["Parameter 'timeout': must be greater than or equal to 1"]
        );
        let errors = shell_schema().validate(&json!({"command": "ls", "timeout": 601}));
        assert_eq!(errors, vec!["Parameter 'timeout': must be less than or equal to 600"]);
    }

    #[test]
    fn all_violations_collected() {
        let errors = shell_schema().validate(&json!({"timeout": "soon"}));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn non_object_rejected() {
        let errors = shell_schema().validate(&json!(["ls"]));
        assert_eq!(errors, vec!["Parameters must be a JSON object, got array"]);
    }

    #[test]
    fn integral_float_is_integer() {
        assert!(ParamType::Integer.accepts(&json!(5.0)));
        assert!(!ParamType::Integer.accepts(&json!(5.5)));
    }

    #[test]
    fn unknown_fields_ignored() {
        let errors = shell_schema().validate(&json!({"command": "ls", "extra": true}));
        assert!(errors.is_empty());
    }

    #[test]
    fn json_schema_rendering() {
        let schema = shell_schema().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["command"]));
        assert_eq!(schema["properties"]["command"]["type"], "string");
        assert_eq!(schema["properties"]["timeout"]["minimum"], json!(1));
        assert_eq!(schema["properties"]["timeout"]["maximum"], json!(600));
        assert_eq!(schema["properties"]["timeout"]["default"], json!(120));
    }
}

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{JSONSchema, ValidationError};
use serde_json::Value;
use thiserror::Error;

use super::flows::{
    FlowId, FlowRequest, FlowResponse, output_schema, parse_output, parse_request,
    request_schema,
};

/// First offending field of a rejected request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

#[derive(Debug, Error)]
pub enum RequestValidationError {
    #[error("request schema for {flow} failed to compile: {message}")]
    SchemaCompile { flow: FlowId, message: String },
    #[error("request for {flow} is invalid: {violation}")]
    Violation {
        flow: FlowId,
        violation: FieldViolation,
    },
}

#[derive(Debug, Error)]
pub enum OutputValidationError {
    #[error("output schema for {flow} failed to compile: {message}")]
    SchemaCompile { flow: FlowId, message: String },
    #[error("model output failed schema validation for {flow}: {errors:?}")]
    SchemaViolation { flow: FlowId, errors: Vec<String> },
    #[error("model output for {flow} could not be decoded: {source}")]
    Decode {
        flow: FlowId,
        source: serde_json::Error,
    },
}

pub fn validate_request_value(
    flow: FlowId,
    payload: &Value,
) -> Result<FlowRequest, RequestValidationError> {
    let validator = validator_for(&REQUEST_VALIDATORS, flow).map_err(|message| {
        RequestValidationError::SchemaCompile { flow, message }
    })?;

    if let Err(mut validation_errors) = validator.validate(payload) {
        let violation = validation_errors
            .next()
            .map(violation_from_error)
            .unwrap_or_else(|| FieldViolation {
                field: String::new(),
                message: "request does not match schema".to_string(),
            });
        return Err(RequestValidationError::Violation { flow, violation });
    }

    parse_request(flow, payload.clone()).map_err(|err| RequestValidationError::Violation {
        flow,
        violation: FieldViolation {
            field: String::new(),
            message: err.to_string(),
        },
    })
}

pub fn validate_output_value(
    flow: FlowId,
    payload: &Value,
) -> Result<FlowResponse, OutputValidationError> {
    let validator = validator_for(&OUTPUT_VALIDATORS, flow)
        .map_err(|message| OutputValidationError::SchemaCompile { flow, message })?;

    if let Err(validation_errors) = validator.validate(payload) {
        let errors = validation_errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(OutputValidationError::SchemaViolation { flow, errors });
    }

    parse_output(flow, payload.clone())
        .map_err(|source| OutputValidationError::Decode { flow, source })
}

type ValidatorTable = HashMap<FlowId, Result<JSONSchema, String>>;

static REQUEST_VALIDATORS: LazyLock<ValidatorTable> =
    LazyLock::new(|| compile_all(request_schema));

static OUTPUT_VALIDATORS: LazyLock<ValidatorTable> = LazyLock::new(|| compile_all(output_schema));

fn compile_all(schema_for_flow: fn(FlowId) -> Value) -> ValidatorTable {
    FlowId::ALL
        .into_iter()
        .map(|flow| {
            let compiled =
                JSONSchema::compile(&schema_for_flow(flow)).map_err(|err| err.to_string());
            (flow, compiled)
        })
        .collect()
}

fn validator_for(
    table: &'static ValidatorTable,
    flow: FlowId,
) -> Result<&'static JSONSchema, String> {
    match table.get(&flow) {
        Some(Ok(validator)) => Ok(validator),
        Some(Err(message)) => Err(message.clone()),
        None => Err("no schema registered".to_string()),
    }
}

fn violation_from_error(err: ValidationError<'_>) -> FieldViolation {
    let message = err.to_string();
    let mut path = err.instance_path.clone().into_vec();

    match &err.kind {
        ValidationErrorKind::Required { property } => {
            if let Some(name) = property.as_str() {
                path.push(name.to_string());
            }
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            if let Some(name) = unexpected.first() {
                path.push(name.clone());
            }
        }
        _ => {}
    }

    FieldViolation {
        field: path.join("."),
        message,
    }
}

use actix_web::{error::InternalError, HttpResponse};
use serde::Serialize;
use validator::ValidationErrors;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fields: serde_json::Value,
}

fn bad_request(error: &str, fields: serde_json::Value) -> actix_web::Error {
    InternalError::from_response(
        "",
        HttpResponse::BadRequest().json(ErrorResponse {
            error: error.to_string(),
            fields,
        }),
    )
    .into()
}

/// Per-field messages from a failed `validate()` call
pub fn field_messages(errors: &ValidationErrors) -> serde_json::Map<String, serde_json::Value> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Validation error in field: {}", field))
                })
                .collect();
            (field.to_string(), serde_json::json!({"errors": messages}))
        })
        .collect()
}

/// Flattens validation errors into one line, for service-level checks
pub fn summarize(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = field_messages(errors)
        .into_iter()
        .map(|(field, value)| format!("{}: {}", field, value["errors"]))
        .collect();
    parts.sort();
    parts.join("; ")
}

fn deserialize_message(err_string: &str) -> &'static str {
    if err_string.contains("EOF while parsing") {
        "Request body is empty. Expected JSON payload"
    } else if err_string.contains("unknown variant") {
        "Invalid enum value. Check allowed values for this field"
    } else if err_string.contains("missing field") {
        "Required field is missing"
    } else {
        "Invalid JSON format"
    }
}

fn into_response(err: actix_web_validator::Error) -> actix_web::Error {
    match err {
        actix_web_validator::Error::Validate(validation_errors) => bad_request(
            "Validation failed",
            serde_json::Value::Object(field_messages(&validation_errors)),
        ),
        actix_web_validator::Error::Deserialize(de_err) => bad_request(
            "Request validation failed",
            serde_json::json!({"message": deserialize_message(&de_err.to_string())}),
        ),
        _ => bad_request("Validation failed", serde_json::json!({"message": "Validation error"})),
    }
}

/// JsonConfig with the service's standard error body
pub fn json_config() -> actix_web_validator::JsonConfig {
    actix_web_validator::JsonConfig::default().error_handler(|err, _req| into_response(err))
}

/// QueryConfig with the service's standard error body
pub fn query_config() -> actix_web_validator::QueryConfig {
    actix_web_validator::QueryConfig::default().error_handler(|err, _req| into_response(err))
}

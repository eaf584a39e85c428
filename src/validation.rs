//! Request validation helpers and the `{ success, data, errors }` envelope.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::store::NewProposal;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Response envelope shared by the write endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn failure(errors: Vec<FieldError>) -> Self {
        Self {
            success: false,
            data: None,
            errors,
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Stringify, trim, cap at `max_len` characters and strip `<` / `>`.
///
/// Missing and null values become the empty string.
pub fn sanitize_string(input: Option<&Value>, max_len: usize) -> String {
    let raw = match input {
        None | Some(Value::Null) => return String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let truncated: String = raw.trim().chars().take(max_len).collect();
    truncated.replace(['<', '>'], "").trim().to_string()
}

/// Sanitize each entry of a string array, dropping empties. Non-arrays yield `[]`.
pub fn sanitize_string_array(input: Option<&Value>, max_items: usize) -> Vec<String> {
    match input {
        Some(Value::Array(items)) => items
            .iter()
            .take(max_items)
            .map(|item| sanitize_string(Some(item), 1000))
            .filter(|item| !item.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Read a price as a non-negative whole number.
///
/// Missing, null and blank values mean 0. Numeric strings such as `"1500"`
/// or `" 2e3 "` are accepted; fractions, negatives and other types are not.
pub fn parse_price(input: Option<&Value>) -> Option<i64> {
    let number = match input {
        None | Some(Value::Null) => return Some(0),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return (i >= 0).then_some(i);
            }
            n.as_f64()?
        }
        Some(Value::String(s)) if s.trim().is_empty() => return Some(0),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok()?,
        Some(_) => return None,
    };
    (number.is_finite() && number.fract() == 0.0 && number >= 0.0 && number <= i64::MAX as f64)
        .then_some(number as i64)
}

/// Validate a proposal creation body, collecting every field error.
pub fn validate_new_proposal(body: &Value) -> Result<NewProposal, Vec<FieldError>> {
    let mut errors = Vec::new();

    let project_name = sanitize_string(body.get("projectName"), 255);
    let description = sanitize_string(body.get("description"), 5000);
    let email = sanitize_string(body.get("email"), 255);
    let company = sanitize_string(body.get("company"), 255);
    let phone = sanitize_string(body.get("phone"), 20);
    let mut project_type = sanitize_string(body.get("projectType"), 50);
    if project_type.is_empty() {
        project_type = "unknown".to_string();
    }
    let timeline = sanitize_string(body.get("timeline"), 100);
    let features = sanitize_string_array(body.get("features"), 100);

    if project_name.chars().count() < 3 {
        errors.push(FieldError::new(
            "projectName",
            "Project name required (min 3 characters)",
        ));
    }
    if description.chars().count() < 10 {
        errors.push(FieldError::new(
            "description",
            "Description too short (min 10 characters)",
        ));
    }
    if !is_valid_email(&email) {
        errors.push(FieldError::new("email", "Invalid email address"));
    }

    let price = parse_price(body.get("price"));
    if price.is_none() {
        errors.push(FieldError::new("price", "Price must be a positive number"));
    }

    match price {
        Some(price) if errors.is_empty() => Ok(NewProposal {
            project_name,
            company,
            email,
            phone,
            description,
            project_type,
            timeline,
            features,
            price,
        }),
        _ => Err(errors),
    }
}

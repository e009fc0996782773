use crate::error::{ApiError, FieldError};
use validator::{Validate, ValidationError};

/// ASCII letters and digits only; the empty string does not qualify.
pub fn alphanumeric(value: &str) -> Result<(), ValidationError> {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(ValidationError::new("alphanumeric"))
    }
}

// `birth_date` -> `Birth_Date`, `title` -> `Title`
fn wire_name(field: &str) -> String {
    field
        .split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("_")
}

pub fn validate<T: Validate>(body: &T) -> Result<(), ApiError> {
    let errors = match body.validate() {
        Ok(()) => return Ok(()),
        Err(errors) => errors,
    };
    let mut fields: Vec<(String, Vec<ValidationError>)> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errors)| (field.to_string(), errors.clone()))
        .collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    let list = fields
        .into_iter()
        .flat_map(|(field, errors)| {
            let param = wire_name(&field);
            errors.into_iter().map(move |error| {
                let msg = match error.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid value ({})", error.code),
                };
                FieldError::body(param.clone(), msg)
            })
        })
        .collect();
    Err(ApiError::Validation(list))
}

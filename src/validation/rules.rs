//! Common validation rules shared across request payloads.

use validator::ValidationError;

/// Validates role name format.
///
/// Requirements:
/// - lowercase snake_case: alphanumeric and underscores, starting with a letter
/// - 1-50 characters in length
pub fn validate_role_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.len() > 50 {
        return Err(ValidationError::new("role_name_invalid_length"));
    }

    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(ValidationError::new("role_name_invalid_start"));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ValidationError::new("role_name_invalid_characters"));
    }

    Ok(())
}

/// Validates permission name format.
///
/// Requirements:
/// - dot-namespaced segments, e.g. `jobs.publish`
/// - each segment lowercase snake_case, starting with a letter
/// - 1-100 characters in length
pub fn validate_permission_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.len() > 100 {
        return Err(ValidationError::new("permission_name_invalid_length"));
    }

    for segment in name.split('.') {
        if segment.is_empty() {
            return Err(ValidationError::new("permission_name_empty_segment"));
        }
        if !segment.starts_with(|c: char| c.is_ascii_lowercase()) {
            return Err(ValidationError::new("permission_name_invalid_start"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(ValidationError::new("permission_name_invalid_characters"));
        }
    }

    Ok(())
}

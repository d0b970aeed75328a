//! Configuration validation utilities
//!
//! Checks a loaded rule file for problems that would otherwise only surface
//! halfway through a run: rules that can never match, names that cannot be
//! used as lock file names, destinations without a host.

use crate::endpoint::normalize_path;
use crate::mirrors::MirrorsConfig;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validation result
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate a rule name for use as a lock file name
///
/// # Validation Rules
/// - Name must not be empty and must be ≤ 255 bytes
/// - Cannot contain `/` or null bytes
/// - Cannot start with `-` or `.` (which also rules out `.` and `..`)
///
/// # Examples
/// ```
/// # use rmirr_common::validation::validate_rule_name;
/// assert!(validate_rule_name("projects").is_ok());
/// assert!(validate_rule_name("../etc").is_err());
/// ```
pub fn validate_rule_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Rule name cannot be empty".to_string());
    }

    if name.len() > 255 {
        return Err("Rule name too long (max 255 bytes)".to_string());
    }

    if name.contains('/') {
        return Err("Rule name cannot contain '/'".to_string());
    }

    if name.contains('\0') {
        return Err("Rule name cannot contain null bytes".to_string());
    }

    if name.starts_with('-') {
        return Err("Rule name cannot start with '-'".to_string());
    }

    if name.starts_with('.') {
        return Err("Rule name cannot start with '.'".to_string());
    }

    Ok(())
}

/// Validate an alias name: a relative path below the rule's source path
pub fn validate_alias_name(alias: &str) -> Result<(), String> {
    if alias.is_empty() {
        return Err("Alias name cannot be empty".to_string());
    }

    if alias.starts_with('/') {
        return Err("Alias name must be relative to the source path".to_string());
    }

    if alias.split('/').any(|part| part == "..") {
        return Err("Alias name cannot contain '..'".to_string());
    }

    if normalize_path(alias) == "." {
        return Err("Alias name must name a path below the source path".to_string());
    }

    Ok(())
}

/// Validate a normalized rule file, collecting every problem found
pub fn validate_mirrors(config: &MirrorsConfig) -> ValidationResult {
    let mut errors = Vec::new();

    for (index, rule) in config.mirrors.iter().enumerate() {
        let field = match &rule.name {
            Some(name) => format!("mirrors[{index}] ({name})"),
            None => format!("mirrors[{index}]"),
        };

        if let Some(name) = &rule.name {
            if let Err(e) = validate_rule_name(name) {
                errors.push(ValidationError::new(format!("{field}.name"), e));
            }
        }

        match rule.source.path.as_deref() {
            None => errors.push(ValidationError::new(
                format!("{field}.source"),
                format!("Source '{}' has no path", rule.source),
            )),
            Some(path) if !path.starts_with('/') => errors.push(ValidationError::new(
                format!("{field}.source"),
                format!("Source path '{path}' is not absolute"),
            )),
            Some(_) => {}
        }

        if rule.source.host.is_empty() {
            errors.push(ValidationError::new(
                format!("{field}.source"),
                "Source host cannot be empty",
            ));
        }

        for alias in &rule.alias_names {
            if let Err(e) = validate_alias_name(alias) {
                errors.push(ValidationError::new(format!("{field}.names"), e));
            }
        }

        for destination in &rule.destinations {
            if destination.host.is_empty() {
                errors.push(ValidationError::new(
                    format!("{field}.destinations"),
                    format!("Destination '{destination}' has no host"),
                ));
            }
        }
    }

    for (suite, paths) in &config.suites {
        if paths.iter().any(|p| p.is_empty()) {
            errors.push(ValidationError::new(
                format!("suites.{suite}"),
                "Suite paths cannot be empty",
            ));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

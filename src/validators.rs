/// Input validators
///
/// Every user-supplied string goes through one of these before it reaches
/// the store. They trim, enforce length limits and reject control
/// characters; emails are additionally lower-cased.

use deunicode::deunicode;
use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 3;
const MAX_NAME_LENGTH: usize = 100;
const MAX_TITLE_LENGTH: usize = 200;
const MAX_SLUG_LENGTH: usize = 120;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

/// Validates an email address and returns it trimmed and case-folded
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    // Local part over 64 characters is not deliverable
    if let Some(at_pos) = trimmed.find('@') {
        if at_pos > 64 {
            return Err(ValidationError::InvalidFormat("email".to_string()));
        }
    }

    Ok(trimmed.to_lowercase())
}

/// Validates an optional person name (first or last name)
pub fn is_valid_name(field: &str, name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_NAME_LENGTH));
    }

    if has_suspicious_name_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent(field.to_string()));
    }

    Ok(trimmed.to_string())
}

/// Normalizes an optional name: blank becomes `None`
pub fn optional_name(field: &str, name: Option<&str>) -> Result<Option<String>, ValidationError> {
    match name {
        Some(n) if !n.trim().is_empty() => is_valid_name(field, n).map(Some),
        _ => Ok(None),
    }
}

/// Validates a required free-text field such as a title or question text
pub fn required_text(field: &str, value: Option<&str>) -> Result<String, ValidationError> {
    let trimmed = value.map(str::trim).unwrap_or_default();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }

    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_TITLE_LENGTH));
    }

    if trimmed.contains('\0') {
        return Err(ValidationError::SuspiciousContent(field.to_string()));
    }

    Ok(trimmed.to_string())
}

/// Validates a replacement value for a required field on partial update.
/// `None` means "leave unchanged"; a present value must not be blank.
pub fn updated_text(field: &str, value: Option<&str>) -> Result<Option<String>, ValidationError> {
    match value {
        None => Ok(None),
        Some(v) => required_text(field, Some(v)).map(Some),
    }
}

/// Validates a URL slug: lowercase ASCII letters, digits and single hyphens
pub fn is_valid_slug(slug: &str) -> Result<String, ValidationError> {
    let trimmed = slug.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("slug".to_string()));
    }

    if trimmed.len() > MAX_SLUG_LENGTH {
        return Err(ValidationError::TooLong("slug".to_string(), MAX_SLUG_LENGTH));
    }

    if !SLUG_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("slug".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Derives a slug from a title: "Méditation guidée" -> "meditation-guidee".
/// Non-ASCII text is transliterated first; the result may be empty.
pub fn slugify(title: &str) -> String {
    let ascii = deunicode(title);
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_hyphen = false;

    for c in ascii.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug.truncate(MAX_SLUG_LENGTH);
    slug.trim_end_matches('-').to_string()
}

/// Slug for a formation created without one. Titles that leave nothing
/// after transliteration get a random suffix instead.
pub fn derive_slug(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        format!("formation-{}", &Uuid::new_v4().simple().to_string()[..8])
    } else {
        slug
    }
}

/// Rejects negative values for durations, scores and counts
pub fn non_negative(field: &str, value: Option<i32>) -> Result<Option<i32>, ValidationError> {
    match value {
        Some(v) if v < 0 => Err(ValidationError::InvalidFormat(field.to_string())),
        other => Ok(other),
    }
}

fn has_suspicious_name_patterns(name: &str) -> bool {
    if name.chars().any(|c| c.is_control()) {
        return true;
    }

    let special_char_count = name
        .chars()
        .filter(|c| {
            !c.is_alphanumeric() && !c.is_whitespace() && !matches!(*c, '-' | '.' | '\'')
        })
        .count();

    special_char_count > 3
}

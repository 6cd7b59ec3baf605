use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

pub const PHONE_NUMBER_MESSAGE: &str = "No es un número de teléfono válido";
pub const DOCUMENT_NUMBER_MESSAGE: &str = "No es un número de documento válido";
pub const USERNAME_TAKEN_MESSAGE: &str = "A user with that username already exists.";

static PHONE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^(3|6)\d{9}$").unwrap()
});

static DNI_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^\d{7,10}$").unwrap()
});

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[\w.@+-]+$").unwrap()
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap()
});

/// Stable machine-readable code attached to every field error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Required,
    Blank,
    Invalid,
    MaxLength,
    MinValue,
    Unique,
    #[serde(rename = "invalid_phonenumber")]
    InvalidPhoneNumber,
    #[serde(rename = "invalid_dni")]
    InvalidDocumentNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct FieldError {
    pub code: ErrorCode,
    pub message: String,
}

impl FieldError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn required() -> Self {
        Self::new(ErrorCode::Required, "This field is required.")
    }

    pub fn blank() -> Self {
        Self::new(ErrorCode::Blank, "This field may not be blank.")
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Invalid, message)
    }

    pub fn max_length(limit: usize) -> Self {
        Self::new(
            ErrorCode::MaxLength,
            format!("Ensure this field has no more than {limit} characters."),
        )
    }

    pub fn min_value(limit: i64) -> Self {
        Self::new(
            ErrorCode::MinValue,
            format!("Ensure this value is greater than or equal to {limit}."),
        )
    }

    pub fn username_taken() -> Self {
        Self::new(ErrorCode::Unique, USERNAME_TAKEN_MESSAGE)
    }

    pub fn invalid_phone_number() -> Self {
        Self::new(ErrorCode::InvalidPhoneNumber, PHONE_NUMBER_MESSAGE)
    }

    pub fn invalid_document_number() -> Self {
        Self::new(ErrorCode::InvalidDocumentNumber, DOCUMENT_NUMBER_MESSAGE)
    }
}

/// Field-keyed collection of validation failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[serde(transparent)]
#[error("invalid input on {} field(s)", .fields.len())]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, Vec<FieldError>>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, error: FieldError) {
        self.fields.entry(field).or_default().push(error);
    }

    pub fn extend(&mut self, field: &'static str, errors: Vec<FieldError>) {
        for error in errors {
            self.add(field, error);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[FieldError]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn has_code(&self, field: &str, code: ErrorCode) -> bool {
        self.get(field)
            .is_some_and(|errors| errors.iter().any(|e| e.code == code))
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// Integer input as it arrives on the wire. HTML forms post numbers as
/// strings, so both shapes are accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IntegerInput {
    Number(i64),
    Text(String),
    Other(serde_json::Value),
}

impl IntegerInput {
    pub fn to_i64(&self) -> Result<i64, FieldError> {
        match self {
            IntegerInput::Number(n) => Ok(*n),
            IntegerInput::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| FieldError::invalid("A valid integer is required.")),
            IntegerInput::Other(_) => Err(FieldError::invalid("A valid integer is required.")),
        }
    }
}

impl From<i64> for IntegerInput {
    fn from(value: i64) -> Self {
        IntegerInput::Number(value)
    }
}

/// Text input as it arrives on the wire. A non-string value is kept so it
/// can be reported against its own field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextInput {
    Text(String),
    Other(serde_json::Value),
}

impl TextInput {
    pub fn into_string(self) -> Result<String, FieldError> {
        match self {
            TextInput::Text(s) => Ok(s),
            TextInput::Other(_) => Err(FieldError::invalid("Not a valid string.")),
        }
    }
}

impl From<&str> for TextInput {
    fn from(value: &str) -> Self {
        TextInput::Text(value.to_string())
    }
}

impl From<String> for TextInput {
    fn from(value: String) -> Self {
        TextInput::Text(value)
    }
}

fn positive_and_matching(
    value: i64,
    pattern: &Regex,
    on_mismatch: fn() -> FieldError,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if value < 0 {
        errors.push(FieldError::min_value(0));
    }
    if !pattern.is_match(&value.to_string()) {
        errors.push(on_mismatch());
    }
    errors
}

/// A 10-digit phone number starting with 3 or 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PhoneNumber(i64);

impl PhoneNumber {
    pub fn parse(value: i64) -> Result<Self, Vec<FieldError>> {
        let errors =
            positive_and_matching(value, &PHONE_NUMBER_RE, FieldError::invalid_phone_number);
        if errors.is_empty() { Ok(Self(value)) } else { Err(errors) }
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for PhoneNumber {
    type Error = FieldError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::parse(value).map_err(|_| FieldError::invalid_phone_number())
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// National identity document number: 7 to 10 digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Dni(i64);

impl Dni {
    pub fn parse(value: i64) -> Result<Self, Vec<FieldError>> {
        let errors =
            positive_and_matching(value, &DNI_RE, FieldError::invalid_document_number);
        if errors.is_empty() { Ok(Self(value)) } else { Err(errors) }
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Dni {
    type Error = FieldError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::parse(value).map_err(|_| FieldError::invalid_document_number())
    }
}

impl fmt::Display for Dni {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const INVALID_USERNAME_MESSAGE: &str = "Enter a valid username. \
    This value may contain only letters, numbers, and @/./+/-/_ characters.";

pub fn validate_username(value: &str) -> Result<(), FieldError> {
    if USERNAME_RE.is_match(value) {
        Ok(())
    } else {
        Err(FieldError::invalid(INVALID_USERNAME_MESSAGE))
    }
}

pub fn validate_email(value: &str) -> Result<(), FieldError> {
    if EMAIL_RE.is_match(value) {
        Ok(())
    } else {
        Err(FieldError::invalid("Enter a valid email address."))
    }
}

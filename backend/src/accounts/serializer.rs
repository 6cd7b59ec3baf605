use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::accounts::password::PasswordHasher;
use crate::accounts::validators::{
    Dni, FieldError, IntegerInput, PhoneNumber, TextInput, ValidationErrors, validate_email,
    validate_username,
};
use crate::clock::unix_now;
use crate::db::models::{Identity, User};
use crate::db::repo;
use crate::error::ApiError;

const NAME_MAX_LENGTH: usize = 150;
const EMAIL_MAX_LENGTH: usize = 254;

/// Outward representation of a user. Never carries the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserOut {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub dni: i64,
    pub phone_number: i64,
}

impl From<&User> for UserOut {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.identity.username.clone(),
            first_name: user.identity.first_name.clone(),
            last_name: user.identity.last_name.clone(),
            email: user.identity.email.clone(),
            dni: user.dni.get(),
            phone_number: user.phone_number.get(),
        }
    }
}

/// Incoming user payload. Every key is optional at the wire level; create
/// requires all of them, update applies whichever are present.
#[derive(Default, Deserialize)]
pub struct UserPayload {
    pub username: Option<TextInput>,
    pub first_name: Option<TextInput>,
    pub last_name: Option<TextInput>,
    pub email: Option<TextInput>,
    pub dni: Option<IntegerInput>,
    pub phone_number: Option<IntegerInput>,
    pub password: Option<TextInput>,
}

/// Validated data for a new account.
pub struct NewUser {
    pub identity: Identity,
    pub dni: Dni,
    pub phone_number: PhoneNumber,
    pub password: String,
}

/// Validated partial update. `None` leaves the stored value untouched.
#[derive(Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub dni: Option<Dni>,
    pub phone_number: Option<PhoneNumber>,
    pub password: Option<String>,
}

struct FieldCleaner {
    errors: ValidationErrors,
    required: bool,
}

impl FieldCleaner {
    fn new(required: bool) -> Self {
        Self {
            errors: ValidationErrors::default(),
            required,
        }
    }

    fn present<T>(&mut self, field: &'static str, value: Option<T>) -> Option<T> {
        if value.is_none() && self.required {
            self.errors.add(field, FieldError::required());
        }
        value
    }

    fn string(&mut self, field: &'static str, value: Option<TextInput>) -> Option<String> {
        let value = self.present(field, value)?;
        match value.into_string() {
            Ok(value) => Some(value),
            Err(e) => {
                self.errors.add(field, e);
                None
            }
        }
    }

    fn text(
        &mut self,
        field: &'static str,
        value: Option<TextInput>,
        max_length: usize,
    ) -> Option<String> {
        let value = self.string(field, value)?;
        let value = value.trim();
        if value.is_empty() {
            self.errors.add(field, FieldError::blank());
            return None;
        }
        if value.chars().count() > max_length {
            self.errors.add(field, FieldError::max_length(max_length));
            return None;
        }
        Some(value.to_string())
    }

    fn checked_text(
        &mut self,
        field: &'static str,
        value: Option<TextInput>,
        max_length: usize,
        check: fn(&str) -> Result<(), FieldError>,
    ) -> Option<String> {
        let value = self.text(field, value, max_length)?;
        match check(&value) {
            Ok(()) => Some(value),
            Err(e) => {
                self.errors.add(field, e);
                None
            }
        }
    }

    // Passwords are kept verbatim, surrounding whitespace included.
    fn password(&mut self, value: Option<TextInput>) -> Option<String> {
        let value = self.string("password", value)?;
        if value.trim().is_empty() {
            self.errors.add("password", FieldError::blank());
            return None;
        }
        Some(value)
    }

    fn integer<T>(
        &mut self,
        field: &'static str,
        value: Option<IntegerInput>,
        parse: fn(i64) -> Result<T, Vec<FieldError>>,
    ) -> Option<T> {
        let value = self.present(field, value)?;
        let number = match value.to_i64() {
            Ok(number) => number,
            Err(e) => {
                self.errors.add(field, e);
                return None;
            }
        };
        match parse(number) {
            Ok(parsed) => Some(parsed),
            Err(errors) => {
                self.errors.extend(field, errors);
                None
            }
        }
    }
}

impl UserPayload {
    fn clean(self, required: bool) -> Result<UserChanges, ValidationErrors> {
        let mut cleaner = FieldCleaner::new(required);

        let changes = UserChanges {
            username: cleaner.checked_text(
                "username",
                self.username,
                NAME_MAX_LENGTH,
                validate_username,
            ),
            first_name: cleaner.text("first_name", self.first_name, NAME_MAX_LENGTH),
            last_name: cleaner.text("last_name", self.last_name, NAME_MAX_LENGTH),
            email: cleaner.checked_text("email", self.email, EMAIL_MAX_LENGTH, validate_email),
            dni: cleaner.integer("dni", self.dni, Dni::parse),
            phone_number: cleaner.integer(
                "phone_number",
                self.phone_number,
                PhoneNumber::parse,
            ),
            password: cleaner.password(self.password),
        };

        cleaner.errors.into_result()?;
        Ok(changes)
    }

    /// Field-level validation for account creation; every key is required.
    pub fn validate_for_create(self) -> Result<NewUser, ValidationErrors> {
        let changes = self.clean(true)?;

        match changes {
            UserChanges {
                username: Some(username),
                first_name: Some(first_name),
                last_name: Some(last_name),
                email: Some(email),
                dni: Some(dni),
                phone_number: Some(phone_number),
                password: Some(password),
            } => Ok(NewUser {
                identity: Identity {
                    username,
                    first_name,
                    last_name,
                    email,
                },
                dni,
                phone_number,
                password,
            }),
            // clean(true) records `required` for every missing key
            _ => Err(ValidationErrors::default()),
        }
    }

    /// Field-level validation for a partial update.
    pub fn validate_for_update(self) -> Result<UserChanges, ValidationErrors> {
        self.clean(false)
    }
}

impl UserChanges {
    /// Merges the supplied fields into `user`. A new password is hashed
    /// before it is stored.
    pub fn apply(self, user: &mut User, hasher: &PasswordHasher) -> Result<(), ApiError> {
        if let Some(password) = self.password {
            user.password = hasher.hash(&password)?;
        }
        if let Some(username) = self.username {
            user.identity.username = username;
        }
        if let Some(first_name) = self.first_name {
            user.identity.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.identity.last_name = last_name;
        }
        if let Some(email) = self.email {
            user.identity.email = email;
        }
        if let Some(dni) = self.dni {
            user.dni = dni;
        }
        if let Some(phone_number) = self.phone_number {
            user.phone_number = phone_number;
        }
        Ok(())
    }
}

async fn check_unique(
    pool: &SqlitePool,
    username: Option<&str>,
    dni: Option<Dni>,
    exclude_id: Option<i64>,
) -> Result<(), ApiError> {
    let mut errors = ValidationErrors::default();

    if let Some(username) = username
        && repo::username_taken(pool, username, exclude_id).await?
    {
        errors.add("username", FieldError::username_taken());
    }
    if let Some(dni) = dni
        && repo::dni_taken(pool, dni, exclude_id).await?
    {
        errors.add("dni", FieldError::invalid_document_number());
    }

    errors.into_result()?;
    Ok(())
}

/// Validates the payload, hashes the password and stores a new account.
pub async fn create_user(
    pool: &SqlitePool,
    hasher: &PasswordHasher,
    payload: UserPayload,
) -> Result<User, ApiError> {
    let new_user = payload.validate_for_create()?;
    check_unique(pool, Some(&new_user.identity.username), Some(new_user.dni), None).await?;

    let password_hash = hasher.hash(&new_user.password)?;
    let user = repo::insert_user(
        pool,
        &new_user.identity,
        new_user.dni,
        new_user.phone_number,
        &password_hash,
        unix_now(),
    )
    .await?;

    info!(user_id = user.id, username = %user.identity.username, "user created");
    Ok(user)
}

/// Applies a partial payload to an existing account and persists it.
pub async fn update_user(
    pool: &SqlitePool,
    hasher: &PasswordHasher,
    mut user: User,
    payload: UserPayload,
) -> Result<User, ApiError> {
    let changes = payload.validate_for_update()?;
    check_unique(pool, changes.username.as_deref(), changes.dni, Some(user.id)).await?;

    let password_changed = changes.password.is_some();
    changes.apply(&mut user, hasher)?;
    repo::update_user(pool, &user).await?;

    info!(user_id = user.id, password_changed, "user updated");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::fixtures::{create_jdoe, jdoe_payload};
    use crate::accounts::password::authenticate;
    use crate::accounts::validators::ErrorCode;
    use crate::db::test_pool;

    fn expect_validation(result: Result<User, ApiError>) -> ValidationErrors {
        match result {
            Err(ApiError::Validation(errors)) => errors,
            Err(other) => panic!("expected validation error, got {other:?}"),
            Ok(user) => panic!("expected validation error, got user {}", user.id),
        }
    }

    #[test]
    fn test_create_requires_every_field() {
        let errors = UserPayload::default().validate_for_create().err().unwrap();
        for field in [
            "username",
            "first_name",
            "last_name",
            "email",
            "dni",
            "phone_number",
            "password",
        ] {
            assert!(errors.has_code(field, ErrorCode::Required), "{field} should be required");
        }
    }

    #[test]
    fn test_create_collects_errors_across_fields() {
        let payload = UserPayload {
            dni: Some(IntegerInput::Number(12)),
            phone_number: Some(IntegerInput::Number(1234567890)),
            username: Some("bad name".into()),
            ..jdoe_payload()
        };
        let errors = payload.validate_for_create().err().unwrap();

        assert!(errors.has_code("dni", ErrorCode::InvalidDocumentNumber));
        assert!(errors.has_code("phone_number", ErrorCode::InvalidPhoneNumber));
        assert!(errors.has_code("username", ErrorCode::Invalid));
        assert!(errors.get("email").is_none());
    }

    #[test]
    fn test_blank_and_overlong_text() {
        let payload = UserPayload {
            first_name: Some("   ".into()),
            last_name: Some("x".repeat(151).into()),
            password: Some("  ".into()),
            ..jdoe_payload()
        };
        let errors = payload.validate_for_create().err().unwrap();

        assert!(errors.has_code("first_name", ErrorCode::Blank));
        assert!(errors.has_code("last_name", ErrorCode::MaxLength));
        assert!(errors.has_code("password", ErrorCode::Blank));
    }

    #[test]
    fn test_update_only_validates_supplied_fields() {
        let changes = UserPayload {
            first_name: Some(" Janet ".into()),
            ..UserPayload::default()
        }
        .validate_for_update()
        .unwrap();

        assert_eq!(changes.first_name.as_deref(), Some("Janet"));
        assert!(changes.username.is_none());
        assert!(changes.password.is_none());
    }

    #[tokio::test]
    async fn test_create_scenario() {
        let pool = test_pool().await;
        let hasher = PasswordHasher::default();

        let user = create_user(&pool, &hasher, jdoe_payload()).await.unwrap();
        let out = UserOut::from(&user);
        assert_eq!(
            out,
            UserOut {
                id: user.id,
                username: "jdoe".into(),
                first_name: "Jane".into(),
                last_name: "Doe".into(),
                email: "j@x.com".into(),
                dni: 1234567,
                phone_number: 3001234567,
            }
        );

        let duplicate = UserPayload {
            username: Some("jdoe2".into()),
            ..jdoe_payload()
        };
        let errors = expect_validation(create_user(&pool, &hasher, duplicate).await);
        assert!(errors.has_code("dni", ErrorCode::InvalidDocumentNumber));
        assert_eq!(errors.get("dni").unwrap()[0].message, "No es un número de documento válido");

        let bad_phone = UserPayload {
            username: Some("jdoe3".into()),
            dni: Some(IntegerInput::Number(7654321)),
            phone_number: Some(IntegerInput::Number(1234567890)),
            ..jdoe_payload()
        };
        let errors = expect_validation(create_user(&pool, &hasher, bad_phone).await);
        assert!(errors.has_code("phone_number", ErrorCode::InvalidPhoneNumber));
        assert_eq!(repo::list_users(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_username() {
        let pool = test_pool().await;
        let hasher = PasswordHasher::default();
        create_jdoe(&pool, &hasher).await;

        let payload = UserPayload {
            dni: Some(IntegerInput::Number(7654321)),
            ..jdoe_payload()
        };
        let errors = expect_validation(create_user(&pool, &hasher, payload).await);
        assert!(errors.has_code("username", ErrorCode::Unique));
    }

    #[tokio::test]
    async fn test_output_never_exposes_password() {
        let pool = test_pool().await;
        let hasher = PasswordHasher::default();
        let user = create_jdoe(&pool, &hasher).await;

        let body = serde_json::to_value(UserOut::from(&user)).unwrap();
        let object = body.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["dni", "email", "first_name", "id", "last_name", "phone_number", "username"]
        );

        let rendered = body.to_string();
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains(&user.password));
    }

    #[tokio::test]
    async fn test_password_update_rotates_credential() {
        let pool = test_pool().await;
        let hasher = PasswordHasher::default();
        let user = create_jdoe(&pool, &hasher).await;

        let payload = UserPayload {
            password: Some("new-secret".into()),
            ..UserPayload::default()
        };
        let updated = update_user(&pool, &hasher, user, payload).await.unwrap();
        assert!(!updated.password.contains("new-secret"));

        assert!(authenticate(&pool, &hasher, "jdoe", "secret").await.is_err());
        assert!(authenticate(&pool, &hasher, "jdoe", "new-secret").await.is_ok());
    }

    #[tokio::test]
    async fn test_other_updates_keep_credential() {
        let pool = test_pool().await;
        let hasher = PasswordHasher::default();
        let user = create_jdoe(&pool, &hasher).await;
        let original_hash = user.password.clone();

        let payload = UserPayload {
            last_name: Some("Roe".into()),
            phone_number: Some(IntegerInput::Text("6019998877".into())),
            ..UserPayload::default()
        };
        let updated = update_user(&pool, &hasher, user, payload).await.unwrap();

        let stored = repo::get_user(&pool, updated.id).await.unwrap().unwrap();
        assert_eq!(stored.password, original_hash);
        assert_eq!(stored.identity.last_name, "Roe");
        assert_eq!(stored.identity.first_name, "Jane");
        assert_eq!(stored.phone_number.get(), 6019998877);
        assert!(authenticate(&pool, &hasher, "jdoe", "secret").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_allows_own_dni_but_not_anothers() {
        let pool = test_pool().await;
        let hasher = PasswordHasher::default();
        let jdoe = create_jdoe(&pool, &hasher).await;
        let other = create_user(
            &pool,
            &hasher,
            UserPayload {
                username: Some("other".into()),
                dni: Some(IntegerInput::Number(7654321)),
                ..jdoe_payload()
            },
        )
        .await
        .unwrap();

        let same_dni = UserPayload {
            dni: Some(IntegerInput::Number(1234567)),
            ..UserPayload::default()
        };
        let jdoe = update_user(&pool, &hasher, jdoe, same_dni).await.unwrap();

        let taken = UserPayload {
            dni: Some(IntegerInput::Number(1234567)),
            ..UserPayload::default()
        };
        let errors = expect_validation(update_user(&pool, &hasher, other.clone(), taken).await);
        assert!(errors.has_code("dni", ErrorCode::InvalidDocumentNumber));

        let stored = repo::get_user(&pool, other.id).await.unwrap().unwrap();
        assert_eq!(stored.dni.get(), 7654321);
        assert_eq!(jdoe.dni.get(), 1234567);
    }

    #[tokio::test]
    async fn test_invalid_update_writes_nothing() {
        let pool = test_pool().await;
        let hasher = PasswordHasher::default();
        let user = create_jdoe(&pool, &hasher).await;

        let payload = UserPayload {
            first_name: Some("Janet".into()),
            phone_number: Some(IntegerInput::Number(5001234567)),
            ..UserPayload::default()
        };
        let errors = expect_validation(update_user(&pool, &hasher, user.clone(), payload).await);
        assert!(errors.has_code("phone_number", ErrorCode::InvalidPhoneNumber));

        let stored = repo::get_user(&pool, user.id).await.unwrap().unwrap();
        assert_eq!(stored.identity.first_name, "Jane");
    }
}

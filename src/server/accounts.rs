//! Admin accounts stored in the `admins` collection.
//!
//! Passwords are kept as bcrypt hashes. Hashing is deliberately slow, so it
//! runs on the blocking pool rather than on the request task.
//!
//! The configured admin (`--admin-username` / `--admin-password`) keeps
//! working alongside stored accounts; login tries it first.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::{AccountError, FormError, StoreError};
use crate::store::{Document, DocumentStore, ADMINS, ID_FIELD};

use super::handlers::{is_plausible_email, unix_now, AppState, HandlerError, MessageResponse};

/// Default bcrypt cost factor.
pub const DEFAULT_PASSWORD_COST: u32 = bcrypt::DEFAULT_COST;

/// Shortest password accepted for a stored admin.
pub const MIN_PASSWORD_LEN: usize = 8;

const MAX_NAME_LEN: usize = 200;
const MAX_EMAIL_LEN: usize = 254;
const MAX_PASSWORD_LEN: usize = 72;

/// Field holding the bcrypt hash.
const PASSWORD_FIELD: &str = "password";

// =============================================================================
// Password Hashing
// =============================================================================

/// bcrypt hashing at a fixed cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_PASSWORD_COST)
    }
}

impl PasswordHasher {
    /// Hasher with the given bcrypt cost (4-31).
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash `password` on the blocking pool.
    pub async fn hash(&self, password: String) -> Result<String, AccountError> {
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AccountError::Hash(e.to_string()))?
            .map_err(|e| AccountError::Hash(e.to_string()))
    }

    /// Check `password` against a stored hash on the blocking pool.
    pub async fn verify(&self, password: String, hash: String) -> Result<bool, AccountError> {
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AccountError::Hash(e.to_string()))?
            .map_err(|e| AccountError::Hash(e.to_string()))
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Body of `POST /admin/add`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAdmin {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl NewAdmin {
    pub fn validate(&self) -> Result<(), FormError> {
        check_name(&self.name)?;
        check_email(&self.email)?;
        check_password("password", &self.password)
    }
}

/// Body of `PATCH /admin/update/{id}`. Blank fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

impl AdminUpdate {
    /// Drop blank fields and validate the rest.
    pub fn normalized(self) -> Result<Self, HandlerError> {
        let update = Self {
            name: non_blank(self.name),
            email: non_blank(self.email),
            new_password: self.new_password.filter(|p| !p.is_empty()),
        };
        if update.name.is_none() && update.email.is_none() && update.new_password.is_none() {
            return Err(AccountError::NothingToUpdate.into());
        }

        if let Some(name) = &update.name {
            check_name(name)?;
        }
        if let Some(email) = &update.email {
            check_email(email)?;
        }
        if let Some(password) = &update.new_password {
            check_password("new_password", password)?;
        }
        Ok(update)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_name(name: &str) -> Result<(), FormError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FormError::MissingField("name"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(FormError::TooLong {
            field: "name",
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), FormError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(FormError::MissingField("email"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(FormError::TooLong {
            field: "email",
            max: MAX_EMAIL_LEN,
        });
    }
    if !is_plausible_email(email) {
        return Err(FormError::InvalidEmail);
    }
    Ok(())
}

// bcrypt only reads the first 72 bytes
fn check_password(field: &'static str, password: &str) -> Result<(), FormError> {
    if password.is_empty() {
        return Err(FormError::MissingField(field));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(FormError::TooShort {
            field,
            min: MIN_PASSWORD_LEN,
        });
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(FormError::TooLong {
            field,
            max: MAX_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Response from `POST /admin/add`.
#[derive(Debug, Serialize)]
pub struct AdminCreated {
    pub message: String,
    pub admin_id: String,
}

// =============================================================================
// Lookups
// =============================================================================

/// Every stored admin. A store without the `admins` collection has none.
async fn list_admins<S: DocumentStore>(store: &S) -> Result<Vec<Document>, HandlerError> {
    match store.list(ADMINS).await {
        Ok(admins) => Ok(admins),
        Err(StoreError::UnknownCollection(_)) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn email_matches(doc: &Document, email: &str) -> bool {
    doc.get("email")
        .and_then(Value::as_str)
        .is_some_and(|stored| stored.eq_ignore_ascii_case(email))
}

/// Stored admin whose email matches, ignoring case.
pub async fn find_admin<S: DocumentStore>(
    store: &S,
    email: &str,
) -> Result<Option<Document>, HandlerError> {
    let email = email.trim();
    let admins = list_admins(store).await?;
    Ok(admins.into_iter().find(|doc| email_matches(doc, email)))
}

/// Outcome of checking a login against the stored accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredLogin {
    /// Password matched; carries the account email
    Verified(String),
    /// Accounts exist but none matched
    Rejected,
    /// The `admins` collection is empty
    NoAccounts,
}

/// Check `email` and `password` against the stored admin accounts.
pub async fn check_stored_login<S: DocumentStore>(
    store: &S,
    hasher: &PasswordHasher,
    email: &str,
    password: &str,
) -> Result<StoredLogin, HandlerError> {
    let admins = list_admins(store).await?;
    if admins.is_empty() {
        return Ok(StoredLogin::NoAccounts);
    }

    let email = email.trim();
    let account = admins.iter().find(|doc| email_matches(doc, email));
    let Some(account) = account else {
        return Ok(StoredLogin::Rejected);
    };
    let (Some(stored_email), Some(hash)) = (
        account.get("email").and_then(Value::as_str),
        account.get(PASSWORD_FIELD).and_then(Value::as_str),
    ) else {
        return Ok(StoredLogin::Rejected);
    };

    if hasher
        .verify(password.to_string(), hash.to_string())
        .await?
    {
        Ok(StoredLogin::Verified(stored_email.to_string()))
    } else {
        Ok(StoredLogin::Rejected)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a stored admin account.
///
/// # Endpoint
///
/// `POST /admin/add` with JSON body `{"name", "email", "password"}`
///
/// # Response
///
/// `201 Created` with `{"message": "Admin added successfully", "admin_id": "..."}`
///
/// # Errors
///
/// - `400 Bad Request`: Missing name, implausible email or short password
/// - `409 Conflict`: An admin with this email already exists
pub async fn admin_add_handler<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Json(admin): Json<NewAdmin>,
) -> Result<(StatusCode, Json<AdminCreated>), HandlerError> {
    admin.validate()?;
    let email = admin.email.trim().to_string();

    if find_admin(&*state.store, &email).await?.is_some() {
        return Err(AccountError::EmailTaken(email).into());
    }

    let hash = state.passwords.hash(admin.password).await?;
    let mut doc = Document::new();
    doc.insert("name".into(), json!(admin.name.trim()));
    doc.insert("email".into(), json!(email));
    doc.insert(PASSWORD_FIELD.into(), json!(hash));
    doc.insert("created_at".into(), json!(unix_now()));

    let stored = state.store.insert(ADMINS, doc).await?;
    let admin_id = stored
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    info!(admin_id = %admin_id, email = %email, "Admin added");
    Ok((
        StatusCode::CREATED,
        Json(AdminCreated {
            message: "Admin added successfully".to_string(),
            admin_id,
        }),
    ))
}

/// Change a stored admin's name, email or password.
///
/// # Endpoint
///
/// `PATCH /admin/update/{id}` with JSON body `{"name"?, "email"?, "new_password"?}`
///
/// # Errors
///
/// - `400 Bad Request`: Nothing to update, invalid field or malformed id
/// - `404 Not Found`: No such admin
/// - `409 Conflict`: The new email belongs to another admin
pub async fn admin_update_handler<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    Json(update): Json<AdminUpdate>,
) -> Result<Json<MessageResponse>, HandlerError> {
    let update = update.normalized()?;
    let current = state.store.get(ADMINS, &id).await?;

    let mut changes = Document::new();
    if let Some(email) = update.email {
        if let Some(other) = find_admin(&*state.store, &email).await? {
            if other.get(ID_FIELD) != current.get(ID_FIELD) {
                return Err(AccountError::EmailTaken(email).into());
            }
        }
        changes.insert("email".into(), json!(email));
    }
    if let Some(name) = update.name {
        changes.insert("name".into(), json!(name));
    }
    if let Some(password) = update.new_password {
        changes.insert(PASSWORD_FIELD.into(), json!(state.passwords.hash(password).await?));
    }
    changes.insert("updated_at".into(), json!(unix_now()));

    state.store.update(ADMINS, &id, changes).await?;
    info!(admin_id = %id, "Admin updated");
    Ok(Json(MessageResponse::new("Admin updated successfully")))
}

// =============================================================================
// Tests
// =============================================================================

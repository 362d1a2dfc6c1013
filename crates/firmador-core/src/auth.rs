//! Authenticated-user state
//!
//! The session is an explicit value handed to whatever needs it. It is read
//! from disk once at startup; a file that does not match the schema is an
//! error, never a silent default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

use crate::error::{FieldErrors, RemoteError};
use crate::remote::Authenticator;
use crate::types::{ListScope, Role};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to access session state: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed session state: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// The server refused the credentials; carries its message
    #[error("Login rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Remote(RemoteError),
}

/// Username (or email) and password as typed
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.username.trim().is_empty() {
            errors.add("username", "The user name is required.");
        }
        if self.password.is_empty() {
            errors.add("password", "The password is required.");
        }
        errors.into_result()
    }
}

/// Who is signed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionState {
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl SessionState {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
            token: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Administrators see every document; everyone else sees their own
    pub fn scope(&self) -> ListScope {
        if self.is_admin() {
            ListScope::All
        } else {
            ListScope::Owner(self.email.clone())
        }
    }

    fn check(&self) -> Result<(), StateError> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(StateError::Malformed("email is empty".to_string()));
        }
        if !email.contains('@') {
            return Err(StateError::Malformed(format!(
                "email {:?} is not an address",
                email
            )));
        }
        Ok(())
    }

    /// Parse and validate persisted JSON
    pub fn from_json(raw: &str) -> Result<Self, StateError> {
        let state: SessionState =
            serde_json::from_str(raw).map_err(|e| StateError::Malformed(e.to_string()))?;
        state.check()?;
        Ok(state)
    }

    /// Read the persisted session, `None` when nobody is signed in
    pub fn load(path: &Path) -> Result<Option<Self>, StateError> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        self.check()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json =
            serde_json::to_string_pretty(self).map_err(|e| StateError::Malformed(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Forget the persisted session. Missing files are fine.
    pub fn clear(path: &Path) -> Result<(), StateError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Validate the form, then authenticate against the remote service
pub async fn login(
    authenticator: &dyn Authenticator,
    credentials: &Credentials,
) -> Result<SessionState, LoginError> {
    credentials.validate().map_err(LoginError::Validation)?;

    tracing::info!(username = %credentials.username, "Logging in");
    authenticator
        .login(credentials)
        .await
        .map_err(login_failure)
}

/// Authenticate with a one-time link token
pub async fn login_with_token(
    authenticator: &dyn Authenticator,
    token: &str,
) -> Result<SessionState, LoginError> {
    if token.trim().is_empty() {
        let mut errors = FieldErrors::new();
        errors.add("token", "The access token is required.");
        return Err(LoginError::Validation(errors));
    }

    authenticator
        .login_with_token(token)
        .await
        .map_err(login_failure)
}

fn login_failure(err: RemoteError) -> LoginError {
    match err {
        RemoteError::Status { status, body } if (400..500).contains(&status) => {
            LoginError::Rejected(server_message(&body))
        }
        other => {
            tracing::error!("Login failed: {}", other);
            LoginError::Remote(other)
        }
    }
}

/// The auth service wraps its reason in `{"message": ...}`
pub(crate) fn server_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct FakeAuth {
        result: Result<SessionState, RemoteError>,
    }

    #[async_trait]
    impl Authenticator for FakeAuth {
        async fn login(&self, _credentials: &Credentials) -> Result<SessionState, RemoteError> {
            self.result.clone()
        }

        async fn login_with_token(&self, _token: &str) -> Result<SessionState, RemoteError> {
            self.result.clone()
        }
    }

    #[test]
    fn test_scope_by_role() {
        let admin = SessionState::new("admin@firmador.ec", Role::Admin);
        assert_eq!(admin.scope(), ListScope::All);

        let user = SessionState::new("ana@firmador.ec", Role::User);
        assert_eq!(user.scope(), ListScope::Owner("ana@firmador.ec".into()));
    }

    #[test]
    fn test_rejects_malformed_state() {
        assert!(matches!(
            SessionState::from_json("{not json"),
            Err(StateError::Malformed(_))
        ));
        assert!(matches!(
            SessionState::from_json(r#"{"email":"","role":"user"}"#),
            Err(StateError::Malformed(_))
        ));
        assert!(matches!(
            SessionState::from_json(r#"{"email":"ana@firmador.ec","role":"root"}"#),
            Err(StateError::Malformed(_))
        ));
        assert!(matches!(
            SessionState::from_json(r#"{"email":"ana@firmador.ec","role":"user","isAdmin":true}"#),
            Err(StateError::Malformed(_))
        ));
        assert!(matches!(
            SessionState::from_json(r#"{"email":"ana","role":"user"}"#),
            Err(StateError::Malformed(_))
        ));
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        assert_eq!(SessionState::load(&path).unwrap(), None);

        let mut state = SessionState::new("ana@firmador.ec", Role::User);
        state.token = Some("abc".into());
        state.save(&path).unwrap();
        assert_eq!(SessionState::load(&path).unwrap(), Some(state));

        SessionState::clear(&path).unwrap();
        assert_eq!(SessionState::load(&path).unwrap(), None);
        SessionState::clear(&path).unwrap();
    }

    #[test]
    fn test_credentials_required() {
        let errors = Credentials::new("", "").validate().unwrap_err();
        assert!(errors.contains("username"));
        assert!(errors.contains("password"));
        assert!(Credentials::new("ana", "secret").validate().is_ok());
    }

    #[test]
    fn test_password_not_in_debug() {
        let shown = format!("{:?}", Credentials::new("ana", "hunter2"));
        assert!(!shown.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_login_validates_before_calling() {
        let auth = FakeAuth {
            result: Ok(SessionState::new("ana@firmador.ec", Role::User)),
        };
        let err = login(&auth, &Credentials::new("ana", "")).await.unwrap_err();
        assert!(matches!(err, LoginError::Validation(ref f) if f.contains("password")));

        let state = login(&auth, &Credentials::new("ana", "secret"))
            .await
            .unwrap();
        assert_eq!(state.email, "ana@firmador.ec");
    }

    #[tokio::test]
    async fn test_login_rejection_message() {
        let auth = FakeAuth {
            result: Err(RemoteError::status(
                401,
                r#"{"message":"Usuario o contraseña inválidos"}"#,
            )),
        };
        let err = login(&auth, &Credentials::new("ana", "bad"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::Rejected(ref m) if m == "Usuario o contraseña inválidos"));
    }

    #[tokio::test]
    async fn test_token_login_requires_token() {
        let auth = FakeAuth {
            result: Ok(SessionState::new("ana@firmador.ec", Role::User)),
        };
        assert!(matches!(
            login_with_token(&auth, "  ").await,
            Err(LoginError::Validation(_))
        ));
        assert!(login_with_token(&auth, "tok").await.is_ok());
    }
}

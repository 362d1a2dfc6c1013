//! Subcommand implementations

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use firmador_client::{FirmadorClient, FirmadorConfig};
use firmador_core::{
    login, login_with_token, register, request_password_reset, reset_password,
    upload_certificate, verify_email, AccountError, Certificate, CertificateUpload, Credentials,
    DocumentBoard, LoginError, Offset, PasswordReset, Pin, Registration, SessionOutcome,
    SessionState, SignError, SignProgress,
};

use crate::preview::TempFilePreview;

/// Everything a command needs: configuration, the HTTP client and the
/// location of the persisted session
pub struct App {
    pub config: FirmadorConfig,
    pub client: FirmadorClient,
    pub state_path: PathBuf,
}

impl App {
    pub fn new(config: FirmadorConfig) -> Result<Self> {
        let client = FirmadorClient::new(&config).context("Failed to create API client")?;
        let state_path = config.state_path();
        Ok(Self {
            config,
            client,
            state_path,
        })
    }

    fn session(&self) -> Result<SessionState> {
        match SessionState::load(&self.state_path).with_context(|| {
            format!(
                "Failed to read session state from {}",
                self.state_path.display()
            )
        })? {
            Some(state) => Ok(state),
            None => bail!("Not signed in. Run `firmador login` first."),
        }
    }

    async fn board(&self) -> Result<DocumentBoard> {
        let state = self.session()?;
        let mut board = DocumentBoard::new(&state).with_page_size(self.config.page_size);
        board
            .refresh(&self.client)
            .await
            .map_err(|e| user_error(&e))?;
        Ok(board)
    }
}

/// Signing inputs as given on the command line
pub struct SignArgs {
    pub id: String,
    pub certificate: PathBuf,
    pub pin: String,
    pub reason: String,
    pub location: String,
    /// One-based page number
    pub page: u32,
    pub x: f64,
    pub y: f64,
}

fn user_error(err: &SignError) -> anyhow::Error {
    anyhow::anyhow!("{}", err.user_message())
}

fn login_error(err: LoginError) -> anyhow::Error {
    match err {
        LoginError::Validation(fields) => {
            anyhow::anyhow!("Required fields are missing: {}", fields)
        }
        LoginError::Rejected(message) => anyhow::anyhow!("Login rejected: {}", message),
        LoginError::Remote(e) => user_error(&SignError::from_remote(e)),
    }
}

fn account_error(err: AccountError) -> anyhow::Error {
    anyhow::anyhow!("{}", err.user_message())
}

/// Certificate bytes and the file name to upload them under
fn read_certificate(path: &Path) -> Result<Certificate> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read certificate {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "certificate.p12".to_string());
    Ok(Certificate::new(name, bytes))
}

fn save_session(state: &SessionState, path: &Path) -> Result<()> {
    state
        .save(path)
        .with_context(|| format!("Failed to save session to {}", path.display()))
}

pub async fn login_command(app: &App, user: &str, password: &str) -> Result<()> {
    let state = login(&app.client, &Credentials::new(user, password))
        .await
        .map_err(login_error)?;
    save_session(&state, &app.state_path)?;

    let role = if state.is_admin() { "administrator" } else { "user" };
    println!("Signed in as {} ({})", state.email, role);
    Ok(())
}

pub async fn login_token_command(app: &App, token: &str) -> Result<()> {
    let state = login_with_token(&app.client, token)
        .await
        .map_err(login_error)?;
    save_session(&state, &app.state_path)?;

    println!("Signed in as {}", state.email);
    Ok(())
}

pub fn logout_command(app: &App) -> Result<()> {
    SessionState::clear(&app.state_path).context("Failed to remove session state")?;
    println!("Signed out");
    Ok(())
}

pub fn whoami_command(app: &App) -> Result<()> {
    let state = app.session()?;
    let role = if state.is_admin() { "administrator" } else { "user" };
    println!("{} ({})", state.email, role);
    Ok(())
}

pub async fn list_command(app: &App, page: usize) -> Result<()> {
    let mut board = app.board().await?;
    board.set_page(page.saturating_sub(1));

    let rows = board.visible();
    if rows.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    for doc in rows {
        let state = if doc.is_signed { "signed" } else { "pending" };
        let expires = doc
            .expires_on()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<8} {:<10} {:<12} {}",
            doc.id, state, doc.status, expires, doc.title
        );
    }

    let summary = board.page_summary();
    println!(
        "{}-{} of {} (page {} of {})",
        summary.first,
        summary.last,
        summary.total,
        board.page() + 1,
        board.page_count()
    );
    Ok(())
}

pub async fn sign_command(app: &App, args: SignArgs) -> Result<()> {
    let certificate = read_certificate(&args.certificate)?;

    let mut board = app.board().await?;
    let mut session = board
        .select_for_signing(&args.id)
        .map_err(|e| user_error(&e))?
        .with_preview(Arc::new(TempFilePreview))
        .with_mapping(app.config.placement.mapping());

    if let Err(e) = session.load(&app.client).await {
        board.complete(session.ticket(), &SessionOutcome::Cancelled);
        return Err(user_error(&e));
    }
    if let Some(path) = session.preview_handle() {
        tracing::info!("Preview available at {}", path);
    }

    session.set_certificate(certificate);
    session.set_pin(Pin::new(args.pin));
    session.set_reason(args.reason);
    session.set_location(args.location);
    session.set_page(args.page.saturating_sub(1));
    session.drag().place(Offset::new(args.x, args.y));

    let progress = |p: SignProgress| eprintln!("{}", p.label());
    let outcome = match session.submit(&app.client, &app.client, &progress).await {
        Ok(outcome) => outcome,
        Err(fields) => {
            board.complete(session.ticket(), &SessionOutcome::Cancelled);
            return Err(user_error(&SignError::Validation(fields)));
        }
    };
    board.complete(session.ticket(), &outcome);

    match outcome {
        SessionOutcome::Signed => {
            println!("Document {} signed", args.id);
            Ok(())
        }
        SessionOutcome::Failed(err) => Err(user_error(&err)),
        SessionOutcome::Rejected | SessionOutcome::Cancelled => {
            bail!("Signing of {} did not complete", args.id)
        }
    }
}

pub async fn reject_command(app: &App, id: &str, reason: &str) -> Result<()> {
    let mut board = app.board().await?;
    let mut session = board.select_for_signing(id).map_err(|e| user_error(&e))?;

    session.begin_rejection();
    session.set_rejection_reason(reason);
    match session.reject(&app.client).await {
        Ok(outcome) => {
            board.complete(session.ticket(), &outcome);
            println!("Document {} rejected", id);
            Ok(())
        }
        Err(e) => {
            board.complete(session.ticket(), &SessionOutcome::Cancelled);
            Err(user_error(&e))
        }
    }
}

pub async fn delete_command(app: &App, id: &str) -> Result<()> {
    let mut board = app.board().await?;
    board
        .delete(&app.client, id)
        .await
        .map_err(|e| user_error(&e))?;
    println!("Document {} deleted", id);
    Ok(())
}

pub async fn resend_command(app: &App, id: &str) -> Result<()> {
    let board = app.board().await?;
    board
        .resend(&app.client, id)
        .await
        .map_err(|e| user_error(&e))?;
    println!("Notification for {} sent again", id);
    Ok(())
}

pub async fn register_command(app: &App, form: &Registration) -> Result<()> {
    let account = register(&app.client, form).await.map_err(account_error)?;
    println!(
        "Account created. Check {} for the verification code, then run `firmador verify-email`.",
        account.email
    );
    Ok(())
}

pub async fn verify_email_command(app: &App, email: &str, code: &str) -> Result<()> {
    verify_email(&app.client, email, code)
        .await
        .map_err(account_error)?;
    println!("Email {} verified", email.trim());
    Ok(())
}

pub async fn recover_password_command(app: &App, email: &str) -> Result<()> {
    request_password_reset(&app.client, email)
        .await
        .map_err(account_error)?;
    println!(
        "A validation PIN was sent to {}. Run `firmador reset-password` with it.",
        email.trim()
    );
    Ok(())
}

pub async fn reset_password_command(app: &App, reset: &PasswordReset) -> Result<()> {
    reset_password(&app.client, reset)
        .await
        .map_err(account_error)?;
    println!("Password changed");
    Ok(())
}

pub async fn upload_certificate_command(
    app: &App,
    user_id: &str,
    certificate: &Path,
    pin: String,
) -> Result<()> {
    let upload = CertificateUpload {
        user_id: user_id.to_string(),
        certificate: Some(read_certificate(certificate)?),
        pin: Pin::new(pin),
    };
    upload_certificate(&app.client, &upload)
        .await
        .map_err(account_error)?;
    println!("Certificate stored for user {}", user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_error_messages() {
        let err = login_error(LoginError::Rejected("Credenciales inválidas".into()));
        assert_eq!(err.to_string(), "Login rejected: Credenciales inválidas");

        let err = login_error(LoginError::Remote(firmador_core::RemoteError::Transport(
            "refused".into(),
        )));
        assert_eq!(err.to_string(), firmador_core::error::TRANSPORT_MESSAGE);
    }

    #[test]
    fn test_account_error_messages() {
        let mut fields = firmador_core::FieldErrors::new();
        fields.add("code", "The verification code is required.");
        let err = account_error(AccountError::Validation(fields));
        assert_eq!(err.to_string(), "The verification code is required.");

        let err = account_error(AccountError::Remote(firmador_core::RemoteError::Transport(
            "refused".into(),
        )));
        assert_eq!(err.to_string(), firmador_core::error::TRANSPORT_MESSAGE);
    }

    #[test]
    fn test_read_certificate_keeps_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firma.p12");
        fs::write(&path, [0x30, 0x82]).unwrap();

        let certificate = read_certificate(&path).unwrap();
        assert_eq!(certificate.file_name, "firma.p12");
        assert_eq!(certificate.bytes, vec![0x30, 0x82]);
        assert!(read_certificate(&dir.path().join("missing.p12")).is_err());
    }

    #[test]
    fn test_session_required() {
        let dir = tempfile::tempdir().unwrap();
        let config = FirmadorConfig {
            api_base_url: "http://127.0.0.1:9/api/".into(),
            state_path: Some(dir.path().join("session.json")),
            ..FirmadorConfig::default()
        };
        let app = App::new(config).unwrap();

        let err = whoami_command(&app).unwrap_err();
        assert!(err.to_string().contains("Not signed in"));

        SessionState::new("ana@firmador.ec", firmador_core::Role::User)
            .save(&app.state_path)
            .unwrap();
        assert!(whoami_command(&app).is_ok());
        assert!(logout_command(&app).is_ok());
        assert!(!app.state_path.exists());
    }
}

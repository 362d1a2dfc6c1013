//! Firmador command-line client
//!
//! Signs, rejects and manages documents through the Firmador API.

mod commands;
mod preview;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use firmador_client::FirmadorConfig;
use firmador_core::{PasswordReset, Registration};

use crate::commands::{App, SignArgs};

#[derive(Parser, Debug)]
#[command(name = "firmador")]
#[command(version, about = "Sign documents with a PKCS#12 certificate")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "FIRMADOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with a username or email and password
    Login {
        #[arg(short, long)]
        user: String,

        #[arg(short, long, env = "FIRMADOR_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign in with a token from an invitation link
    LoginToken { token: String },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List documents visible to the signed-in user
    List {
        /// Page to show, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,
    },

    /// Sign a document
    Sign {
        id: String,

        /// PKCS#12 certificate file
        #[arg(long = "cert")]
        certificate: PathBuf,

        /// Certificate PIN
        #[arg(long, env = "FIRMADOR_PIN", hide_env_values = true)]
        pin: String,

        #[arg(long, default_value = "")]
        reason: String,

        #[arg(long, default_value = "")]
        location: String,

        /// Page to place the signature on, starting at 1
        #[arg(long, default_value = "1")]
        page: u32,

        /// Horizontal offset of the signature on the page view
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        x: f64,

        /// Vertical offset of the signature on the page view
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        y: f64,
    },

    /// Reject a document instead of signing it
    Reject {
        id: String,

        #[arg(long)]
        reason: String,
    },

    /// Delete a document (administrators only)
    Delete { id: String },

    /// Send the signing notification again (administrators only)
    Resend { id: String },

    /// Create an account; a verification code is emailed afterwards
    Register {
        /// National identity number (10 digits)
        #[arg(long)]
        id_number: String,

        /// Full name
        #[arg(long)]
        name: String,

        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "FIRMADOR_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Confirm an email address with the emailed code
    VerifyEmail { email: String, code: String },

    /// Email a PIN for choosing a new password
    RecoverPassword { email: String },

    /// Set a new password with the emailed PIN
    ResetPassword {
        email: String,

        #[arg(long)]
        pin: String,

        #[arg(long, env = "FIRMADOR_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },

    /// Keep a PKCS#12 certificate on a user's profile
    UploadCertificate {
        user_id: String,

        #[arg(long = "cert")]
        certificate: PathBuf,

        #[arg(long, env = "FIRMADOR_PIN", hide_env_values = true)]
        pin: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so command output stays clean
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("firmador=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = FirmadorConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    tracing::debug!(api = %config.api_base_url, "Configuration loaded");
    let app = App::new(config)?;

    match args.command {
        Command::Login { user, password } => {
            commands::login_command(&app, &user, &password).await
        }
        Command::LoginToken { token } => commands::login_token_command(&app, &token).await,
        Command::Logout => commands::logout_command(&app),
        Command::Whoami => commands::whoami_command(&app),
        Command::List { page } => commands::list_command(&app, page).await,
        Command::Sign {
            id,
            certificate,
            pin,
            reason,
            location,
            page,
            x,
            y,
        } => {
            commands::sign_command(
                &app,
                SignArgs {
                    id,
                    certificate,
                    pin,
                    reason,
                    location,
                    page,
                    x,
                    y,
                },
            )
            .await
        }
        Command::Reject { id, reason } => commands::reject_command(&app, &id, &reason).await,
        Command::Delete { id } => commands::delete_command(&app, &id).await,
        Command::Resend { id } => commands::resend_command(&app, &id).await,
        Command::Register {
            id_number,
            name,
            user,
            email,
            password,
        } => {
            let form = Registration {
                id_number,
                name,
                user_name: user,
                email_confirmation: email.clone(),
                email,
                password_confirmation: password.clone(),
                password,
            };
            commands::register_command(&app, &form).await
        }
        Command::VerifyEmail { email, code } => {
            commands::verify_email_command(&app, &email, &code).await
        }
        Command::RecoverPassword { email } => {
            commands::recover_password_command(&app, &email).await
        }
        Command::ResetPassword {
            email,
            pin,
            new_password,
        } => {
            let reset = PasswordReset {
                email,
                pin,
                confirmation: new_password.clone(),
                new_password,
            };
            commands::reset_password_command(&app, &reset).await
        }
        Command::UploadCertificate {
            user_id,
            certificate,
            pin,
        } => commands::upload_certificate_command(&app, &user_id, &certificate, pin).await,
    }
}

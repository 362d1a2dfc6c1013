//! HTTP binding of the signing REST API
//!
//! [`FirmadorClient`] implements every remote trait the core consumes. The
//! archive commit is delegated to an [`ArchiveClient`] when one is
//! configured.

use async_trait::async_trait;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};

use firmador_core::{
    AccountService, Authenticator, Certificate, Credentials, Document, DocumentFetcher,
    DocumentStore, ListScope, NewAccount, Pin, RemoteError, Role, SessionState, SignOutcome,
    SignRequest, SignedArtifact, SigningGateway,
};

use crate::archive::ArchiveClient;
use crate::config::FirmadorConfig;
use crate::error::Result;
use crate::http::{decode, endpoint, parse_base_url, success_body, text_payload, transport};
use crate::models::{LoginResponse, RegisterRequest, RejectRequest};

const PKCS12_MIME: &str = "application/x-pkcs12";
const PDF_MIME: &str = "application/pdf";

pub struct FirmadorClient {
    http: Client,
    base_url: Url,
    archive: Option<ArchiveClient>,
}

impl FirmadorClient {
    pub fn new(config: &FirmadorConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        let base_url = parse_base_url(&config.api_base_url)?;
        let archive = config
            .archive
            .as_ref()
            .map(|archive| ArchiveClient::new(http.clone(), archive))
            .transpose()?;

        Ok(Self {
            http,
            base_url,
            archive,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn has_archive(&self) -> bool {
        self.archive.is_some()
    }

    fn url(&self, segments: &[&str]) -> Url {
        endpoint(&self.base_url, segments)
    }

    /// Send a request that only needs to succeed
    async fn expect_success(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<String, RemoteError> {
        let response = request.send().await.map_err(transport)?;
        success_body(response).await
    }
}

/// Interpret a 2xx body from `DW/sign-pdf`
///
/// A base64 payload that decodes to a PDF is the signed document; anything
/// else is a confirmation that the backend stored the result itself.
pub fn parse_sign_response(body: &str) -> SignOutcome {
    let text = text_payload(body);
    match base64::engine::general_purpose::STANDARD.decode(text.as_bytes()) {
        Ok(bytes) if bytes.starts_with(b"%PDF") => SignOutcome::Signed(SignedArtifact(bytes)),
        _ => SignOutcome::Processed(text),
    }
}

#[async_trait]
impl DocumentFetcher for FirmadorClient {
    async fn fetch_document_bytes(&self, url: &str) -> std::result::Result<Vec<u8>, RemoteError> {
        let response = self.http.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(transport)?;
            return Err(RemoteError::status(status.as_u16(), body));
        }
        let bytes = response.bytes().await.map_err(transport)?;
        tracing::debug!(url, bytes = bytes.len(), "Fetched document");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SigningGateway for FirmadorClient {
    async fn sign_document(
        &self,
        request: &SignRequest,
    ) -> std::result::Result<SignOutcome, RemoteError> {
        let certificate = Part::bytes(request.certificate.bytes.clone())
            .file_name(request.certificate.file_name.clone())
            .mime_str(PKCS12_MIME)
            .map_err(transport)?;
        let pdf = Part::bytes(request.pdf.clone())
            .file_name(format!("{}.pdf", request.document_id))
            .mime_str(PDF_MIME)
            .map_err(transport)?;
        let form = Form::new()
            .part("certificateFile", certificate)
            .part("pdfFile", pdf);

        let page = request.page.to_string();
        let x = request.x.to_string();
        let y = request.y.to_string();
        let query = [
            ("password", request.pin.expose()),
            ("reason", request.reason.as_str()),
            ("location", request.location.as_str()),
            ("page", page.as_str()),
            ("positionX", x.as_str()),
            ("positionY", y.as_str()),
        ];

        tracing::info!(document = %request.document_id, "Sending document to the signing service");
        let body = self
            .expect_success(
                self.http
                    .post(self.url(&["DW", "sign-pdf"]))
                    .query(&query)
                    .multipart(form),
            )
            .await?;
        Ok(parse_sign_response(&body))
    }

    async fn reject_document(
        &self,
        document_id: &str,
        reason: &str,
    ) -> std::result::Result<(), RemoteError> {
        tracing::info!(document = %document_id, "Sending rejection");
        self.expect_success(
            self.http
                .put(self.url(&["DW", document_id, "reject"]))
                .json(&RejectRequest { reason }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FirmadorClient {
    async fn list_documents(
        &self,
        scope: &ListScope,
    ) -> std::result::Result<Vec<Document>, RemoteError> {
        let url = match scope {
            ListScope::All => self.url(&["Document", "GetAllDocuments"]),
            ListScope::Owner(email) => self.url(&["Document", email.as_str()]),
        };
        let body = self.expect_success(self.http.get(url)).await?;
        decode(&body, "document listing")
    }

    async fn commit_signed(
        &self,
        document_id: &str,
        artifact: &SignedArtifact,
    ) -> std::result::Result<(), RemoteError> {
        match &self.archive {
            Some(archive) => archive.replace_document(document_id, artifact).await,
            None => Err(RemoteError::Transport(
                "No document archive is configured".to_string(),
            )),
        }
    }

    async fn mark_signed(&self, document_id: &str) -> std::result::Result<(), RemoteError> {
        self.expect_success(self.http.put(self.url(&["Document", document_id])))
            .await?;
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> std::result::Result<(), RemoteError> {
        self.expect_success(self.http.delete(self.url(&["Document", document_id])))
            .await?;
        Ok(())
    }

    async fn resend_notification(
        &self,
        document_id: &str,
    ) -> std::result::Result<(), RemoteError> {
        self.expect_success(
            self.http
                .post(self.url(&["Document", "resend-email", document_id])),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Authenticator for FirmadorClient {
    async fn login(
        &self,
        credentials: &Credentials,
    ) -> std::result::Result<SessionState, RemoteError> {
        let body = self
            .expect_success(self.http.post(self.url(&["DW", "login"])).query(&[
                ("usernameOrEmail", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ]))
            .await?;

        let login: LoginResponse = decode(&body, "login")?;
        Ok(SessionState::new(login.email, Role::from_code(login.role)))
    }

    async fn login_with_token(&self, token: &str) -> std::result::Result<SessionState, RemoteError> {
        let body = self
            .expect_success(
                self.http
                    .get(self.url(&["DW", "authenticateWithToken"]))
                    .query(&[("token", token)]),
            )
            .await?;

        let mut state = SessionState::new(text_payload(&body), Role::User);
        state.token = Some(token.to_string());
        Ok(state)
    }
}

/// `DW/verifyPin` answers with a JSON boolean; only an explicit `false`
/// refuses the PIN
pub fn parse_pin_response(body: &str) -> bool {
    !matches!(serde_json::from_str::<bool>(body.trim()), Ok(false))
}

#[async_trait]
impl AccountService for FirmadorClient {
    async fn register(&self, account: &NewAccount) -> std::result::Result<(), RemoteError> {
        self.expect_success(
            self.http
                .post(self.url(&["DW", "register"]))
                .json(&RegisterRequest::from(account)),
        )
        .await?;
        Ok(())
    }

    async fn verify_email(&self, email: &str, code: &str) -> std::result::Result<(), RemoteError> {
        self.expect_success(
            self.http
                .post(self.url(&["DW", "verifyEmail"]))
                .query(&[("email", email), ("verificationCode", code)]),
        )
        .await?;
        Ok(())
    }

    async fn send_pin_validation(&self, email: &str) -> std::result::Result<(), RemoteError> {
        self.expect_success(
            self.http
                .post(self.url(&["DW", "sendPinValidation"]))
                .query(&[("email", email)]),
        )
        .await?;
        Ok(())
    }

    async fn verify_pin(&self, email: &str, code: &str) -> std::result::Result<bool, RemoteError> {
        let body = self
            .expect_success(
                self.http
                    .get(self.url(&["DW", "verifyPin"]))
                    .query(&[("email", email), ("code", code)]),
            )
            .await?;
        Ok(parse_pin_response(&body))
    }

    async fn change_password(
        &self,
        email: &str,
        pin: &str,
        new_password: &str,
    ) -> std::result::Result<(), RemoteError> {
        self.expect_success(self.http.post(self.url(&["DW", "changePassword"])).query(&[
            ("email", email),
            ("validationPin", pin),
            ("newPassword", new_password),
        ]))
        .await?;
        Ok(())
    }

    async fn upload_certificate(
        &self,
        user_id: &str,
        certificate: &Certificate,
        pin: &Pin,
    ) -> std::result::Result<(), RemoteError> {
        let part = Part::bytes(certificate.bytes.clone())
            .file_name(certificate.file_name.clone())
            .mime_str(PKCS12_MIME)
            .map_err(transport)?;
        let form = Form::new().part("certificate", part);

        self.expect_success(
            self.http
                .post(self.url(&["DW", "createCertificate"]))
                .query(&[("id", user_id), ("pinCertificate", pin.expose())])
                .multipart(form),
        )
        .await?;
        Ok(())
    }
}

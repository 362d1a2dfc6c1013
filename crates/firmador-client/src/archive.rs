//! Document archive commit
//!
//! Replacing a stored document takes three calls against the archive API:
//! authenticate, upload the new content (located by the `ID_DOCUMENTO`
//! index), then, once the archive has had time to index the upload, set the
//! item's `ESTADO` index to `OK`.

use base64::Engine;
use reqwest::{Client, Url};
use std::time::Duration;

use firmador_core::{RemoteError, SignedArtifact};

use crate::config::ArchiveConfig;
use crate::error::Result;
use crate::http::{decode, endpoint, parse_base_url, success_body, transport};
use crate::models::{
    ArchiveAuthRequest, ArchiveAuthResponse, ReplaceFileRequest, ReplaceFileResponse,
    UpdateDataRequest, UpdateDataResponse,
};

const SEARCH_FIELD: &str = "ID_DOCUMENTO";
const SIGNED_INDEX: &str = "ESTADO:OK|";
const UPDATED_STATE: &str = "UPDATED";

pub struct ArchiveClient {
    http: Client,
    base_url: Url,
    user: String,
    password: String,
    platform_uri: String,
    cabinet_id: String,
    settle_delay: Duration,
}

impl ArchiveClient {
    pub fn new(http: Client, config: &ArchiveConfig) -> Result<Self> {
        Ok(Self {
            http,
            base_url: parse_base_url(&config.base_url)?,
            user: config.user.clone(),
            password: config.password.clone(),
            platform_uri: config.platform_uri.clone(),
            cabinet_id: config.cabinet_id.clone(),
            settle_delay: config.index_settle_delay(),
        })
    }

    /// Replace the archived file of `document_id` with the signed PDF
    pub async fn replace_document(
        &self,
        document_id: &str,
        artifact: &SignedArtifact,
    ) -> std::result::Result<(), RemoteError> {
        let token = self.authenticate().await?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(artifact.as_bytes());
        let dwdocid = self.replace_file(&token, document_id, &encoded).await?;
        tracing::info!(document = %document_id, dwdocid, "Signed file uploaded to archive");

        tokio::time::sleep(self.settle_delay).await;

        let estado = self.update_index(&token, dwdocid).await?;
        if estado != UPDATED_STATE {
            tracing::warn!(
                document = %document_id,
                dwdocid,
                estado = %estado,
                "Archive did not confirm the status update"
            );
        }
        Ok(())
    }

    async fn authenticate(&self) -> std::result::Result<String, RemoteError> {
        let body = ArchiveAuthRequest {
            uri: &self.platform_uri,
            user: &self.user,
            pasw: &self.password,
            fid: &self.cabinet_id,
        };
        let response = self
            .http
            .post(endpoint(&self.base_url, &["api", "Authentication", "Validar"]))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let auth: ArchiveAuthResponse = decode(&success_body(response).await?, "archive login")?;
        Ok(auth.token)
    }

    async fn replace_file(
        &self,
        token: &str,
        document_id: &str,
        encoded: &str,
    ) -> std::result::Result<i64, RemoteError> {
        let body = ReplaceFileRequest {
            documento_codificado: encoded,
            extension: "pdf",
            fid: &self.cabinet_id,
            campo_busqueda: SEARCH_FIELD,
            valor_busqueda: document_id,
        };
        let response = self
            .http
            .post(endpoint(&self.base_url, &["api", "Item", "ReplaceFileContentJ"]))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let replaced: ReplaceFileResponse =
            decode(&success_body(response).await?, "archive replace")?;
        Ok(replaced.objeto.dwdocid)
    }

    async fn update_index(
        &self,
        token: &str,
        dwdocid: i64,
    ) -> std::result::Result<String, RemoteError> {
        let id = dwdocid.to_string();
        let body = UpdateDataRequest {
            indices: SIGNED_INDEX,
            documento_codificado: "",
            extension: "",
        };
        let response = self
            .http
            .put(endpoint(&self.base_url, &["api", "Item", "UpdateData", id.as_str()]))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let updated: UpdateDataResponse =
            decode(&success_body(response).await?, "archive update")?;
        if let Some(mensaje) = &updated.mensaje {
            tracing::debug!(dwdocid, "Archive update: {}", mensaje);
        }
        Ok(updated.data.estado)
    }
}

//! Wire types for the signing API and the document archive API

use serde::{Deserialize, Serialize};

use firmador_core::NewAccount;

/// `POST DW/login` response
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub email: String,
    #[serde(default)]
    pub role: i64,
}

/// `PUT DW/{id}/reject` body
#[derive(Debug, Clone, Serialize)]
pub struct RejectRequest<'a> {
    pub reason: &'a str,
}

/// `POST DW/register` body
///
/// New accounts start as plain users with an unverified email and no
/// certificate on file.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest<'a> {
    pub ci: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub certificate: &'a str,
    pub pin_certificate: &'a str,
    pub user_name: &'a str,
    pub password: &'a str,
    pub role: &'a str,
    pub validation_pin: &'a str,
    pub email_verified: bool,
}

impl<'a> From<&'a NewAccount> for RegisterRequest<'a> {
    fn from(account: &'a NewAccount) -> Self {
        Self {
            ci: &account.id_number,
            name: &account.name,
            email: &account.email,
            certificate: "",
            pin_certificate: "",
            user_name: &account.user_name,
            password: &account.password,
            role: "user",
            validation_pin: "",
            email_verified: false,
        }
    }
}

/// `POST api/Authentication/Validar` body
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveAuthRequest<'a> {
    pub uri: &'a str,
    pub user: &'a str,
    pub pasw: &'a str,
    pub fid: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveAuthResponse {
    pub token: String,
}

/// `POST api/Item/ReplaceFileContentJ` body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceFileRequest<'a> {
    /// Base64 of the new file content
    pub documento_codificado: &'a str,
    pub extension: &'a str,
    pub fid: &'a str,
    pub campo_busqueda: &'a str,
    pub valor_busqueda: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceFileResponse {
    pub objeto: ArchivedItem,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchivedItem {
    pub dwdocid: i64,
}

/// `PUT api/Item/UpdateData/{dwdocid}` body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDataRequest<'a> {
    pub indices: &'a str,
    pub documento_codificado: &'a str,
    pub extension: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDataResponse {
    #[serde(default)]
    pub mensaje: Option<String>,
    pub data: UpdatedItem,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatedItem {
    pub estado: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_replace_request_field_names() {
        let body = ReplaceFileRequest {
            documento_codificado: "JVBERi0=",
            extension: "pdf",
            fid: "cab",
            campo_busqueda: "ID_DOCUMENTO",
            valor_busqueda: "42",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "documentoCodificado": "JVBERi0=",
                "extension": "pdf",
                "fid": "cab",
                "campoBusqueda": "ID_DOCUMENTO",
                "valorBusqueda": "42"
            })
        );
    }

    #[test]
    fn test_register_request_defaults() {
        let account = NewAccount {
            id_number: "1712345678".into(),
            name: "Ana Núñez".into(),
            user_name: "anan".into(),
            email: "ana@firmador.ec".into(),
            password: "s3creta".into(),
        };
        let json = serde_json::to_value(RegisterRequest::from(&account)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "ci": "1712345678",
                "name": "Ana Núñez",
                "email": "ana@firmador.ec",
                "certificate": "",
                "pinCertificate": "",
                "userName": "anan",
                "password": "s3creta",
                "role": "user",
                "validationPin": "",
                "emailVerified": false
            })
        );
    }

    #[test]
    fn test_update_response_tolerates_extra_fields() {
        let raw = r#"{
            "mensaje": "ok",
            "data": {"documento": null, "fileCabinet": "cab", "dwdocid": 7, "estado": "UPDATED"}
        }"#;
        let parsed: UpdateDataResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.estado, "UPDATED");
    }
}

//! Helpers shared by the API and archive bindings

use reqwest::{Response, Url};
use serde::de::DeserializeOwned;

use firmador_core::RemoteError;

use crate::error::{ClientError, Result};

/// Parse a base URL that path segments can be appended to
pub(crate) fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| ClientError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidUrl {
            url: raw.to_string(),
            reason: "cannot be used as a base URL".to_string(),
        });
    }
    Ok(url)
}

/// Append percent-encoded path segments to `base`
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

pub(crate) fn transport(err: reqwest::Error) -> RemoteError {
    RemoteError::Transport(err.to_string())
}

/// Body of a 2xx response; any other status becomes [`RemoteError::Status`]
/// with the body kept intact
pub(crate) async fn success_body(response: Response) -> std::result::Result<String, RemoteError> {
    let status = response.status();
    let body = response.text().await.map_err(transport)?;
    if status.is_success() {
        Ok(body)
    } else {
        tracing::debug!(status = status.as_u16(), "Request failed: {}", body);
        Err(RemoteError::status(status.as_u16(), body))
    }
}

pub(crate) fn decode<T: DeserializeOwned>(
    body: &str,
    what: &str,
) -> std::result::Result<T, RemoteError> {
    serde_json::from_str(body)
        .map_err(|e| RemoteError::Transport(format!("Unexpected {} response: {}", what, e)))
}

/// Endpoints answer with either a JSON string or bare text
pub(crate) fn text_payload(body: &str) -> String {
    serde_json::from_str::<String>(body).unwrap_or_else(|_| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_endpoint_appends_segments() {
        let base = parse_base_url("https://api.test/signer/api/").unwrap();
        assert_eq!(
            endpoint(&base, &["Document", "ana@firmador.ec"]).as_str(),
            "https://api.test/signer/api/Document/ana@firmador.ec"
        );

        let base = parse_base_url("https://api.test/signer/api").unwrap();
        assert_eq!(
            endpoint(&base, &["DW", "a b", "reject"]).as_str(),
            "https://api.test/signer/api/DW/a%20b/reject"
        );
    }

    #[test]
    fn test_rejects_unusable_base() {
        assert!(matches!(
            parse_base_url("mailto:ana@firmador.ec"),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_text_payload() {
        assert_eq!(text_payload(r#""ana@firmador.ec""#), "ana@firmador.ec");
        assert_eq!(text_payload("ana@firmador.ec\n"), "ana@firmador.ec");
    }
}

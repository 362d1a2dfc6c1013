//! Firmador HTTP client
//!
//! Binds the remote-service traits of [`firmador_core`] to the signing REST
//! API and the document archive API using `reqwest`.
//!
//! ```rust,no_run
//! use firmador_client::{FirmadorClient, FirmadorConfig};
//! use firmador_core::{DocumentStore, ListScope};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FirmadorConfig::from_str(r#"api_base_url = "https://signer.example.ec/api/""#)?;
//! let client = FirmadorClient::new(&config)?;
//! let documents = client
//!     .list_documents(&ListScope::Owner("ana@example.ec".into()))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod archive;
pub mod config;
pub mod error;
mod http;
pub mod models;

pub use api::{parse_pin_response, parse_sign_response, FirmadorClient};
pub use archive::ArchiveClient;
pub use config::{ArchiveConfig, FirmadorConfig, PlacementConfig};
pub use error::{ClientError, Result};

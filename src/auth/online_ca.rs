use crate::error::{ProcessingError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

pub const TRUSTROOTS_URL: &str = "https://slcs.ceda.ac.uk/onlineca/trustroots/";
pub const CERTIFICATE_URL: &str = "https://slcs.ceda.ac.uk/onlineca/certificate/";

/// A trust root served by the CA: file name and DER/PEM bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustRoot {
    pub name: String,
    pub contents: Vec<u8>,
}

/// Short-lived certificate issuer.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    async fn trustroots(&self) -> Result<Vec<TrustRoot>>;

    /// Submit a PEM certificate signing request and return the issued
    /// certificate as PEM.
    async fn certificate(&self, username: &str, password: &str, csr_pem: &str) -> Result<String>;
}

/// Online CA client over HTTPS.
pub struct OnlineCaClient {
    client: Client,
    trustroots_url: String,
    certificate_url: String,
}

impl OnlineCaClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            trustroots_url: TRUSTROOTS_URL.to_string(),
            certificate_url: CERTIFICATE_URL.to_string(),
        })
    }

    pub fn with_urls(mut self, trustroots_url: impl Into<String>, certificate_url: impl Into<String>) -> Self {
        self.trustroots_url = trustroots_url.into();
        self.certificate_url = certificate_url.into();
        self
    }
}

#[async_trait]
impl CertificateAuthority for OnlineCaClient {
    async fn trustroots(&self) -> Result<Vec<TrustRoot>> {
        debug!(url = %self.trustroots_url, "Fetching trust roots");
        let body = self
            .client
            .get(&self.trustroots_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_trustroots(&body)
    }

    async fn certificate(&self, username: &str, password: &str, csr_pem: &str) -> Result<String> {
        debug!(url = %self.certificate_url, username, "Requesting certificate");
        let response = self
            .client
            .post(&self.certificate_url)
            .basic_auth(username, Some(password))
            .form(&[("certificate_request", csr_pem)])
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProcessingError::Authentication(
                format!("CA rejected credentials for '{}' ({})", username, response.status()),
            )),
            _ => Ok(response.error_for_status()?.text().await?),
        }
    }
}

/// Parse `name=<base64>` lines.
pub fn parse_trustroots(body: &str) -> Result<Vec<TrustRoot>> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (name, encoded) = line.split_once('=').ok_or_else(|| {
                ProcessingError::InvalidFormat(format!("Malformed trust root line '{}'", line))
            })?;
            let contents = STANDARD.decode(encoded.trim()).map_err(|e| {
                ProcessingError::InvalidFormat(format!("Trust root '{}': {}", name, e))
            })?;
            Ok(TrustRoot {
                name: name.trim().to_string(),
                contents,
            })
        })
        .collect()
}

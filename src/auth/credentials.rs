use crate::error::{ProcessingError, Result};
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use x509_parser::pem::Pem;

/// Files making up a CEDA OPeNDAP client setup.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialPaths {
    pub certs_dir: PathBuf,
    pub pem_file: PathBuf,
    pub dodsrc_file: PathBuf,
    pub cookie_jar: PathBuf,
}

impl CredentialPaths {
    /// Default layout under `home`: `.certs/ceda-dods.pem`, `.dodsrc` and
    /// `dods_cookies`.
    pub fn under(home: &Path) -> Self {
        let certs_dir = home.join(".certs");
        Self {
            pem_file: certs_dir.join("ceda-dods.pem"),
            certs_dir,
            dodsrc_file: home.join(".dodsrc"),
            cookie_jar: home.join("dods_cookies"),
        }
    }

    pub fn from_home() -> Result<Self> {
        let home = std::env::var_os("HOME")
            .ok_or_else(|| ProcessingError::Config("HOME is not set".to_string()))?;
        Ok(Self::under(Path::new(&home)))
    }

    pub fn trustroots_dir(&self) -> PathBuf {
        self.certs_dir.join("ca-trustroots")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CertificateStatus {
    Valid { not_after: DateTime<Utc> },
    Missing,
    Unreadable(String),
    /// Expired, or expiring within the requested minimum lifetime.
    Expired { not_after: DateTime<Utc> },
    NotYetValid { not_before: DateTime<Utc> },
}

impl CertificateStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, CertificateStatus::Valid { .. })
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateStatus::Valid { not_after } => write!(f, "valid until {}", not_after),
            CertificateStatus::Missing => write!(f, "missing"),
            CertificateStatus::Unreadable(reason) => write!(f, "unreadable ({})", reason),
            CertificateStatus::Expired { not_after } => write!(f, "expired or expiring ({})", not_after),
            CertificateStatus::NotYetValid { not_before } => write!(f, "not valid before {}", not_before),
        }
    }
}

/// Inspect the cached client certificate at `pem_file`.
///
/// A missing file, an unparsable certificate or one that does not stay valid
/// for `min_ttl` past `now` is reported through the status. Any other I/O
/// failure is returned as an error.
pub fn cached_certificate_status(
    pem_file: &Path,
    min_ttl: Duration,
    now: DateTime<Utc>,
) -> Result<CertificateStatus> {
    let bytes = match std::fs::read(pem_file) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CertificateStatus::Missing),
        Err(e) => return Err(e.into()),
    };

    let (not_before, not_after) = match certificate_validity(&bytes) {
        Ok(validity) => validity,
        Err(reason) => return Ok(CertificateStatus::Unreadable(reason)),
    };

    Ok(if now < not_before {
        CertificateStatus::NotYetValid { not_before }
    } else if now >= not_after - min_ttl {
        CertificateStatus::Expired { not_after }
    } else {
        CertificateStatus::Valid { not_after }
    })
}

/// `(not_before, not_after)` of the first certificate in a PEM bundle.
pub fn certificate_validity(pem: &[u8]) -> std::result::Result<(DateTime<Utc>, DateTime<Utc>), String> {
    let block = Pem::iter_from_buffer(pem)
        .filter_map(|block| block.ok())
        .find(|block| block.label == "CERTIFICATE")
        .ok_or_else(|| "no CERTIFICATE block".to_string())?;
    let cert = block.parse_x509().map_err(|e| e.to_string())?;

    let validity = cert.validity();
    Ok((
        timestamp(validity.not_before.timestamp())?,
        timestamp(validity.not_after.timestamp())?,
    ))
}

pub fn certificate_not_after(pem: &[u8]) -> Result<DateTime<Utc>> {
    certificate_validity(pem)
        .map(|(_, not_after)| not_after)
        .map_err(ProcessingError::Certificate)
}

fn timestamp(secs: i64) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| format!("timestamp {} out of range", secs))
}

//! CEDA client certificates for OPeNDAP access.

pub mod credentials;
pub mod dodsrc;
pub mod online_ca;

pub use credentials::{cached_certificate_status, CertificateStatus, CredentialPaths};
pub use dodsrc::{dodsrc_contents, write_dodsrc};
pub use online_ca::{CertificateAuthority, OnlineCaClient, TrustRoot};

use crate::error::{ProcessingError, Result};
use crate::utils::constants::DEFAULT_MIN_TTL_MINUTES;
use chrono::{DateTime, Duration, Utc};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub min_ttl: Duration,
    pub force: bool,
    pub paths: CredentialPaths,
}

impl AuthOptions {
    pub fn new(paths: CredentialPaths) -> Self {
        Self {
            min_ttl: Duration::minutes(DEFAULT_MIN_TTL_MINUTES),
            force: false,
            paths,
        }
    }

    pub fn with_min_ttl(mut self, min_ttl: Duration) -> Self {
        self.min_ttl = min_ttl;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Make sure a usable client certificate and `.dodsrc` are in place and
/// return the certificate's expiry.
///
/// A cached certificate is reused when it stays valid for at least
/// `min_ttl`, the `.dodsrc` exists and `force` is off. Otherwise trust roots
/// and a fresh certificate are fetched from `ca`.
pub async fn authenticate(
    ca: &dyn CertificateAuthority,
    username: &str,
    password: &str,
    options: &AuthOptions,
) -> Result<DateTime<Utc>> {
    let paths = &options.paths;
    let status = cached_certificate_status(&paths.pem_file, options.min_ttl, Utc::now())?;
    debug!(pem = %paths.pem_file.display(), status = %status, "Checked cached certificate");

    if let CertificateStatus::Valid { not_after } = status {
        if paths.dodsrc_file.exists() && !options.force {
            info!(not_after = %not_after, "Reusing cached certificate");
            return Ok(not_after);
        }
    }

    let trustroots_dir = paths.trustroots_dir();
    let roots = ca.trustroots().await?;
    for root in &roots {
        check_trust_root_name(&root.name)?;
    }
    tokio::fs::create_dir_all(&trustroots_dir).await?;
    for root in &roots {
        tokio::fs::write(trustroots_dir.join(&root.name), &root.contents).await?;
    }
    debug!(count = roots.len(), dir = %trustroots_dir.display(), "Wrote trust roots");

    let (csr_pem, key_pem) = signing_request(username)?;
    let cert_pem = ca.certificate(username, password, &csr_pem).await?;
    let not_after = credentials::certificate_not_after(cert_pem.as_bytes())?;

    if let Some(parent) = paths.pem_file.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bundle = format!("{}\n{}", cert_pem.trim_end(), key_pem);
    write_private(&paths.pem_file, bundle.as_bytes()).await?;
    write_dodsrc(paths).await?;

    info!(not_after = %not_after, pem = %paths.pem_file.display(), "Obtained new certificate");
    Ok(not_after)
}

/// Trust roots are written under the server-supplied name, which must be a
/// plain file name.
fn check_trust_root_name(name: &str) -> Result<()> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
        && !Path::new(name).is_absolute();
    if plain {
        Ok(())
    } else {
        Err(ProcessingError::Certificate(format!(
            "Refusing trust root with unsafe name {:?}",
            name
        )))
    }
}

/// Write `contents` readable by the owner only; the PEM holds the private key.
async fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.flush().await?;

    // mode only applies on creation
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}

/// Fresh key pair and a PEM CSR for it; returns `(csr, private_key)`.
fn signing_request(username: &str) -> Result<(String, String)> {
    let certificate_error = |e: rcgen::Error| ProcessingError::Certificate(e.to_string());

    let key_pair = KeyPair::generate().map_err(certificate_error)?;
    let mut params = CertificateParams::new(Vec::<String>::new()).map_err(certificate_error)?;
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, username);
    params.distinguished_name = name;

    let csr = params.serialize_request(&key_pair).map_err(certificate_error)?;
    Ok((csr.pem().map_err(certificate_error)?, key_pair.serialize_pem()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::tests::certificate_pem;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    struct FakeAuthority {
        issued: AtomicU32,
        password: String,
        root_name: String,
    }

    impl FakeAuthority {
        fn new(password: &str) -> Self {
            Self {
                issued: AtomicU32::new(0),
                password: password.to_string(),
                root_name: "ceda-root.0".to_string(),
            }
        }

        fn with_root_name(mut self, name: &str) -> Self {
            self.root_name = name.to_string();
            self
        }
    }

    #[async_trait::async_trait]
    impl CertificateAuthority for FakeAuthority {
        async fn trustroots(&self) -> Result<Vec<TrustRoot>> {
            Ok(vec![TrustRoot {
                name: self.root_name.clone(),
                contents: b"root".to_vec(),
            }])
        }

        async fn certificate(&self, _username: &str, password: &str, csr_pem: &str) -> Result<String> {
            if password != self.password {
                return Err(ProcessingError::Authentication("bad password".to_string()));
            }
            assert!(csr_pem.contains("CERTIFICATE REQUEST"));
            self.issued.fetch_add(1, Ordering::SeqCst);
            let bundle = certificate_pem((2000, 1, 1), (2100, 1, 1));
            let end = bundle.find("-----END CERTIFICATE-----").unwrap() + "-----END CERTIFICATE-----".len();
            Ok(bundle[..end].to_string())
        }
    }

    fn options(dir: &TempDir) -> AuthOptions {
        AuthOptions::new(CredentialPaths::under(dir.path()))
    }

    #[tokio::test]
    async fn test_authenticate_then_reuse_cached_certificate() {
        let dir = TempDir::new().unwrap();
        let ca = FakeAuthority::new("secret");
        let options = options(&dir);

        let not_after = authenticate(&ca, "ana", "secret", &options).await.unwrap();
        assert_eq!(not_after.format("%Y-%m-%d").to_string(), "2100-01-01");
        assert_eq!(ca.issued.load(Ordering::SeqCst), 1);

        assert!(options.paths.trustroots_dir().join("ceda-root.0").exists());
        let dodsrc = std::fs::read_to_string(&options.paths.dodsrc_file).unwrap();
        assert_eq!(dodsrc, dodsrc_contents(&options.paths));
        let pem = std::fs::read_to_string(&options.paths.pem_file).unwrap();
        assert!(pem.contains("BEGIN CERTIFICATE"));
        assert!(pem.contains("PRIVATE KEY"));

        let again = authenticate(&ca, "ana", "secret", &options).await.unwrap();
        assert_eq!(again, not_after);
        assert_eq!(ca.issued.load(Ordering::SeqCst), 1);

        let forced = options.clone().with_force(true);
        authenticate(&ca, "ana", "secret", &forced).await.unwrap();
        assert_eq!(ca.issued.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_dodsrc_triggers_renewal() {
        let dir = TempDir::new().unwrap();
        let ca = FakeAuthority::new("secret");
        let options = options(&dir);

        authenticate(&ca, "ana", "secret", &options).await.unwrap();
        std::fs::remove_file(&options.paths.dodsrc_file).unwrap();
        authenticate(&ca, "ana", "secret", &options).await.unwrap();

        assert_eq!(ca.issued.load(Ordering::SeqCst), 2);
        assert!(options.paths.dodsrc_file.exists());
    }

    #[tokio::test]
    async fn test_rejected_credentials_propagate() {
        let dir = TempDir::new().unwrap();
        let ca = FakeAuthority::new("secret");

        let result = authenticate(&ca, "ana", "wrong", &options(&dir)).await;
        assert!(matches!(result, Err(ProcessingError::Authentication(_))));
        assert!(!dir.path().join(".dodsrc").exists());
    }

    #[tokio::test]
    async fn test_trust_root_names_cannot_escape_directory() {
        for name in ["../evil", "/tmp/evil", "..", "nested/root", ""] {
            let dir = TempDir::new().unwrap();
            let ca = FakeAuthority::new("secret").with_root_name(name);

            let options = options(&dir);
            let result = authenticate(&ca, "ana", "secret", &options).await;
            assert!(
                matches!(result, Err(ProcessingError::Certificate(_))),
                "accepted trust root name {:?}",
                name
            );
            assert_eq!(ca.issued.load(Ordering::SeqCst), 0);
            assert!(!options.paths.certs_dir.join("evil").exists());
        }
        assert!(check_trust_root_name("ceda-root.0").is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_certificate_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let options = options(&dir);
        std::fs::create_dir_all(options.paths.pem_file.parent().unwrap()).unwrap();
        std::fs::write(&options.paths.pem_file, "stale").unwrap();
        std::fs::set_permissions(&options.paths.pem_file, std::fs::Permissions::from_mode(0o644)).unwrap();

        authenticate(&FakeAuthority::new("secret"), "ana", "secret", &options)
            .await
            .unwrap();

        let mode = std::fs::metadata(&options.paths.pem_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_signing_request_is_pem() {
        let (csr, key) = signing_request("ana").unwrap();
        assert!(csr.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
        assert!(key.contains("PRIVATE KEY"));
    }
}

//! TLS Credential Provisioning
//!
//! Makes sure the RPC certificate, its key and the CA file exist before any
//! TLS listener or client starts. When something is missing a fresh
//! self-signed CA certificate is generated and written with owner-only
//! permissions.
//!
//! Writes happen in the order cert, CA, key. If a later write fails, every
//! file written by the same call is removed again, so a returned error never
//! leaves a half-written set behind. A crash between writes is not covered.

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose,
    IsCa, KeyPair, KeyUsagePurpose,
};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::config::RawConfig;
use crate::error::BootstrapError;

/// Organisation label stamped into generated certificates.
pub const CERT_ORGANIZATION: &str = "pod/wallet autogenerated cert";

/// Generated certificates are valid for ten years.
pub const CERT_VALIDITY_DAYS: i64 = 365 * 10;

/// Locations of the TLS file triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlsMaterial {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: PathBuf,
}

impl TlsMaterial {
    pub fn from_config(config: &RawConfig) -> Self {
        Self {
            cert: config.rpc_cert.clone(),
            key: config.rpc_key.clone(),
            ca: config.ca_file.clone(),
        }
    }

    /// A missing key only counts when a one-time key was not requested.
    pub fn needs_generation(&self, one_time_key: bool) -> bool {
        (!self.key.exists() && !one_time_key) || !self.cert.exists() || !self.ca.exists()
    }
}

/// PEM encoded certificate and private key.
pub struct CertPair {
    pub cert_pem: String,
    pub key_pem: String,
}

/// Generate a self-signed CA certificate and key valid until `valid_until`.
/// The host name, localhost, the loopback addresses and `extra_hosts` are
/// added as subject alternative names.
pub fn generate_cert_pair(
    organization: &str,
    valid_until: OffsetDateTime,
    extra_hosts: &[IpAddr],
) -> Result<CertPair, BootstrapError> {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty() && h.is_ascii())
        .unwrap_or_else(|| "localhost".to_string());

    let mut names = vec![
        host.clone(),
        "localhost".to_string(),
        "127.0.0.1".to_string(),
        "::1".to_string(),
    ];
    for ip in extra_hosts {
        let name = ip.to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    let mut params =
        CertificateParams::new(names).map_err(|e| BootstrapError::TlsGenerate(e.to_string()))?;
    params.not_before = OffsetDateTime::now_utc();
    params.not_after = valid_until;

    let mut dn = DistinguishedName::new();
    dn.push(DnType::OrganizationName, organization);
    dn.push(DnType::CommonName, host);
    params.distinguished_name = dn;

    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

    let key_pair = KeyPair::generate().map_err(|e| BootstrapError::TlsGenerate(e.to_string()))?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| BootstrapError::TlsGenerate(e.to_string()))?;

    Ok(CertPair {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    })
}

/// Check the pair loads and belongs together: the certificate parses, is
/// currently valid and carries the key's public half.
pub fn verify_cert_pair(pair: &CertPair) -> Result<(), BootstrapError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(pair.cert_pem.as_bytes())
        .map_err(|e| BootstrapError::TlsInvalidPair(format!("certificate PEM: {}", e)))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| BootstrapError::TlsInvalidPair(format!("certificate: {}", e)))?;
    let key = KeyPair::from_pem(&pair.key_pem)
        .map_err(|e| BootstrapError::TlsInvalidPair(format!("private key: {}", e)))?;

    if cert.public_key().subject_public_key.data.as_ref() != key.public_key_raw() {
        return Err(BootstrapError::TlsInvalidPair(
            "certificate public key does not match private key".to_string(),
        ));
    }
    if !cert.validity().is_valid() {
        return Err(BootstrapError::TlsInvalidPair(
            "certificate is outside its validity period".to_string(),
        ));
    }
    Ok(())
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;

    // The file is created or truncated from here on, so a failure must not
    // leave it behind.
    let mut finish = || -> std::io::Result<()> {
        file.write_all(contents)?;
        file.sync_all()?;

        // mode() only applies to newly created files
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    };
    if let Err(e) = finish() {
        remove_written(&[path]);
        return Err(e);
    }
    Ok(())
}

fn remove_written(written: &[&Path]) {
    for path in written {
        if let Err(e) = fs::remove_file(path) {
            error!(path = %path.display(), err = %e, "cannot remove written certificate file");
        }
    }
}

/// Write cert, CA copy and key in that order, rolling back on failure.
pub fn persist_cert_pair(material: &TlsMaterial, pair: &CertPair) -> Result<(), BootstrapError> {
    let files: [(&Path, &[u8]); 3] = [
        (&material.cert, pair.cert_pem.as_bytes()),
        (&material.ca, pair.cert_pem.as_bytes()),
        (&material.key, pair.key_pem.as_bytes()),
    ];

    let mut written: Vec<&Path> = Vec::with_capacity(files.len());
    for (path, contents) in files {
        if let Err(source) = write_private_file(path, contents) {
            remove_written(&written);
            return Err(BootstrapError::TlsWrite {
                path: path.to_path_buf(),
                source,
            });
        }
        if !written.contains(&path) {
            written.push(path);
        }
    }
    Ok(())
}

/// Generate and persist TLS material when any of it is missing. Returns
/// whether new material was written.
pub fn provision(
    material: &TlsMaterial,
    one_time_key: bool,
    extra_hosts: &[IpAddr],
) -> Result<bool, BootstrapError> {
    if !material.needs_generation(one_time_key) {
        debug!(cert = %material.cert.display(), "TLS material present, nothing to generate");
        return Ok(false);
    }

    info!(
        cert = %material.cert.display(),
        key = %material.key.display(),
        ca = %material.ca.display(),
        "generating TLS certificates"
    );

    for path in [&material.cert, &material.key] {
        if let Some(dir) = path.parent() {
            create_private_dir(dir).map_err(|source| BootstrapError::TlsDirectory {
                path: dir.to_path_buf(),
                source,
            })?;
        }
    }

    let valid_until = OffsetDateTime::now_utc() + time::Duration::days(CERT_VALIDITY_DAYS);
    let pair = generate_cert_pair(CERT_ORGANIZATION, valid_until, extra_hosts)?;
    verify_cert_pair(&pair)?;
    persist_cert_pair(material, &pair)?;

    info!("done generating TLS certificates");
    Ok(true)
}

/// Interface addresses to include in a generated certificate. Failure to
/// enumerate is not fatal; the certificate simply covers fewer names.
pub fn certificate_hosts() -> Vec<IpAddr> {
    match crate::p2p::routeable::routable_addresses() {
        Ok(addrs) => addrs,
        Err(e) => {
            warn!(err = %e, "cannot enumerate interfaces for certificate names");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn material_in(dir: &Path) -> TlsMaterial {
        TlsMaterial {
            cert: dir.join("certs").join("rpc.cert"),
            key: dir.join("keys").join("rpc.key"),
            ca: dir.join("certs").join("ca.cert"),
        }
    }

    #[test]
    fn test_generated_pair_verifies() {
        let valid_until = OffsetDateTime::now_utc() + time::Duration::days(30);
        let pair = generate_cert_pair(CERT_ORGANIZATION, valid_until, &[]).unwrap();
        assert!(pair.cert_pem.contains("BEGIN CERTIFICATE"));
        assert!(pair.key_pem.contains("PRIVATE KEY"));
        verify_cert_pair(&pair).unwrap();
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let valid_until = OffsetDateTime::now_utc() + time::Duration::days(30);
        let a = generate_cert_pair(CERT_ORGANIZATION, valid_until, &[]).unwrap();
        let b = generate_cert_pair(CERT_ORGANIZATION, valid_until, &[]).unwrap();
        let mixed = CertPair {
            cert_pem: a.cert_pem,
            key_pem: b.key_pem,
        };
        assert!(matches!(
            verify_cert_pair(&mixed),
            Err(BootstrapError::TlsInvalidPair(_))
        ));
    }

    #[test]
    fn test_provision_creates_all_three_files() {
        let dir = TempDir::new().unwrap();
        let material = material_in(dir.path());

        assert!(provision(&material, false, &[]).unwrap());
        assert!(material.cert.is_file());
        assert!(material.key.is_file());
        assert!(material.ca.is_file());
        assert_eq!(
            fs::read(&material.cert).unwrap(),
            fs::read(&material.ca).unwrap()
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            for path in [&material.cert, &material.key, &material.ca] {
                let mode = fs::metadata(path).unwrap().permissions().mode();
                assert_eq!(mode & 0o777, 0o600, "{}", path.display());
            }
            let mode = fs::metadata(material.key.parent().unwrap())
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_provision_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let material = material_in(dir.path());

        assert!(provision(&material, false, &[]).unwrap());
        let cert = fs::read(&material.cert).unwrap();
        let key = fs::read(&material.key).unwrap();
        let ca = fs::read(&material.ca).unwrap();

        assert!(!provision(&material, false, &[]).unwrap());
        assert_eq!(fs::read(&material.cert).unwrap(), cert);
        assert_eq!(fs::read(&material.key).unwrap(), key);
        assert_eq!(fs::read(&material.ca).unwrap(), ca);
    }

    #[test]
    fn test_missing_ca_regenerates_everything() {
        let dir = TempDir::new().unwrap();
        let material = material_in(dir.path());
        provision(&material, false, &[]).unwrap();
        let old_key = fs::read(&material.key).unwrap();

        fs::remove_file(&material.ca).unwrap();
        assert!(provision(&material, false, &[]).unwrap());
        assert!(material.ca.is_file());
        assert_ne!(fs::read(&material.key).unwrap(), old_key);
    }

    #[test]
    fn test_one_time_key_tolerates_missing_key() {
        let dir = TempDir::new().unwrap();
        let material = material_in(dir.path());
        provision(&material, false, &[]).unwrap();
        fs::remove_file(&material.key).unwrap();

        assert!(!material.needs_generation(true));
        assert!(!provision(&material, true, &[]).unwrap());
        assert!(!material.key.exists());
        assert!(material.needs_generation(false));
    }

    #[test]
    fn test_failed_key_write_removes_cert_and_ca() {
        let dir = TempDir::new().unwrap();
        let material = material_in(dir.path());
        // A directory where the key file should go makes the last write fail.
        fs::create_dir_all(&material.key).unwrap();

        let err = provision(&material, false, &[]).unwrap_err();
        match err {
            BootstrapError::TlsWrite { path, .. } => assert_eq!(path, material.key),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!material.cert.exists());
        assert!(!material.ca.exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_cert_write_removes_opened_file() {
        // Writes to /dev/full open fine and then fail with ENOSPC.
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let material = material_in(dir.path());
        fs::create_dir_all(material.cert.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(full, &material.cert).unwrap();

        let err = provision(&material, false, &[]).unwrap_err();
        assert!(matches!(err, BootstrapError::TlsWrite { ref path, .. } if *path == material.cert));
        assert!(fs::symlink_metadata(&material.cert).is_err());
        assert!(!material.ca.exists());
        assert!(!material.key.exists());
        assert!(full.exists());
    }

    #[test]
    fn test_failed_ca_write_removes_cert() {
        let dir = TempDir::new().unwrap();
        let material = material_in(dir.path());
        fs::create_dir_all(&material.ca).unwrap();

        let err = provision(&material, false, &[]).unwrap_err();
        assert!(matches!(err, BootstrapError::TlsWrite { ref path, .. } if *path == material.ca));
        assert!(!material.cert.exists());
        assert!(!material.key.exists());
    }
}

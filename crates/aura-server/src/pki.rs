// ============================================
// File: crates/aura-server/src/pki.rs
// ============================================
//! # Root CA Persistence
//!
//! ## Creation Reason
//! A root generated at every start would invalidate every certificate
//! issued before the restart. When paths are configured the root key and
//! certificate are kept on disk and reused.
//!
//! ## Main Functionality
//! - `load_or_initialize`: reuse the root from disk, or create and save it
//!
//! ## ⚠️ Important Note for Next Developer
//! - The key file is written with mode 0600 on Unix
//! - Exactly one of the two files existing is an error, not a reason to
//!   regenerate; regenerating would orphan the existing fleet
//!
//! ## Last Modified
//! v0.1.0 - Initial root persistence

use std::path::Path;

use tracing::{info, warn};

use aura_core::crypto::{CaSettings, CertificateAuthority};

use crate::error::{Result, ServerError};

/// Loads the root CA from `paths` if both files exist, otherwise creates a
/// new root and writes it there. Without paths the root is ephemeral.
///
/// # Errors
/// Returns `StartupFailed` if the files cannot be read, parsed or written,
/// or if only one of them exists.
pub async fn load_or_initialize(
    settings: CaSettings,
    paths: Option<(&Path, &Path)>,
) -> Result<CertificateAuthority> {
    let Some((cert_path, key_path)) = paths else {
        warn!("No root CA paths configured; using an ephemeral root");
        return CertificateAuthority::initialize(settings)
            .map_err(|e| ServerError::startup_failed(format!("root CA generation: {e}")));
    };

    let cert_exists = tokio::fs::try_exists(cert_path).await?;
    let key_exists = tokio::fs::try_exists(key_path).await?;

    match (cert_exists, key_exists) {
        (true, true) => {
            let cert_pem = tokio::fs::read_to_string(cert_path).await?;
            let key_pem = zeroize::Zeroizing::new(tokio::fs::read_to_string(key_path).await?);
            let ca = CertificateAuthority::from_pem(settings, &cert_pem, &key_pem)
                .map_err(|e| ServerError::startup_failed(format!("root CA load: {e}")))?;
            info!(path = %cert_path.display(), "Loaded root CA");
            Ok(ca)
        }
        (false, false) => {
            let ca = CertificateAuthority::initialize(settings)
                .map_err(|e| ServerError::startup_failed(format!("root CA generation: {e}")))?;
            write_root(&ca, cert_path, key_path).await?;
            info!(path = %cert_path.display(), "Generated and saved new root CA");
            Ok(ca)
        }
        _ => Err(ServerError::startup_failed(format!(
            "only one of {} and {} exists",
            cert_path.display(),
            key_path.display()
        ))),
    }
}

async fn write_root(ca: &CertificateAuthority, cert_path: &Path, key_path: &Path) -> Result<()> {
    for path in [cert_path, key_path] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    tokio::fs::write(cert_path, ca.root_certificate_pem()).await?;

    let key_pem = ca.root_key_pem();
    tokio::fs::write(key_path, key_pem.as_bytes()).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(key_path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_root_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("pki/root.pem");
        let key = dir.path().join("pki/root.key");

        let first = load_or_initialize(CaSettings::default(), Some((cert.as_path(), key.as_path())))
            .await
            .unwrap();
        let second = load_or_initialize(CaSettings::default(), Some((cert.as_path(), key.as_path())))
            .await
            .unwrap();

        assert_eq!(first.root_certificate_pem(), second.root_certificate_pem());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&key).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn test_half_present_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("root.pem");
        let key = dir.path().join("root.key");
        std::fs::write(&cert, "x").unwrap();

        let err = load_or_initialize(CaSettings::default(), Some((cert.as_path(), key.as_path())))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::StartupFailed { .. }));
    }

    #[tokio::test]
    async fn test_mismatched_root_pair_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("root.pem");
        let key = dir.path().join("root.key");

        let saved = CertificateAuthority::initialize(CaSettings::default()).unwrap();
        let other = CertificateAuthority::initialize(CaSettings::default()).unwrap();
        std::fs::write(&cert, saved.root_certificate_pem()).unwrap();
        std::fs::write(&key, other.root_key_pem().as_bytes()).unwrap();

        let err = load_or_initialize(CaSettings::default(), Some((cert.as_path(), key.as_path())))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::StartupFailed { .. }));
        assert!(err.to_string().contains("root CA load"));
    }

    #[tokio::test]
    async fn test_ephemeral_root() {
        let a = load_or_initialize(CaSettings::default(), None).await.unwrap();
        let b = load_or_initialize(CaSettings::default(), None).await.unwrap();
        assert_ne!(a.root_certificate_pem(), b.root_certificate_pem());
    }
}

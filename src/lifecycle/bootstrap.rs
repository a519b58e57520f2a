//! First-run materialization for the local searxng service.
//!
//! Copies the bundled default settings and compose file into the per-user
//! configuration directory when absent and generates a persistent secret
//! (64 hex chars, mode 0600) that is reused on every later run.

use std::path::{Path, PathBuf};

use rand::Rng;
use tokio::fs;
use tracing::{debug, info};

use crate::error::SearchError;

const SETTINGS_TEMPLATE: &str = include_str!("../../assets/searxng/settings.yml");
const COMPOSE_TEMPLATE: &str = include_str!("../../assets/searxng/docker-compose.yml");

/// Filesystem layout produced by [`ensure_searxng_files`].
#[derive(Debug, Clone)]
pub struct SearxngPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub settings_file: PathBuf,
    pub secret_file: PathBuf,
    pub compose_file: PathBuf,
}

/// Make sure the searxng config and data directories exist and hold the
/// default settings, the compose file and the per-install secret.
/// Idempotent: existing files are never overwritten.
pub async fn ensure_searxng_files(
    app_config_dir: &Path,
    app_data_dir: &Path,
) -> Result<SearxngPaths, SearchError> {
    let base = app_config_dir.join("searxng");
    let config_dir = base.join("config");
    let data_dir = app_data_dir.join("searxng").join("data");

    fs::create_dir_all(&config_dir).await?;
    fs::create_dir_all(&data_dir).await?;

    let secret_file = config_dir.join(".secret");
    let secret = ensure_secret(&secret_file).await?;

    let settings_file = config_dir.join("settings.yml");
    if !settings_file.exists() {
        info!(path = %settings_file.display(), "writing default searxng settings");
        let settings = SETTINGS_TEMPLATE.replace("{{secret_key}}", &secret);
        fs::write(&settings_file, settings).await?;
    }

    let compose_file = base.join("docker-compose.yml");
    if !compose_file.exists() {
        info!(path = %compose_file.display(), "writing default searxng compose file");
        let compose = COMPOSE_TEMPLATE
            .replace("{{config_dir}}", &config_dir.display().to_string())
            .replace("{{data_dir}}", &data_dir.display().to_string());
        fs::write(&compose_file, compose).await?;
    }

    Ok(SearxngPaths {
        config_dir,
        data_dir,
        settings_file,
        secret_file,
        compose_file,
    })
}

/// Read the per-install secret, generating it on first run.
async fn ensure_secret(path: &Path) -> Result<String, SearchError> {
    if path.exists() {
        let existing = fs::read_to_string(path).await?;
        let existing = existing.trim().to_string();
        if existing.len() >= 32 {
            debug!(path = %path.display(), "reusing existing searxng secret");
            return Ok(existing);
        }
    }

    let secret = generate_secret();
    fs::write(path, &secret).await?;
    restrict_permissions(path).await?;
    info!(path = %path.display(), "generated new searxng secret");
    Ok(secret)
}

fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes[..]);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), SearchError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), SearchError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn materializes_settings_secret_and_compose_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_dir = tmp.path().join("config");
        let data_dir = tmp.path().join("data");

        let paths = ensure_searxng_files(&config_dir, &data_dir).await.unwrap();

        assert!(paths.settings_file.exists());
        assert!(paths.secret_file.exists());
        assert!(paths.compose_file.exists());
        assert!(paths.data_dir.exists());

        let secret = std::fs::read_to_string(&paths.secret_file).unwrap();
        assert!(secret.trim().len() >= 32);
        assert!(secret.trim().chars().all(|c| c.is_ascii_hexdigit()));

        let settings = std::fs::read_to_string(&paths.settings_file).unwrap();
        assert!(settings.contains(secret.trim()));
    }

    #[tokio::test]
    async fn secret_is_reused_across_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let config_dir = tmp.path().join("config");
        let data_dir = tmp.path().join("data");

        let first = ensure_searxng_files(&config_dir, &data_dir).await.unwrap();
        let secret_before = std::fs::read_to_string(&first.secret_file).unwrap();

        let second = ensure_searxng_files(&config_dir, &data_dir).await.unwrap();
        let secret_after = std::fs::read_to_string(&second.secret_file).unwrap();

        assert_eq!(secret_before, secret_after);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn secret_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let paths = ensure_searxng_files(&tmp.path().join("c"), &tmp.path().join("d"))
            .await
            .unwrap();

        let mode = std::fs::metadata(&paths.secret_file)
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

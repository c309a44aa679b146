//! Environment construction for git invocations.
//!
//! Every invocation runs with a restricted environment: an explicit
//! allow-list of inherited variables plus `GIT_TERMINAL_PROMPT=0` so git can
//! never stop to ask a question. Credentials are layered on top from the
//! configured auth settings.

use std::path::PathBuf;

use crate::config::{GitAuthSettings, GitAuthType};
use crate::git::error::{GitError, Result};

/// Env vars allowed to be inherited from the parent process. `PATH` is needed
/// to locate the git binary itself once the environment is cleared.
const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "http_proxy",
    "https_proxy",
    "no_proxy",
    "HOME",
    "GNUPGHOME",
];

/// Builds the base environment for a git invocation.
pub fn base_env() -> Vec<(String, String)> {
    let mut env = vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())];
    for key in ALLOWED_ENV_VARS {
        if let Ok(value) = std::env::var(key) {
            env.push((key.to_string(), value));
        }
    }
    env
}

/// Escapes a token for safe use in single-quoted shell strings.
pub fn shell_escape(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// RAII guard for askpass script cleanup.
///
/// Deletes the script when dropped so tokens are not left on disk even when
/// the surrounding operation errors.
#[derive(Debug)]
pub struct AskpassCleanup {
    path: Option<PathBuf>,
}

impl AskpassCleanup {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn empty() -> Self {
        Self { path: None }
    }
}

impl Drop for AskpassCleanup {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("Failed to clean up askpass script: {}", e);
            }
        }
    }
}

/// Authentication environment for a git invocation.
#[derive(Debug)]
pub struct AuthEnv {
    /// Extra environment variables to set.
    pub env_vars: Vec<(String, String)>,
    /// Must outlive the git command to keep the askpass script alive.
    pub _cleanup: AskpassCleanup,
}

impl AuthEnv {
    fn none() -> Self {
        Self {
            env_vars: Vec::new(),
            _cleanup: AskpassCleanup::empty(),
        }
    }
}

/// Builds the auth environment from settings.
///
/// Tokens are resolved from the configured env var at call time and handed
/// to git through a short-lived `GIT_ASKPASS` script; SSH keys through
/// `GIT_SSH_COMMAND`.
pub fn build_auth_env(auth: &GitAuthSettings) -> Result<AuthEnv> {
    match auth.auth_type {
        GitAuthType::None => Ok(AuthEnv::none()),
        GitAuthType::Token => {
            if auth.token_env_var.is_empty() {
                return Err(GitError::Auth(
                    "token auth selected but tokenEnvVar is not set".to_string(),
                ));
            }
            let token = std::env::var(&auth.token_env_var).map_err(|_| {
                GitError::Auth(format!(
                    "token env var '{}' is not set",
                    auth.token_env_var
                ))
            })?;

            let script_path = std::env::temp_dir()
                .join(format!(".driftsync-askpass-{}.sh", uuid::Uuid::new_v4()));
            let script = format!("#!/bin/sh\necho '{}'", shell_escape(&token));

            #[cfg(unix)]
            {
                use std::io::Write;
                use std::os::unix::fs::OpenOptionsExt;
                let mut file = std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o700)
                    .open(&script_path)?;
                file.write_all(script.as_bytes())?;
            }
            #[cfg(not(unix))]
            std::fs::write(&script_path, &script)?;

            let cleanup = AskpassCleanup::new(script_path.clone());
            let script_str = script_path
                .to_str()
                .ok_or_else(|| {
                    GitError::Auth("temp directory path is not valid UTF-8".to_string())
                })?
                .to_string();

            Ok(AuthEnv {
                env_vars: vec![("GIT_ASKPASS".to_string(), script_str)],
                _cleanup: cleanup,
            })
        }
        GitAuthType::SshKey => {
            let key_path = if auth.ssh_key_path.is_empty() {
                dirs::home_dir()
                    .map(|h| h.join(".ssh").join("id_ed25519"))
                    .unwrap_or_else(|| PathBuf::from(".ssh/id_ed25519"))
            } else if let Some(rest) = auth.ssh_key_path.strip_prefix("~/") {
                dirs::home_dir()
                    .map(|h| h.join(rest))
                    .unwrap_or_else(|| PathBuf::from(&auth.ssh_key_path))
            } else {
                PathBuf::from(&auth.ssh_key_path)
            };

            if !key_path.exists() {
                return Err(GitError::Auth(format!(
                    "SSH key file not found: {}",
                    key_path.display()
                )));
            }

            let escaped = shell_escape(&key_path.display().to_string());
            Ok(AuthEnv {
                env_vars: vec![(
                    "GIT_SSH_COMMAND".to_string(),
                    format!("ssh -i '{}' -o StrictHostKeyChecking=accept-new", escaped),
                )],
                _cleanup: AskpassCleanup::empty(),
            })
        }
    }
}

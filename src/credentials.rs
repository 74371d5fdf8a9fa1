//! Credential storage in the OS credential store.
//!
//! Entries are keyed `{service, name}` where `name` is `provider` for the
//! active provider id and `{provider}_{field}` for the per-provider fields
//! (`api_key`, `expert_model`, `parsing_model`). Storing an empty string for
//! a field deletes that entry instead; deleting an entry that does not exist
//! is a no-op.
//!
//! The platform store is reached through the [`SecretStore`] trait so tests
//! (and any embedding that manages secrets differently) can inject an
//! in-memory implementation instead of touching the real keychain.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

/// Errors from the credential backend.
///
/// Missing entries are not errors — they surface as `Ok(None)`. This only
/// fires when the backend itself is unreachable (locked keychain, no
/// session keyring, etc.).
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential store access failed: {0}")]
    Backend(String),
}

/// Minimal key/value secret storage.
pub trait SecretStore: Send + Sync {
    /// Read a secret. `Ok(None)` when no entry exists.
    fn get(&self, name: &str) -> Result<Option<String>, CredentialError>;
    /// Write (or overwrite) a secret.
    fn set(&self, name: &str, value: &str) -> Result<(), CredentialError>;
    /// Remove a secret. Removing a missing entry succeeds silently.
    fn delete(&self, name: &str) -> Result<(), CredentialError>;
}

// ── Keyring-backed store ──────────────────────────────────────────────────

/// [`SecretStore`] backed by the platform credential store via the
/// `keyring` crate, namespaced under a fixed service name.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, name: &str) -> Result<keyring::Entry, CredentialError> {
        keyring::Entry::new(&self.service, name)
            .map_err(|e| CredentialError::Backend(e.to_string()))
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, name: &str) -> Result<Option<String>, CredentialError> {
        match self.entry(name)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CredentialError::Backend(e.to_string())),
        }
    }

    fn set(&self, name: &str, value: &str) -> Result<(), CredentialError> {
        self.entry(name)?
            .set_password(value)
            .map_err(|e| CredentialError::Backend(e.to_string()))
    }

    fn delete(&self, name: &str) -> Result<(), CredentialError> {
        match self.entry(name)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CredentialError::Backend(e.to_string())),
        }
    }
}

// ── In-memory store ───────────────────────────────────────────────────────

/// In-process [`SecretStore`] used by the test suite and by deployments
/// that must not touch the OS keychain. Contents die with the process.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl SecretStore for MemoryStore {
    fn get(&self, name: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.entries.lock().unwrap().get(name).cloned())
    }

    fn set(&self, name: &str, value: &str) -> Result<(), CredentialError> {
        self.entries
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), CredentialError> {
        self.entries.lock().unwrap().remove(name);
        Ok(())
    }
}

// ── Credential store ──────────────────────────────────────────────────────

/// The stored LLM credentials, as read back from the secret store.
///
/// All-empty when no provider was ever stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub provider: String,
    pub api_key: Option<String>,
    pub expert_model: Option<String>,
    pub parsing_model: Option<String>,
}

/// Typed facade over a [`SecretStore`] holding the provider id, API key and
/// the two role-specific model ids.
///
/// Validation is deliberately absent here — the transport layer decides what
/// is acceptable input, the resolver decides what is usable configuration.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn SecretStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Store against the OS credential store under `service`.
    pub fn keyring(service: &str) -> Self {
        Self::new(Arc::new(KeyringStore::new(service)))
    }

    /// Store backed by process memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()))
    }

    /// Persist credentials. An explicitly empty string clears that field;
    /// a `None` model id leaves the existing entry untouched.
    pub fn set_credentials(
        &self,
        provider: &str,
        api_key: &str,
        expert_model: Option<&str>,
        parsing_model: Option<&str>,
    ) -> Result<(), CredentialError> {
        self.set_field("provider", provider)?;
        self.set_field(&format!("{provider}_api_key"), api_key)?;
        if let Some(model) = expert_model {
            self.set_field(&format!("{provider}_expert_model"), model)?;
        }
        if let Some(model) = parsing_model {
            self.set_field(&format!("{provider}_parsing_model"), model)?;
        }
        debug!(provider, "stored LLM credentials");
        Ok(())
    }

    /// Read back the stored credentials. All-empty when no provider is set.
    pub fn get_credentials(&self) -> Result<Credentials, CredentialError> {
        let provider = self.store.get("provider")?.unwrap_or_default();
        if provider.is_empty() {
            return Ok(Credentials::default());
        }
        Ok(Credentials {
            api_key: self.store.get(&format!("{provider}_api_key"))?,
            expert_model: self.store.get(&format!("{provider}_expert_model"))?,
            parsing_model: self.store.get(&format!("{provider}_parsing_model"))?,
            provider,
        })
    }

    fn set_field(&self, name: &str, value: &str) -> Result<(), CredentialError> {
        if value.is_empty() {
            self.store.delete(name)
        } else {
            self.store.set(name, value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_fields() {
        let store = CredentialStore::in_memory();
        store
            .set_credentials("openai", "sk-test-123", Some("gpt-4o"), Some("gpt-4o-mini"))
            .unwrap();

        let creds = store.get_credentials().unwrap();
        assert_eq!(creds.provider, "openai");
        assert_eq!(creds.api_key.as_deref(), Some("sk-test-123"));
        assert_eq!(creds.expert_model.as_deref(), Some("gpt-4o"));
        assert_eq!(creds.parsing_model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn empty_store_reads_all_empty() {
        let store = CredentialStore::in_memory();
        assert_eq!(store.get_credentials().unwrap(), Credentials::default());
    }

    #[test]
    fn empty_string_clears_a_field() {
        let store = CredentialStore::in_memory();
        store
            .set_credentials("openai", "sk-test-123", Some("gpt-4o"), None)
            .unwrap();
        store
            .set_credentials("openai", "sk-test-123", Some(""), None)
            .unwrap();

        let creds = store.get_credentials().unwrap();
        assert_eq!(creds.expert_model, None);
        assert_eq!(creds.api_key.as_deref(), Some("sk-test-123"));
    }

    #[test]
    fn none_leaves_existing_model_untouched() {
        let store = CredentialStore::in_memory();
        store
            .set_credentials("openai", "sk-test-123", Some("gpt-4o"), None)
            .unwrap();
        store.set_credentials("openai", "sk-new", None, None).unwrap();

        let creds = store.get_credentials().unwrap();
        assert_eq!(creds.expert_model.as_deref(), Some("gpt-4o"));
        assert_eq!(creds.api_key.as_deref(), Some("sk-new"));
    }

    #[test]
    fn clearing_missing_fields_is_a_noop() {
        let store = CredentialStore::in_memory();
        // Nothing stored yet: clearing every field must not error.
        store.set_credentials("openai", "", Some(""), Some("")).unwrap();

        let creds = store.get_credentials().unwrap();
        assert_eq!(creds.provider, "openai");
        assert_eq!(creds.api_key, None);
        assert_eq!(creds.expert_model, None);
        assert_eq!(creds.parsing_model, None);
    }
}

//! LDAP protocol client backed by `ldap3`.
//!
//! # Responsibilities
//! - Open the TCP/TLS connection and perform the simple bind
//! - Probe with a base-scope search on the configured base DN
//! - Read single entries for callers of `execute`

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use std::collections::HashMap;

use crate::config::ConnectionConfig;
use crate::connection::session::{DirectoryConnector, DirectoryError, DirectorySession};

const PROBE_FILTER: &str = "(objectClass=*)";

/// Connects with `ldap3` using the manager's configuration.
#[derive(Debug, Clone, Default)]
pub struct LdapConnector;

impl LdapConnector {
    pub fn new() -> Self {
        Self
    }
}

/// An authenticated `ldap3` handle.
pub struct LdapSession {
    ldap: Ldap,
}

impl LdapSession {
    /// Read the attributes of the entry at `dn`.
    pub async fn read_entry(
        &mut self,
        dn: &str,
    ) -> Result<HashMap<String, Vec<String>>, DirectoryError> {
        let (entries, _) = self
            .ldap
            .search(dn, Scope::Base, PROBE_FILTER, vec!["*"])
            .await
            .map_err(to_directory_error)?
            .success()
            .map_err(to_directory_error)?;

        match entries.into_iter().next() {
            Some(entry) => Ok(SearchEntry::construct(entry).attrs),
            None => Err(DirectoryError::new(format!("no such entry: {}", dn))),
        }
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    type Session = LdapSession;

    async fn bind(&self, config: &ConnectionConfig) -> Result<LdapSession, DirectoryError> {
        require_password(config)?;

        let settings = LdapConnSettings::new().set_conn_timeout(config.timeouts.bind);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &config.url())
            .await
            .map_err(to_directory_error)?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::debug!(error = %e, "LDAP connection driver exited");
            }
        });

        ldap.simple_bind(
            &config.credentials.bind_identity,
            &config.credentials.password,
        )
        .await
        .map_err(to_directory_error)?
        .success()
        .map_err(to_directory_error)?;

        Ok(LdapSession { ldap })
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn probe(&mut self, base_dn: &str) -> Result<(), DirectoryError> {
        self.ldap
            .search(base_dn, Scope::Base, PROBE_FILTER, vec!["objectClass"])
            .await
            .map_err(to_directory_error)?
            .success()
            .map_err(to_directory_error)?;
        Ok(())
    }

    async fn unbind(&mut self) -> Result<(), DirectoryError> {
        self.ldap.unbind().await.map_err(to_directory_error)
    }
}

/// A simple bind with an empty password is an unauthenticated bind that most
/// servers accept, so refuse it before touching the network.
fn require_password(config: &ConnectionConfig) -> Result<(), DirectoryError> {
    if config.credentials.password.is_empty() {
        return Err(DirectoryError::new(
            "invalid credentials: password is mandatory in simple bind",
        ));
    }
    Ok(())
}

fn to_directory_error(e: ldap3::LdapError) -> DirectoryError {
    DirectoryError::new(e.to_string())
}

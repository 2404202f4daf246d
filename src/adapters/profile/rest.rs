//! PostgREST profile resolver.
//!
//! Reads the `profiles` table through the hosted database's REST interface:
//!
//! ```text
//! GET {url}/rest/v1/{table}?id=eq.{principal_id}&select=*
//! apikey: {api_key}
//! Authorization: Bearer {access token or api_key}
//! ```
//!
//! With a session source attached, each lookup is authorized with the
//! principal's live access token so row-level security on the table sees
//! the signed-in user. Without one, the API key is the bearer.
//!
//! The response is a JSON array. Zero rows means the principal has no
//! profile; more than one row is a backend fault.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::foundation::{PrincipalId, ProfileLookupError};
use crate::domain::identity::{Profile, Session};
use crate::ports::{ProfileResolver, SessionProvider};

/// Configuration for the REST profile resolver.
#[derive(Debug, Clone)]
pub struct RestProfileConfig {
    /// Base URL of the hosted project.
    pub url: String,

    /// Public API key, sent as `apikey` and as the default bearer token.
    pub api_key: SecretString,

    /// Table holding one row per principal.
    pub table: String,

    pub timeout: Duration,
}

impl RestProfileConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: SecretString::new(api_key.into()),
            table: "profiles".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), self.table)
    }
}

/// `ProfileResolver` backed by the PostgREST API.
pub struct RestProfileResolver {
    config: RestProfileConfig,
    http_client: reqwest::Client,
    sessions: Option<Arc<dyn SessionProvider>>,
}

impl RestProfileResolver {
    pub fn new(config: RestProfileConfig) -> Result<Self, ProfileLookupError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProfileLookupError::provider(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            sessions: None,
        })
    }

    /// Authorizes each lookup with the live session's access token.
    ///
    /// Needed when row-level security limits each principal to its own row.
    pub fn with_session_source(mut self, sessions: Arc<dyn SessionProvider>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// The live session, when it belongs to `principal_id`.
    async fn session_for(&self, principal_id: &PrincipalId) -> Result<Option<Session>, ProfileLookupError> {
        let Some(sessions) = &self.sessions else {
            return Ok(None);
        };

        let session = sessions.current_session().await.map_err(|e| {
            tracing::error!("Session lookup for profile request failed: {}", e);
            ProfileLookupError::provider(format!("Session lookup failed: {}", e))
        })?;

        match session {
            Some(session) if session.principal_id() == principal_id => Ok(Some(session)),
            _ => {
                tracing::debug!(principal_id = %principal_id, "no live session for principal, using api key");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ProfileResolver for RestProfileResolver {
    async fn fetch_profile(&self, principal_id: &PrincipalId) -> Result<Profile, ProfileLookupError> {
        let session = self.session_for(principal_id).await?;
        let bearer = session
            .as_ref()
            .map(Session::access_token)
            .unwrap_or(&self.config.api_key);
        let filter = format!("eq.{}", principal_id);

        let response = self
            .http_client
            .get(self.config.table_url())
            .query(&[("id", filter.as_str()), ("select", "*")])
            .header("apikey", self.config.api_key.expose_secret())
            .bearer_auth(bearer.expose_secret())
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Profile request failed: {}", e);
                ProfileLookupError::provider(format!("Profile request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Profile lookup returned {}: {}", status, body);
            return Err(ProfileLookupError::provider(format!(
                "Profile lookup returned {}",
                status
            )));
        }

        let rows: Vec<serde_json::Value> = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse profile response: {}", e);
            ProfileLookupError::provider(format!("Failed to parse profile response: {}", e))
        })?;

        single_profile(rows, principal_id)
    }
}

impl std::fmt::Debug for RestProfileResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestProfileResolver")
            .field("url", &self.config.url)
            .field("table", &self.config.table)
            .field("session_source", &self.sessions.is_some())
            .finish_non_exhaustive()
    }
}

/// Maps a filtered result set onto exactly one profile.
fn single_profile(
    mut rows: Vec<serde_json::Value>,
    principal_id: &PrincipalId,
) -> Result<Profile, ProfileLookupError> {
    if rows.len() > 1 {
        return Err(ProfileLookupError::provider(format!(
            "{} profile rows for principal {}",
            rows.len(),
            principal_id
        )));
    }
    let Some(row) = rows.pop() else {
        return Err(ProfileLookupError::NotFound);
    };

    let profile: Profile = serde_json::from_value(row).map_err(|e| {
        tracing::error!("Malformed profile row for {}: {}", principal_id, e);
        ProfileLookupError::provider(format!("Malformed profile row: {}", e))
    })?;

    // A row owned by someone else is no row at all.
    if !profile.belongs_to(principal_id) {
        tracing::warn!(
            principal_id = %principal_id,
            profile_id = %profile.id,
            "profile lookup returned a foreign row"
        );
        return Err(ProfileLookupError::NotFound);
    }
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemorySessionProvider;
    use crate::domain::foundation::AuthError;
    use crate::domain::identity::Role;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pid(id: &str) -> PrincipalId {
        PrincipalId::new(id).unwrap()
    }

    fn row(id: &str, role: &str) -> serde_json::Value {
        json!({
            "id": id,
            "role": role,
            "full_name": "Ana Ruiz",
            "fid": "COL-1",
            "creado_en": "2024-03-01T09:00:00Z",
            "actualizado_en": "2024-03-01T09:00:00Z"
        })
    }

    #[test]
    fn config_builds_table_url() {
        let config = RestProfileConfig::new("https://project.example.co/", "key").with_table("perfiles");
        assert_eq!(config.table_url(), "https://project.example.co/rest/v1/perfiles");
    }

    #[test]
    fn config_defaults_to_profiles_table() {
        let config = RestProfileConfig::new("https://project.example.co", "key");
        assert_eq!(config.table, "profiles");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn single_row_maps_to_profile() {
        let profile = single_profile(vec![row("u1", "medico")], &pid("u1")).unwrap();
        assert_eq!(profile.role, Role::Physician);
        assert_eq!(profile.national_id.as_deref(), Some("COL-1"));
    }

    #[test]
    fn empty_result_is_not_found() {
        assert_eq!(single_profile(vec![], &pid("u1")), Err(ProfileLookupError::NotFound));
    }

    #[test]
    fn several_rows_is_provider_error() {
        let result = single_profile(vec![row("u1", "admin"), row("u1", "admin")], &pid("u1"));
        assert!(matches!(result, Err(ProfileLookupError::Provider(_))));
    }

    #[test]
    fn foreign_row_is_not_found() {
        assert_eq!(
            single_profile(vec![row("u2", "admin")], &pid("u1")),
            Err(ProfileLookupError::NotFound)
        );
    }

    #[test]
    fn unknown_role_is_provider_error() {
        let result = single_profile(vec![row("u1", "nurse")], &pid("u1"));
        assert!(matches!(result, Err(ProfileLookupError::Provider(_))));
    }

    #[tokio::test]
    async fn unreachable_backend_is_provider_error() {
        let resolver = RestProfileResolver::new(
            RestProfileConfig::new("http://127.0.0.1:9", "key").with_timeout(Duration::from_secs(1)),
        )
        .unwrap();

        let result = resolver.fetch_profile(&pid("u1")).await;
        assert!(matches!(result, Err(ProfileLookupError::Provider(_))));
    }

    // Row-level security: only the owner's token sees the row.
    async fn rls_backend() -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("id", "eq.u1"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([row("u1", "medico")])))
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        server
    }

    fn signed_in_as_u1() -> Arc<InMemorySessionProvider> {
        let provider = InMemorySessionProvider::new().with_signed_in("u1");
        assert_eq!(
            provider.current_snapshot().unwrap().access_token().expose_secret(),
            "access-1"
        );
        Arc::new(provider)
    }

    #[tokio::test]
    async fn lookup_uses_live_session_token() {
        let server = rls_backend().await;
        let provider = signed_in_as_u1();
        let resolver = RestProfileResolver::new(RestProfileConfig::new(server.uri(), "anon"))
            .unwrap()
            .with_session_source(provider.clone());

        let profile = resolver.fetch_profile(&pid("u1")).await.unwrap();

        assert_eq!(profile.role, Role::Physician);
        assert_eq!(provider.session_lookup_count(), 1);
    }

    #[tokio::test]
    async fn lookup_without_session_source_sees_no_rows() {
        let server = rls_backend().await;
        let resolver = RestProfileResolver::new(RestProfileConfig::new(server.uri(), "anon")).unwrap();

        assert_eq!(resolver.fetch_profile(&pid("u1")).await, Err(ProfileLookupError::NotFound));
    }

    #[tokio::test]
    async fn session_of_another_principal_is_not_used() {
        let server = rls_backend().await;
        let resolver = RestProfileResolver::new(RestProfileConfig::new(server.uri(), "anon"))
            .unwrap()
            .with_session_source(signed_in_as_u1());

        // u2's lookup must not borrow u1's token.
        assert_eq!(resolver.fetch_profile(&pid("u2")).await, Err(ProfileLookupError::NotFound));
    }

    #[tokio::test]
    async fn session_lookup_failure_is_provider_error() {
        let server = rls_backend().await;
        let provider = signed_in_as_u1();
        provider.set_error(AuthError::provider("503"));
        let resolver = RestProfileResolver::new(RestProfileConfig::new(server.uri(), "anon"))
            .unwrap()
            .with_session_source(provider);

        let result = resolver.fetch_profile(&pid("u1")).await;
        assert!(matches!(result, Err(ProfileLookupError::Provider(_))));
    }
}

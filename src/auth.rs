//! OAuth access tokens for Google APIs.
//!
//! Tokens come from one of:
//!
//! * a fixed token given on the command line,
//! * a service account key file, exchanged for tokens with a signed JWT assertion,
//! * the compute metadata server when running on Google Cloud.
//!
//! Fetched tokens are cached until shortly before they expire.

use crate::cli::CommandLineArgs;
use crate::error::PastizalesError;

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Token endpoint of the compute metadata server
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Default OAuth token endpoint for service account keys
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope covering Firestore and Earth Engine
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for JWT assertions. Google accepts at most one hour.
const ASSERTION_LIFETIME: i64 = 3600;

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Token as returned by the metadata server and the OAuth token endpoint
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// A token along with the instant after which it must be refreshed
pub struct CachedToken {
    token: String,
    refresh_at: Instant,
}

impl CachedToken {
    fn fresh(&self) -> Option<String> {
        (Instant::now() < self.refresh_at).then(|| self.token.clone())
    }
}

/// The fields of a service account key file used for token exchange
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Claims of a JWT bearer assertion
#[derive(Debug, Deserialize, Serialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

impl ServiceAccountKey {
    /// Read a service account key from a JSON key file.
    pub fn from_file(path: &Path) -> Result<Self, PastizalesError> {
        let credentials_error = |message: String| PastizalesError::Credentials {
            path: path.display().to_string(),
            message,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| credentials_error(e.to_string()))?;
        let key: ServiceAccountKey =
            serde_json::from_str(&contents).map_err(|e| credentials_error(e.to_string()))?;
        // The private key must be an RSA PEM.
        EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| credentials_error(e.to_string()))?;
        Ok(key)
    }

    /// Sign a JWT assertion issued at `now`, in seconds since the epoch.
    fn assertion(&self, now: i64) -> Result<String, PastizalesError> {
        let access_token_error = |e: jsonwebtoken::errors::Error| PastizalesError::AccessToken {
            message: e.to_string(),
        };
        let key =
            EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(access_token_error)?;
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        let claims = Claims {
            iss: self.client_email.clone(),
            scope: CLOUD_PLATFORM_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME,
        };
        jsonwebtoken::encode(&header, &claims, &key).map_err(access_token_error)
    }
}

/// Where refreshable tokens come from
#[derive(Debug)]
pub enum TokenProvider {
    /// The compute metadata server at the given URL
    MetadataServer { url: String },
    /// A service account key, exchanged at its token URI
    ServiceAccount(ServiceAccountKey),
}

/// Source of bearer tokens for outgoing requests.
pub enum TokenSource {
    /// A fixed token from configuration
    Static(String),
    /// Tokens fetched from a provider and cached until shortly before expiry
    Refreshing {
        client: reqwest::Client,
        provider: TokenProvider,
        cache: RwLock<Option<CachedToken>>,
    },
    /// No authorization header at all
    Anonymous,
}

impl TokenSource {
    /// Create a token source from command line arguments.
    ///
    /// In order of precedence: anonymous access, a static token, a service account key file,
    /// then the metadata server.
    ///
    /// # Arguments
    ///
    /// * `args`: Command line arguments
    /// * `client`: HTTP client used to fetch tokens
    pub fn from_args(
        args: &CommandLineArgs,
        client: reqwest::Client,
    ) -> Result<Self, PastizalesError> {
        if args.anonymous {
            Ok(TokenSource::Anonymous)
        } else if let Some(token) = &args.access_token {
            Ok(TokenSource::Static(token.clone()))
        } else if let Some(path) = &args.credentials_file {
            let key = ServiceAccountKey::from_file(Path::new(path))?;
            tracing::info!("using service account {}", key.client_email);
            Ok(Self::refreshing(client, TokenProvider::ServiceAccount(key)))
        } else {
            Ok(Self::refreshing(
                client,
                TokenProvider::MetadataServer {
                    url: METADATA_TOKEN_URL.to_string(),
                },
            ))
        }
    }

    /// Create a token source that fetches tokens from a provider.
    pub fn refreshing(client: reqwest::Client, provider: TokenProvider) -> Self {
        TokenSource::Refreshing {
            client,
            provider,
            cache: RwLock::new(None),
        }
    }

    /// Return the current token, if any.
    pub async fn token(&self) -> Result<Option<String>, PastizalesError> {
        match self {
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::Anonymous => Ok(None),
            TokenSource::Refreshing {
                client,
                provider,
                cache,
            } => {
                if let Some(token) = cache.read().await.as_ref().and_then(CachedToken::fresh) {
                    return Ok(Some(token));
                }
                let mut cached = cache.write().await;
                // Another request may have refreshed the token while we waited for the lock.
                if let Some(token) = cached.as_ref().and_then(CachedToken::fresh) {
                    return Ok(Some(token));
                }
                let fresh = fetch_token(client, provider).await?;
                let token = fresh.token.clone();
                *cached = Some(fresh);
                Ok(Some(token))
            }
        }
    }

    /// Attach the current token, if any, to a request.
    pub async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, PastizalesError> {
        Ok(match self.token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }
}

#[tracing::instrument(level = "DEBUG", skip(client))]
async fn fetch_token(
    client: &reqwest::Client,
    provider: &TokenProvider,
) -> Result<CachedToken, PastizalesError> {
    let access_token_error = |e: reqwest::Error| PastizalesError::AccessToken {
        message: e.to_string(),
    };
    let request = match provider {
        TokenProvider::MetadataServer { url } => {
            client.get(url).header("Metadata-Flavor", "Google")
        }
        TokenProvider::ServiceAccount(key) => {
            let assertion = key.assertion(OffsetDateTime::now_utc().unix_timestamp())?;
            client
                .post(&key.token_uri)
                .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        }
    };
    let response = request.send().await.map_err(access_token_error)?;
    let response = response.error_for_status().map_err(access_token_error)?;
    let token: TokenResponse = response.json().await.map_err(access_token_error)?;
    tracing::debug!("obtained access token valid for {}s", token.expires_in);
    let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
    Ok(CachedToken {
        token: token.access_token,
        refresh_at: Instant::now() + lifetime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::spawn_router;

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, routing::post, Form, Json, Router};
    use jsonwebtoken::{DecodingKey, Validation};
    use serde_json::{json, Value};

    // Nothing listens on port 1, so any request fails quickly.
    const UNREACHABLE: &str = "http://127.0.0.1:1/token";

    const TEST_KEY: &str = include_str!("../testdata/test_rsa_key.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("../testdata/test_rsa_key.pub.pem");

    fn metadata_source(cached: Option<CachedToken>) -> TokenSource {
        TokenSource::Refreshing {
            client: reqwest::Client::new(),
            provider: TokenProvider::MetadataServer {
                url: UNREACHABLE.to_string(),
            },
            cache: RwLock::new(cached),
        }
    }

    fn service_account(token_uri: &str) -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "server@pastizales.iam.gserviceaccount.com".to_string(),
            private_key: TEST_KEY.to_string(),
            private_key_id: Some("k1".to_string()),
            token_uri: token_uri.to_string(),
        }
    }

    type Exchanges = Arc<Mutex<Vec<HashMap<String, String>>>>;

    async fn token_endpoint(
        State(exchanges): State<Exchanges>,
        Form(form): Form<HashMap<String, String>>,
    ) -> Json<Value> {
        let mut exchanges = exchanges.lock().unwrap();
        exchanges.push(form);
        Json(json!({
            "access_token": format!("token-{}", exchanges.len()),
            "expires_in": 3599,
            "token_type": "Bearer",
        }))
    }

    #[tokio::test]
    async fn static_token() {
        let source = TokenSource::Static("abc".to_string());
        assert_eq!(Some("abc".to_string()), source.token().await.unwrap());
    }

    #[tokio::test]
    async fn anonymous() {
        let source = TokenSource::Anonymous;
        assert_eq!(None, source.token().await.unwrap());
    }

    #[tokio::test]
    async fn cached_token_is_reused() {
        let source = metadata_source(Some(CachedToken {
            token: "cached".to_string(),
            refresh_at: Instant::now() + Duration::from_secs(600),
        }));
        assert_eq!(Some("cached".to_string()), source.token().await.unwrap());
    }

    #[tokio::test]
    async fn expired_token_is_refreshed() {
        let source = metadata_source(Some(CachedToken {
            token: "stale".to_string(),
            refresh_at: Instant::now(),
        }));
        match source.token().await {
            Err(PastizalesError::AccessToken { message: _ }) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn signed_assertion() {
        let key = service_account(GOOGLE_TOKEN_URL);
        let assertion = key.assertion(1_700_000_000).unwrap();
        let header = jsonwebtoken::decode_header(&assertion).unwrap();
        assert_eq!(Algorithm::RS256, header.alg);
        assert_eq!(Some("k1".to_string()), header.kid);

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[GOOGLE_TOKEN_URL]);
        validation.validate_exp = false;
        let decoding_key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap();
        let claims = jsonwebtoken::decode::<Claims>(&assertion, &decoding_key, &validation)
            .unwrap()
            .claims;
        assert_eq!("server@pastizales.iam.gserviceaccount.com", claims.iss);
        assert_eq!(CLOUD_PLATFORM_SCOPE, claims.scope);
        assert_eq!(1_700_003_600, claims.exp);
    }

    #[tokio::test]
    async fn service_account_token_exchange() {
        let exchanges = Exchanges::default();
        let router = Router::new()
            .route("/token", post(token_endpoint))
            .with_state(exchanges.clone());
        let token_uri = spawn_router(router).join("token").unwrap();
        let source = TokenSource::refreshing(
            reqwest::Client::new(),
            TokenProvider::ServiceAccount(service_account(token_uri.as_str())),
        );

        assert_eq!(Some("token-1".to_string()), source.token().await.unwrap());
        // The second call is served from the cache.
        assert_eq!(Some("token-1".to_string()), source.token().await.unwrap());

        let exchanges = exchanges.lock().unwrap();
        assert_eq!(1, exchanges.len());
        assert_eq!(JWT_BEARER_GRANT, exchanges[0]["grant_type"]);
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[token_uri.as_str()]);
        let decoding_key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap();
        jsonwebtoken::decode::<Claims>(&exchanges[0]["assertion"], &decoding_key, &validation)
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_token_exchange() {
        let router = Router::new().route(
            "/token",
            post(|| async { (axum::http::StatusCode::BAD_REQUEST, "invalid_grant") }),
        );
        let token_uri = spawn_router(router).join("token").unwrap();
        let source = TokenSource::refreshing(
            reqwest::Client::new(),
            TokenProvider::ServiceAccount(service_account(token_uri.as_str())),
        );
        match source.token().await {
            Err(PastizalesError::AccessToken { message }) => assert!(message.contains("400")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn key_file() {
        let path = std::env::temp_dir().join("pastizales-auth-key-file.json");
        let contents = json!({
            "type": "service_account",
            "client_email": "server@pastizales.iam.gserviceaccount.com",
            "private_key": TEST_KEY,
            "private_key_id": "k1",
        });
        std::fs::write(&path, contents.to_string()).unwrap();
        let key = ServiceAccountKey::from_file(&path).unwrap();
        assert_eq!(GOOGLE_TOKEN_URL, key.token_uri);
        assert_eq!(Some("k1".to_string()), key.private_key_id);
    }

    #[test]
    fn unusable_key_file() {
        let path = std::env::temp_dir().join("pastizales-auth-bad-key.json");
        let contents = json!({"client_email": "a@b", "private_key": "not a key"});
        std::fs::write(&path, contents.to_string()).unwrap();
        match ServiceAccountKey::from_file(&path) {
            Err(PastizalesError::Credentials { path: reported, .. }) => {
                assert_eq!(path.display().to_string(), reported)
            }
            other => panic!("unexpected result {:?}", other),
        }
        match ServiceAccountKey::from_file(Path::new("/nonexistent/key.json")) {
            Err(PastizalesError::Credentials { .. }) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn from_args() {
        use clap::Parser;
        let args = CommandLineArgs::try_parse_from([
            "pastizales",
            "--firestore-project",
            "p",
            "--earth-engine-project",
            "p",
            "--access-token",
            "tok",
        ])
        .unwrap();
        match TokenSource::from_args(&args, reqwest::Client::new()).unwrap() {
            TokenSource::Static(token) => assert_eq!("tok", token),
            _ => panic!("expected a static token"),
        }
    }
}

//! Command Line Interface (CLI) arguments.

use clap::Parser;
use url::Url;

/// Pastizales server command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// The IP address on which the server should listen
    #[arg(long, default_value = "0.0.0.0", env = "PASTIZALES_HOST")]
    pub host: String,
    /// The port to which the server should bind
    #[arg(long, default_value_t = 3333, env = "PASTIZALES_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "PASTIZALES_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/pastizales/certs/cert.pem",
        env = "PASTIZALES_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/pastizales/certs/key.pem",
        env = "PASTIZALES_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for operations to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "PASTIZALES_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Whether to enable sending traces to Jaeger.
    #[arg(long, default_value_t = false, env = "PASTIZALES_ENABLE_JAEGER")]
    pub enable_jaeger: bool,

    /// Google Cloud project holding the Firestore database
    #[arg(long, env = "PASTIZALES_FIRESTORE_PROJECT")]
    pub firestore_project: String,
    /// Firestore database name
    #[arg(long, default_value = "(default)", env = "PASTIZALES_FIRESTORE_DATABASE")]
    pub firestore_database: String,
    /// Base URL of the Firestore REST API. Point this at an emulator for local development.
    #[arg(
        long,
        default_value = "https://firestore.googleapis.com",
        env = "PASTIZALES_FIRESTORE_URL"
    )]
    pub firestore_url: Url,

    /// Google Cloud project registered for Earth Engine
    #[arg(long, env = "PASTIZALES_EARTH_ENGINE_PROJECT")]
    pub earth_engine_project: String,
    /// Base URL of the Earth Engine REST API
    #[arg(
        long,
        default_value = "https://earthengine.googleapis.com",
        env = "PASTIZALES_EARTH_ENGINE_URL"
    )]
    pub earth_engine_url: Url,

    /// S3-compatible endpoint of the object store holding the images
    #[arg(
        long,
        default_value = "https://storage.googleapis.com",
        env = "PASTIZALES_STORAGE_URL"
    )]
    pub storage_url: Url,
    /// Base URL used to build public links to stored objects
    #[arg(
        long,
        default_value = "https://storage.googleapis.com",
        env = "PASTIZALES_STORAGE_PUBLIC_URL"
    )]
    pub storage_public_url: Url,
    /// Bucket holding species and community images
    #[arg(long, default_value = "gee_inia", env = "PASTIZALES_STORAGE_BUCKET")]
    pub storage_bucket: String,
    /// HMAC access key for the object store
    #[arg(long, env = "PASTIZALES_STORAGE_ACCESS_KEY")]
    pub storage_access_key: Option<String>,
    /// HMAC secret key for the object store
    #[arg(long, env = "PASTIZALES_STORAGE_SECRET_KEY", hide_env_values = true)]
    pub storage_secret_key: Option<String>,

    /// Static OAuth access token for Google APIs. When neither this nor a credentials file is
    /// set, tokens are requested from the compute metadata server.
    #[arg(long, env = "PASTIZALES_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
    /// Service account JSON key file used to obtain access tokens for Google APIs
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub credentials_file: Option<String>,
    /// Send requests to Google APIs without an authorization header (emulators only).
    #[arg(long, default_value_t = false, env = "PASTIZALES_ANONYMOUS")]
    pub anonymous: bool,

    /// Collection holding species documents
    #[arg(long, default_value = "species", env = "PASTIZALES_SPECIES_COLLECTION")]
    pub species_collection: String,
    /// Collection holding community documents
    #[arg(
        long,
        default_value = "communities",
        env = "PASTIZALES_COMMUNITIES_COLLECTION"
    )]
    pub communities_collection: String,
    /// Collection holding grassland community documents
    #[arg(
        long,
        default_value = "grassland_communities",
        env = "PASTIZALES_GRASSLAND_COMMUNITIES_COLLECTION"
    )]
    pub grassland_communities_collection: String,
    /// Sub-collection of a community holding its species
    #[arg(
        long,
        default_value = "species",
        env = "PASTIZALES_COMMUNITY_SPECIES_COLLECTION"
    )]
    pub community_species_collection: String,
    /// Sub-collection of a community holding its sub-communities
    #[arg(
        long,
        default_value = "subcommunities",
        env = "PASTIZALES_SUBCOMMUNITIES_COLLECTION"
    )]
    pub subcommunities_collection: String,
    /// Object store folder holding community images, as `{prefix}/{id}/{subcommunity}/`
    #[arg(
        long,
        default_value = "communities",
        env = "PASTIZALES_COMMUNITY_IMAGES_PREFIX"
    )]
    pub community_images_prefix: String,
    /// Object store folder holding grassland community images
    #[arg(
        long,
        default_value = "communities",
        env = "PASTIZALES_GRASSLAND_COMMUNITY_IMAGES_PREFIX"
    )]
    pub grassland_community_images_prefix: String,
    /// Collection holding user-drawn zones
    #[arg(long, default_value = "zones", env = "PASTIZALES_ZONES_COLLECTION")]
    pub zones_collection: String,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}

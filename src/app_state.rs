use crate::auth::TokenSource;
use crate::cli::CommandLineArgs;
use crate::earth_engine::client::{ComputeEngine, EarthEngineClient};
use crate::error::PastizalesError;
use crate::firestore::{DocumentStore, FirestoreClient};
use crate::object_store::{BucketClient, ObjectStore, StorageCredentials};
use crate::services::community::{CommunityCollections, CommunityService};
use crate::services::gee::GeeService;
use crate::services::species::SpeciesService;
use crate::services::zone::ZoneService;

use std::sync::Arc;

/// Shared application state passed to each request handler.
pub struct AppState {
    /// Species catalog
    pub species: SpeciesService,

    /// Community catalog
    pub communities: CommunityService,

    /// Grassland community catalog
    pub grassland_communities: CommunityService,

    /// User zones
    pub zones: ZoneService,

    /// Compute platform queries
    pub gee: GeeService,
}

impl AppState {
    /// Create and return an [AppState] talking to the configured providers.
    ///
    /// Fails if the configured credentials cannot be loaded.
    pub fn new(args: &CommandLineArgs) -> Result<Self, PastizalesError> {
        let client = reqwest::Client::new();
        let tokens = Arc::new(TokenSource::from_args(args, client.clone())?);
        let store = Arc::new(FirestoreClient::new(
            client.clone(),
            args.firestore_url.clone(),
            &args.firestore_project,
            &args.firestore_database,
            tokens.clone(),
        ));
        let objects = Arc::new(BucketClient::new(
            &args.storage_url,
            StorageCredentials::from_keys(
                args.storage_access_key.as_deref(),
                args.storage_secret_key.as_deref(),
            ),
            &args.storage_bucket,
            args.storage_public_url.clone(),
        ));
        let engine = Arc::new(EarthEngineClient::new(
            client,
            args.earth_engine_url.clone(),
            &args.earth_engine_project,
            tokens,
        ));
        Ok(Self::with_providers(args, store, objects, engine))
    }

    /// Create and return an [AppState] over the given providers.
    pub fn with_providers(
        args: &CommandLineArgs,
        store: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        engine: Arc<dyn ComputeEngine>,
    ) -> Self {
        let collections = |communities: &str, image_prefix: &str| CommunityCollections {
            communities: communities.to_string(),
            species: args.community_species_collection.clone(),
            subcommunities: args.subcommunities_collection.clone(),
            image_prefix: image_prefix.to_string(),
        };
        let communities = CommunityService::new(
            store.clone(),
            objects.clone(),
            collections(
                &args.communities_collection,
                &args.community_images_prefix,
            ),
        );
        let grassland_communities = CommunityService::new(
            store.clone(),
            objects.clone(),
            collections(
                &args.grassland_communities_collection,
                &args.grassland_community_images_prefix,
            ),
        );
        Self {
            species: SpeciesService::new(store.clone(), objects, &args.species_collection),
            gee: GeeService::new(engine, communities.clone()),
            communities,
            grassland_communities,
            zones: ZoneService::new(store, &args.zones_collection),
        }
    }
}

/// AppState wrapped in an Atomic Reference Count (Arc) to allow multiple references.
pub type SharedAppState = Arc<AppState>;

//! Vegetation communities
//!
//! The same service backs both the community and the grassland community catalogs; they differ
//! only in collection names.

use crate::error::PastizalesError;
use crate::firestore::{CollectionPath, Document, DocumentStore};
use crate::models::{
    Community, CommunityRecord, SpeciesRef, SpeciesRefRecord, SubCommunity, SubCommunityRecord,
};
use crate::object_store::ObjectStore;

use std::sync::Arc;

use serde_json::Value;

/// Collection names of one community catalog
#[derive(Clone, Debug)]
pub struct CommunityCollections {
    pub communities: String,
    pub species: String,
    pub subcommunities: String,
    /// Object store folder holding sub-community images
    pub image_prefix: String,
}

/// Community lookups and image listings
#[derive(Clone)]
pub struct CommunityService {
    store: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
    collection: CollectionPath,
    species: String,
    subcommunities: String,
    image_prefix: String,
}

fn decode_community(document: Document) -> Result<Community, PastizalesError> {
    let (id, record) = document.decode::<CommunityRecord>()?;
    Ok(Community::from_record(id, record))
}

impl CommunityService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        collections: CommunityCollections,
    ) -> Self {
        CommunityService {
            store,
            objects,
            collection: CollectionPath::root(&collections.communities),
            species: collections.species,
            subcommunities: collections.subcommunities,
            image_prefix: collections.image_prefix,
        }
    }

    /// All communities, ordered by `order`.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn list(&self) -> Result<Vec<Community>, PastizalesError> {
        self.store
            .list(&self.collection, Some("order"))
            .await?
            .into_iter()
            .map(decode_community)
            .collect()
    }

    /// One community by id.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn get(&self, id: &str) -> Result<Community, PastizalesError> {
        let document = self.store.get(&self.collection, id).await?.ok_or_else(|| {
            PastizalesError::DocumentNotFound {
                collection: self.collection.to_string(),
                id: id.to_string(),
            }
        })?;
        decode_community(document)
    }

    /// The first community with the given order.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn get_by_order(&self, order: &str) -> Result<Community, PastizalesError> {
        let documents = self
            .store
            .find(&self.collection, "order", Value::from(order), None)
            .await?;
        let document = documents.into_iter().next().ok_or_else(|| {
            PastizalesError::CommunityOrderNotFound {
                order: order.to_string(),
            }
        })?;
        decode_community(document)
    }

    /// Species of a community, ordered by name.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn species(&self, id: &str) -> Result<Vec<SpeciesRef>, PastizalesError> {
        let collection = self.collection.child(id, &self.species);
        self.store
            .list(&collection, Some("name"))
            .await?
            .into_iter()
            .map(|document| {
                let (id, record) = document.decode::<SpeciesRefRecord>()?;
                Ok(SpeciesRef::from_record(id, record))
            })
            .collect()
    }

    /// Sub-communities of a community, ordered by `order`.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn subcommunities(&self, id: &str) -> Result<Vec<SubCommunity>, PastizalesError> {
        let collection = self.collection.child(id, &self.subcommunities);
        self.store
            .list(&collection, Some("order"))
            .await?
            .into_iter()
            .map(|document| {
                let (id, record) = document.decode::<SubCommunityRecord>()?;
                Ok(SubCommunity::from_record(id, record))
            })
            .collect()
    }

    /// Public URLs of the images of a sub-community.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn subcommunity_images(
        &self,
        id: &str,
        subcommunity_id: &str,
    ) -> Result<Vec<String>, PastizalesError> {
        self.objects
            .list_public_urls(&format!(
                "{}/{}/{}/",
                self.image_prefix, id, subcommunity_id
            ))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{document, FailingDocumentStore, MemoryDocumentStore, MemoryObjectStore};
    use serde_json::json;

    fn collections() -> CommunityCollections {
        CommunityCollections {
            communities: "communities".to_string(),
            species: "species".to_string(),
            subcommunities: "subcommunities".to_string(),
            image_prefix: "communities".to_string(),
        }
    }

    fn service() -> CommunityService {
        let root = CollectionPath::root("communities");
        let store = MemoryDocumentStore::default()
            .with(
                &root,
                vec![
                    document("c2", json!({"name": "Two", "order": "II"})),
                    document("c1", json!({"name": "One", "order": "I", "link": "l"})),
                    document("c3", json!({"name": "Unordered"})),
                ],
            )
            .with(
                &root.child("c1", "species"),
                vec![
                    document("sp2", json!({"name": "Zeta"})),
                    document("sp1", json!({"name": "Alfa"})),
                ],
            )
            .with(
                &root.child("c1", "subcommunities"),
                vec![
                    document("b", json!({"order": "2", "predominant_species": [{"id": "sp1", "name": "Alfa"}]})),
                    document("a", json!({"order": "1"})),
                ],
            );
        let objects = MemoryObjectStore::new(&[
            "communities/c1/a/",
            "communities/c1/a/1.png",
            "communities/c1/b/2.png",
        ]);
        CommunityService::new(Arc::new(store), Arc::new(objects), collections())
    }

    #[tokio::test]
    async fn list_ordered() {
        let communities = service().list().await.unwrap();
        let ids: Vec<&str> = communities.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(vec!["c1", "c2"], ids);
        assert_eq!(Some("l".to_string()), communities[0].link);
        assert_eq!(None, communities[0].description);
    }

    #[tokio::test]
    async fn get_missing() {
        match service().get("c9").await {
            Err(PastizalesError::DocumentNotFound { collection, id }) => {
                assert_eq!("communities", collection);
                assert_eq!("c9", id);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn by_order() {
        let community = service().get_by_order("II").await.unwrap();
        assert_eq!("c2", community.id);
        match service().get_by_order("IX").await {
            Err(PastizalesError::CommunityOrderNotFound { order }) => assert_eq!("IX", order),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn species_by_name() {
        let species = service().species("c1").await.unwrap();
        let names: Vec<Option<String>> = species.into_iter().map(|s| s.name).collect();
        assert_eq!(
            vec![Some("Alfa".to_string()), Some("Zeta".to_string())],
            names
        );
    }

    #[tokio::test]
    async fn subcommunities_by_order() {
        let subcommunities = service().subcommunities("c1").await.unwrap();
        assert_eq!("a", subcommunities[0].id);
        assert_eq!("b", subcommunities[1].id);
        assert_eq!("sp1", subcommunities[1].predominant_species[0].id);
        assert!(subcommunities[0].indicator_species.is_empty());
    }

    #[tokio::test]
    async fn subcommunity_images() {
        let images = service().subcommunity_images("c1", "a").await.unwrap();
        assert_eq!(
            vec!["https://storage.example.com/bucket/communities/c1/a/1.png"],
            images
        );
    }

    #[tokio::test]
    async fn subcommunity_images_under_configured_prefix() {
        let objects = MemoryObjectStore::new(&["grasslands/g1/s1/1.png", "communities/g1/s1/2.png"]);
        let collections = CommunityCollections {
            image_prefix: "grasslands".to_string(),
            ..collections()
        };
        let service = CommunityService::new(
            Arc::new(MemoryDocumentStore::default()),
            Arc::new(objects),
            collections,
        );
        let images = service.subcommunity_images("g1", "s1").await.unwrap();
        assert_eq!(
            vec!["https://storage.example.com/bucket/grasslands/g1/s1/1.png"],
            images
        );
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let service = CommunityService::new(
            Arc::new(FailingDocumentStore),
            Arc::new(MemoryObjectStore::new(&[])),
            collections(),
        );
        match service.list().await {
            Err(PastizalesError::Upstream { status, .. }) => assert_eq!(503, status),
            other => panic!("unexpected result {:?}", other),
        }
    }
}

//! Species catalog

use crate::error::PastizalesError;
use crate::firestore::{CollectionPath, DocumentStore};
use crate::models::{Species, SpeciesRecord};
use crate::object_store::ObjectStore;

use std::sync::Arc;

/// Species lookups and image listings
#[derive(Clone)]
pub struct SpeciesService {
    store: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
    collection: CollectionPath,
}

impl SpeciesService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        collection: &str,
    ) -> Self {
        SpeciesService {
            store,
            objects,
            collection: CollectionPath::root(collection),
        }
    }

    /// All species.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn list(&self) -> Result<Vec<Species>, PastizalesError> {
        let documents = self.store.list(&self.collection, None).await?;
        documents
            .into_iter()
            .map(|document| {
                let (id, record) = document.decode::<SpeciesRecord>()?;
                Ok(Species::from_record(id, record))
            })
            .collect()
    }

    /// One species by id.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn get(&self, id: &str) -> Result<Species, PastizalesError> {
        let document = self.store.get(&self.collection, id).await?.ok_or_else(|| {
            PastizalesError::DocumentNotFound {
                collection: self.collection.to_string(),
                id: id.to_string(),
            }
        })?;
        let (id, record) = document.decode::<SpeciesRecord>()?;
        Ok(Species::from_record(id, record))
    }

    /// Public URLs of the images of a species.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn images(&self, id: &str) -> Result<Vec<String>, PastizalesError> {
        self.objects
            .list_public_urls(&format!("species/{}/", id))
            .await
    }
}

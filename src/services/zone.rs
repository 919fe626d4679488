//! User zones

use crate::error::PastizalesError;
use crate::firestore::{CollectionPath, DocumentStore};
use crate::models::{Zone, ZoneRecord};

use std::sync::Arc;

use serde_json::Value;

/// Field of zone documents holding the owner
const OWNER_FIELD: &str = "user_id";

#[derive(Clone)]
pub struct ZoneService {
    store: Arc<dyn DocumentStore>,
    collection: CollectionPath,
}

impl ZoneService {
    pub fn new(store: Arc<dyn DocumentStore>, collection: &str) -> Self {
        ZoneService {
            store,
            collection: CollectionPath::root(collection),
        }
    }

    /// Zones of one user, ordered by `order`.
    ///
    /// Documents that do not decode as zones are logged and skipped.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<Zone>, PastizalesError> {
        let zones = self
            .store
            .find(
                &self.collection,
                OWNER_FIELD,
                Value::from(user_id),
                Some("order"),
            )
            .await?
            .into_iter()
            .filter_map(|document| match document.decode::<ZoneRecord>() {
                Ok((id, record)) => Some(Zone::from_record(id, record)),
                Err(error) => {
                    tracing::warn!("skipping zone: {}", error);
                    None
                }
            })
            .collect::<Vec<_>>();
        Ok(zones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ZoneKind;
    use crate::test_utils::{document, MemoryDocumentStore};
    use serde_json::json;

    #[tokio::test]
    async fn zones_of_user() {
        let store = MemoryDocumentStore::default().with(
            &CollectionPath::root("zones"),
            vec![
                document("z2", json!({"user_id": "u1", "order": 2, "type": "marker", "visible": true,
                    "coordinates": [{"lat": -34.0, "lng": -56.0}]})),
                document("z1", json!({"user_id": "u1", "order": 1, "type": "polygon", "visible": false})),
                document("z3", json!({"user_id": "u2", "order": 0, "type": "marker"})),
            ],
        );
        let store = Arc::new(store);
        let service = ZoneService::new(store.clone(), "zones");
        let zones = service.list_by_user("u1").await.unwrap();
        let ids: Vec<&str> = zones.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(vec!["z1", "z2"], ids);
        assert_eq!(ZoneKind::Marker, zones[1].kind);
        assert_eq!(Some("2".to_string()), zones[1].order);
        let queries = store.queries.lock().unwrap();
        assert_eq!(Some("order".to_string()), queries[0].1.order_by);
    }

    #[tokio::test]
    async fn unknown_zone_type_is_skipped() {
        let store = MemoryDocumentStore::default().with(
            &CollectionPath::root("zones"),
            vec![
                document("z1", json!({"user_id": "u1", "order": 1, "type": "circle"})),
                document("z2", json!({"user_id": "u1", "order": 2, "type": "rectangle"})),
            ],
        );
        let service = ZoneService::new(Arc::new(store), "zones");
        let zones = service.list_by_user("u1").await.unwrap();
        let ids: Vec<&str> = zones.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(vec!["z2"], ids);
    }
}

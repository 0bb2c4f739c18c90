//! Attraction catalogue served under the API prefix.

use crate::api::{ApiError, ApiHandler, ApiRequest, ApiRoutes, HandlerResult};
use crate::fault::RequestContext;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attraction {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub location: Location,
    /// Contact address of whoever submitted the entry
    pub updated_by: Option<String>,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

impl Attraction {
    fn summary(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "location": self.location,
        })
    }

    fn detail(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "description": self.description,
            "location": self.location,
        })
    }
}

/// Body accepted by `POST /attraction`
#[derive(Debug, Deserialize)]
struct NewAttraction {
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    location: Location,
    email: Option<String>,
}

/// In-memory attraction catalogue
#[derive(Debug, Default)]
pub struct AttractionStore {
    attractions: RwLock<HashMap<Uuid, Attraction>>,
}

impl AttractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the approved starter catalogue
    pub fn seeded() -> Self {
        let store = Self::new();
        let seeds = [
            (
                "Multnomah Falls",
                "Tallest waterfall in Oregon, an easy drive from the city.",
                Location {
                    lat: 45.5762,
                    lng: -122.1158,
                },
            ),
            (
                "Powell's City of Books",
                "A full city block of new and used books.",
                Location {
                    lat: 45.5231,
                    lng: -122.6814,
                },
            ),
            (
                "Portland Japanese Garden",
                "Five garden styles on a hillside in Washington Park.",
                Location {
                    lat: 45.5188,
                    lng: -122.7080,
                },
            ),
        ];

        for (name, description, location) in seeds {
            let id = store.insert(name, description, location, None);
            store.approve(id);
        }

        info!("Attraction catalogue seeded with {} entries", store.len());
        store
    }

    /// Approved attractions ordered by name
    pub fn approved(&self) -> Vec<Attraction> {
        let mut approved: Vec<_> = self
            .attractions
            .read()
            .values()
            .filter(|a| a.approved)
            .cloned()
            .collect();
        approved.sort_by(|a, b| a.name.cmp(&b.name));
        approved
    }

    pub fn get(&self, id: Uuid) -> Option<Attraction> {
        self.attractions.read().get(&id).cloned()
    }

    /// Add an unapproved attraction, returning its id
    pub fn insert<S: Into<String>>(
        &self,
        name: S,
        description: S,
        location: Location,
        updated_by: Option<String>,
    ) -> Uuid {
        let attraction = Attraction {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            location,
            updated_by,
            approved: false,
            created_at: Utc::now(),
        };
        let id = attraction.id;
        self.attractions.write().insert(id, attraction);
        id
    }

    /// Returns false if no such attraction exists
    pub fn approve(&self, id: Uuid) -> bool {
        match self.attractions.write().get_mut(&id) {
            Some(attraction) => {
                attraction.approved = true;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.attractions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.attractions.read().is_empty()
    }
}

pub struct ListAttractions {
    store: Arc<AttractionStore>,
}

#[async_trait]
impl ApiHandler for ListAttractions {
    async fn call(&self, _request: ApiRequest, _ctx: RequestContext) -> HandlerResult {
        tokio::task::yield_now().await;
        let attractions = self
            .store
            .approved()
            .iter()
            .map(Attraction::summary)
            .collect();
        Ok(Value::Array(attractions))
    }
}

pub struct GetAttraction {
    store: Arc<AttractionStore>,
}

#[async_trait]
impl ApiHandler for GetAttraction {
    async fn call(&self, request: ApiRequest, _ctx: RequestContext) -> HandlerResult {
        tokio::task::yield_now().await;
        request
            .param("id")
            .and_then(|id| Uuid::parse_str(id).ok())
            .and_then(|id| self.store.get(id))
            .map(|attraction| attraction.detail())
            .ok_or_else(|| ApiError::not_found("No such attraction."))
    }
}

pub struct CreateAttraction {
    store: Arc<AttractionStore>,
}

#[async_trait]
impl ApiHandler for CreateAttraction {
    async fn call(&self, request: ApiRequest, ctx: RequestContext) -> HandlerResult {
        let submitted: NewAttraction = serde_json::from_value(request.body)
            .map_err(|e| ApiError::bad_request(format!("Invalid attraction: {}", e)))?;

        let name = match submitted.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(ApiError::bad_request("Attraction name is required.")),
        };

        tokio::task::yield_now().await;
        let id = self.store.insert(
            name,
            submitted.description,
            submitted.location,
            submitted.email,
        );
        debug!(
            request_id = %ctx.request_id(),
            attraction_id = %id,
            "Attraction submitted for approval"
        );

        Ok(json!({ "id": id }))
    }
}

/// Attraction endpoints backed by `store`
pub fn routes(store: Arc<AttractionStore>) -> ApiRoutes {
    ApiRoutes::new()
        .get(
            "/attractions",
            ListAttractions {
                store: Arc::clone(&store),
            },
        )
        .get(
            "/attraction/:id",
            GetAttraction {
                store: Arc::clone(&store),
            },
        )
        .post("/attraction", CreateAttraction { store })
}

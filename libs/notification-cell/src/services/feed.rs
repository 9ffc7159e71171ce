use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use appointment_cell::models::Appointment;
use appointment_cell::services::AppointmentLifecycleService;

use crate::{NotificationError, Viewer};

/// Source of the appointments a viewer can see.
#[async_trait]
pub trait AppointmentFeed: Send + Sync {
    async fn fetch(&self, viewer: &Viewer) -> Result<Vec<Appointment>, NotificationError>;
}

/// Reads straight from the lifecycle service in the same process.
pub struct LifecycleFeed {
    service: Arc<AppointmentLifecycleService>,
}

impl LifecycleFeed {
    pub fn new(service: Arc<AppointmentLifecycleService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl AppointmentFeed for LifecycleFeed {
    async fn fetch(&self, viewer: &Viewer) -> Result<Vec<Appointment>, NotificationError> {
        self.service
            .list_appointments(&viewer.filter())
            .await
            .map_err(|e| NotificationError::Fetch(e.to_string()))
    }
}

/// Polls a remote API's `GET /appointments`, the way a dashboard does.
pub struct HttpAppointmentFeed {
    client: Client,
    base_url: String,
    bearer: Option<String>,
}

impl HttpAppointmentFeed {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

#[async_trait]
impl AppointmentFeed for HttpAppointmentFeed {
    async fn fetch(&self, viewer: &Viewer) -> Result<Vec<Appointment>, NotificationError> {
        let url = format!("{}/appointments", self.base_url);
        debug!("Fetching appointments for {} from {}", viewer, url);

        let mut request = self.client.get(&url).query(&viewer.filter());
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Fetch(format!("{}: {}", status, body)));
        }

        response
            .json::<Vec<Appointment>>()
            .await
            .map_err(|e| NotificationError::Fetch(e.to_string()))
    }
}

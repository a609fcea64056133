use serde_json::json;
use std::cmp::Ordering;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_http::{ApiClient, Method};
use shared_utils::RetryPolicy;

use crate::models::{DoctorError, NewSlot, Slot, SlotCreatedResponse, SlotListResponse, SlotTime};
use crate::services::doctor::not_found_as;

/// Slot scheduling: patients browse open slots, doctors publish new ones.
pub struct SlotService {
    client: ApiClient,
    retry: RetryPolicy,
}

impl SlotService {
    pub fn new(config: &AppConfig) -> Result<Self, DoctorError> {
        Ok(Self {
            client: ApiClient::new(config)?,
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Unbooked slots of a doctor, earliest first.
    pub async fn available_slots(&self, doctor_id: i64) -> Result<Vec<Slot>, DoctorError> {
        let path = format!("/doctor/{}/slots", doctor_id);

        let response: SlotListResponse = self
            .retry
            .run("list slots", || self.client.request(Method::GET, &path, None, None))
            .await
            .map_err(|e| not_found_as(e, doctor_id))?;

        let mut slots: Vec<Slot> = response.slots.into_iter().filter(|s| !s.is_booked).collect();
        sort_slots(&mut slots);

        debug!("Doctor {} has {} open slots", doctor_id, slots.len());
        Ok(slots)
    }

    pub async fn add_slot(
        &self,
        doctor_id: i64,
        slot: NewSlot,
        auth_token: &str,
    ) -> Result<Slot, DoctorError> {
        slot.validate()?;

        let path = format!("/doctor/{}/slots", doctor_id);
        let response: SlotCreatedResponse = self
            .client
            .request(
                Method::POST,
                &path,
                Some(auth_token),
                Some(json!({ "start": slot.start.trim(), "end": slot.end.trim() })),
            )
            .await
            .map_err(|e| not_found_as(e, doctor_id))?;

        info!("Doctor {} published slot {}", doctor_id, response.slot.id);
        Ok(response.slot)
    }
}

/// Parsed times sort chronologically; anything unparsable sorts last by text.
pub fn sort_slots(slots: &mut [Slot]) {
    slots.sort_by(|a, b| {
        match (SlotTime::parse(&a.start), SlotTime::parse(&b.start)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or_else(|| a.start.cmp(&b.start)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.start.cmp(&b.start),
        }
    });
}

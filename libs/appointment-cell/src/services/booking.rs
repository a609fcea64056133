// libs/appointment-cell/src/services/booking.rs
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_http::{ApiClient, Method};
use shared_models::{ApiError, Role, SessionContext};
use shared_utils::RetryPolicy;

use crate::models::{
    Appointment, AppointmentAction, AppointmentCreatedResponse, AppointmentEnvelope,
    AppointmentError, AppointmentListResponse, AppointmentRequest, AppointmentStatus,
    StatusResponse,
};
use crate::services::lifecycle::AppointmentLifecycleService;

const DEFAULT_REASON: &str = "Consultation";

/// Appointment request/accept/reject workflow.
///
/// Only calls that can be repeated without side effects go through the
/// retry policy; creating an appointment or booking a slot never does.
pub struct BookingService {
    client: ApiClient,
    retry: RetryPolicy,
    lifecycle: AppointmentLifecycleService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Result<Self, AppointmentError> {
        Ok(Self {
            client: ApiClient::new(config)?,
            retry: RetryPolicy::from_config(config),
            lifecycle: AppointmentLifecycleService::new(),
        })
    }

    /// Ask a doctor for a consultation. The new appointment becomes the
    /// session's active appointment.
    pub async fn request_appointment(
        &self,
        ctx: &mut SessionContext,
        request: AppointmentRequest,
    ) -> Result<i64, AppointmentError> {
        require_role(ctx, Role::Patient, "request appointments")?;

        let disease = reason_for(ctx, request.disease.as_deref());
        info!(
            "Patient {} requesting appointment with doctor {} for {}",
            ctx.user().id,
            request.doctor_id,
            disease
        );

        let mut body = json!({
            "doctor_id": request.doctor_id,
            "patient_id": ctx.user().id,
            "disease": disease,
        });
        if let Some(slot_id) = request.slot_id {
            body["slot_id"] = json!(slot_id);
        }

        let response: AppointmentCreatedResponse = self
            .client
            .request(Method::POST, "/appointment/request", Some(ctx.token()), Some(body))
            .await?;

        let appointment_id = response.appointment_id.ok_or_else(|| {
            AppointmentError::Api(ApiError::Decode("response carried no appointment_id".to_string()))
        })?;

        ctx.set_active_appointment(appointment_id);
        info!("Appointment {} requested", appointment_id);
        Ok(appointment_id)
    }

    /// Book a specific open slot. Fails with `SlotUnavailable` when someone
    /// else took it first.
    pub async fn book_slot(
        &self,
        ctx: &mut SessionContext,
        doctor_id: i64,
        slot_id: i64,
        disease: Option<&str>,
    ) -> Result<Option<i64>, AppointmentError> {
        require_role(ctx, Role::Patient, "book slots")?;

        let body = json!({
            "doctor_id": doctor_id,
            "patient_id": ctx.user().id,
            "slot_id": slot_id,
            "disease": reason_for(ctx, disease),
        });

        let response: AppointmentCreatedResponse = self
            .client
            .request(Method::POST, "/appointment/book", Some(ctx.token()), Some(body))
            .await
            .map_err(|e| match e {
                ApiError::BadRequest(msg) if msg.to_lowercase().contains("unavailable") => {
                    AppointmentError::SlotUnavailable(slot_id)
                }
                other => AppointmentError::Api(other),
            })?;

        if let Some(id) = response.appointment_id {
            ctx.set_active_appointment(id);
        }
        info!("Slot {} booked with doctor {}", slot_id, doctor_id);
        Ok(response.appointment_id)
    }

    /// Tell the doctor the patient's documents are attached to an appointment.
    pub async fn share_documents(
        &self,
        ctx: &SessionContext,
        doctor_id: i64,
        appointment_id: i64,
    ) -> Result<(), AppointmentError> {
        if ctx.uploaded_document().is_none() {
            warn!("Sharing documents for appointment {} with nothing uploaded", appointment_id);
        }

        let body = json!({
            "doctor_id": doctor_id,
            "appointment_id": appointment_id,
        });

        let _: StatusResponse = self
            .retry
            .run("share documents", || {
                self.client.request(
                    Method::POST,
                    "/appointment/send_documents",
                    Some(ctx.token()),
                    Some(body.clone()),
                )
            })
            .await?;

        debug!("Documents shared for appointment {}", appointment_id);
        Ok(())
    }

    /// Doctor accepts or rejects a requested appointment.
    pub async fn respond(
        &self,
        ctx: &SessionContext,
        appointment: &Appointment,
        action: AppointmentAction,
    ) -> Result<AppointmentStatus, AppointmentError> {
        let (segment, next) = match (action.response_segment(), action.resulting_status()) {
            (Some(segment), Some(next)) => (segment, next),
            _ => {
                return Err(AppointmentError::Validation(format!(
                    "{} is not a response to an appointment request",
                    action
                )))
            }
        };

        self.lifecycle.ensure_allowed(appointment, action, ctx.role())?;

        let path = format!("/appointments/{}/{}", appointment.id, segment);
        self.retry
            .run("respond to appointment", || {
                self.client
                    .request::<StatusResponse>(Method::POST, &path, Some(ctx.token()), None)
            })
            .await
            .map_err(|e| not_found_as(e, appointment.id))?;

        info!("Appointment {} is now {}", appointment.id, next);
        Ok(next)
    }

    pub async fn patient_appointments(
        &self,
        ctx: &SessionContext,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("/patient/{}/appointments", ctx.user().id);
        self.list(&path, ctx.token()).await
    }

    pub async fn doctor_appointments(
        &self,
        ctx: &SessionContext,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let doctor_id = ctx.doctor_id().ok_or_else(|| {
            AppointmentError::Forbidden("only doctors have an appointment queue".to_string())
        })?;
        let path = format!("/doctor/{}/appointments", doctor_id);
        self.list(&path, ctx.token()).await
    }

    pub async fn get_appointment(
        &self,
        ctx: &SessionContext,
        appointment_id: i64,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/api/appointments/{}", appointment_id);
        let envelope: AppointmentEnvelope = self
            .retry
            .run("get appointment", || {
                self.client.request(Method::GET, &path, Some(ctx.token()), None)
            })
            .await
            .map_err(|e| not_found_as(e, appointment_id))?;

        Ok(envelope.into_appointment())
    }

    async fn list(&self, path: &str, token: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let response: AppointmentListResponse = self
            .retry
            .run("list appointments", || {
                self.client.request(Method::GET, path, Some(token), None)
            })
            .await?;

        debug!("{} returned {} appointments", path, response.appointments.len());
        Ok(response.appointments)
    }
}

pub(crate) fn require_role(
    ctx: &SessionContext,
    role: Role,
    what: &str,
) -> Result<(), AppointmentError> {
    if ctx.role() != role {
        return Err(AppointmentError::Forbidden(format!("only a {} may {}", role, what)));
    }
    Ok(())
}

pub(crate) fn not_found_as(err: ApiError, appointment_id: i64) -> AppointmentError {
    match err {
        ApiError::NotFound(_) => AppointmentError::NotFound(appointment_id),
        other => AppointmentError::Api(other),
    }
}

fn reason_for(ctx: &SessionContext, explicit: Option<&str>) -> String {
    explicit
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .or_else(|| ctx.last_prediction())
        .unwrap_or(DEFAULT_REASON)
        .to_string()
}

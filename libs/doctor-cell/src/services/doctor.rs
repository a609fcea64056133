use tracing::{debug, info};

use shared_config::AppConfig;
use shared_http::{ApiClient, Method};
use shared_models::ApiError;
use shared_utils::RetryPolicy;

use crate::models::{
    Doctor, DoctorDashboard, DoctorEnvelope, DoctorError, DoctorListResponse, DoctorSearchFilters,
};

/// Doctor discovery for patients and the doctor's own dashboard.
pub struct DoctorDirectoryService {
    client: ApiClient,
    retry: RetryPolicy,
}

impl DoctorDirectoryService {
    pub fn new(config: &AppConfig) -> Result<Self, DoctorError> {
        Ok(Self {
            client: ApiClient::new(config)?,
            retry: RetryPolicy::from_config(config),
        })
    }

    pub async fn search(&self, filters: &DoctorSearchFilters) -> Result<Vec<Doctor>, DoctorError> {
        let query = filters.to_query();
        debug!("Searching doctors with {:?}", query);

        let response: DoctorListResponse = self
            .retry
            .run("search doctors", || {
                self.client.get_with_query("/doctors", &query, None)
            })
            .await?;

        info!("Doctor search returned {} results", response.doctors.len());
        Ok(response.doctors)
    }

    pub async fn get_doctor(&self, doctor_id: i64) -> Result<Doctor, DoctorError> {
        let path = format!("/doctors/{}", doctor_id);

        let envelope: DoctorEnvelope = self
            .retry
            .run("get doctor", || self.client.request(Method::GET, &path, None, None))
            .await
            .map_err(|e| not_found_as(e, doctor_id))?;

        Ok(envelope.into_doctor())
    }

    /// Profile plus every slot of the doctor, including booked ones.
    pub async fn get_dashboard(
        &self,
        doctor_id: i64,
        auth_token: &str,
    ) -> Result<DoctorDashboard, DoctorError> {
        let path = format!("/doctor/{}", doctor_id);

        self.retry
            .run("get doctor dashboard", || {
                self.client.request(Method::GET, &path, Some(auth_token), None)
            })
            .await
            .map_err(|e| not_found_as(e, doctor_id))
    }

    /// Resolve the doctor ids a triage run recommended, skipping any the
    /// directory no longer knows.
    pub async fn recommended(&self, doctor_ids: &[i64]) -> Result<Vec<Doctor>, DoctorError> {
        let mut doctors = Vec::with_capacity(doctor_ids.len());
        for id in doctor_ids {
            match self.get_doctor(*id).await {
                Ok(doctor) => doctors.push(doctor),
                Err(DoctorError::NotFound(missing)) => {
                    debug!("Recommended doctor {} no longer listed", missing);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(doctors)
    }
}

pub(crate) fn not_found_as(err: ApiError, doctor_id: i64) -> DoctorError {
    match err {
        ApiError::NotFound(_) => DoctorError::NotFound(doctor_id),
        other => DoctorError::Api(other),
    }
}

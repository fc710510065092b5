//! SOS Orchestrator: two-phase emergency notification.
//!
//! Phase 1 runs inside the request: the emergency message goes to the
//! primary and (when present) secondary contact, and the caller gets both
//! results. Phase 2 is a spawned task: after a fixed delay it looks up
//! nearby hospitals and, if any are found, sends the top three to the same
//! contacts. Phase 2 only logs its failures.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::db::repository::get_profile;
use crate::db::{Database, DatabaseError};
use crate::geo::Coordinates;
use crate::hospitals::{Hospital, HospitalLocator};
use crate::models::enums::BloodType;
use crate::models::Profile;
use crate::notify::{NotificationGateway, NotificationResult};

/// Hospitals included in the follow-up message.
pub const HOSPITALS_IN_MESSAGE: usize = 3;

const NOT_SPECIFIED: &str = "None specified";

#[derive(Debug, thiserror::Error)]
pub enum SosError {
    #[error("Location coordinates are required")]
    InvalidCoordinates,

    #[error("User profile not found. Please create a profile first.")]
    ProfileNotFound,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Phase-1 outcome returned to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImmediateResult {
    pub primary_emergency: NotificationResult,
    pub secondary_emergency: NotificationResult,
}

/// What phase 2 did. Both sends are `None` when no hospital list was sent.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpReport {
    pub hospitals: Vec<Hospital>,
    pub primary_hospitals: Option<NotificationResult>,
    pub secondary_hospitals: Option<NotificationResult>,
    pub error: Option<String>,
}

impl FollowUpReport {
    pub fn messages_sent(&self) -> usize {
        [self.primary_hospitals.as_ref(), self.secondary_hospitals.as_ref()]
            .into_iter()
            .flatten()
            .filter(|r| r.success && !r.skipped)
            .count()
    }
}

pub struct SosOutcome {
    pub immediate: ImmediateResult,
    /// Phase 2. The HTTP layer drops it (detaching the task); tests await it.
    pub follow_up: JoinHandle<FollowUpReport>,
}

fn or_placeholder<'a>(value: Option<&'a str>, placeholder: &'a str) -> &'a str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(placeholder)
}

pub fn emergency_message(profile: &Profile, at: Coordinates) -> String {
    let blood_type = match profile.blood_type {
        BloodType::Unspecified => "Unknown",
        other => other.as_str(),
    };
    format!(
        "URGENT: Emergency assistance needed for {}.\n\
         Location: {}\n\
         Medical Conditions: {}\n\
         Medications: {}\n\
         Blood Type: {}\n\
         Allergies: {}",
        profile.name,
        at.map_link(),
        or_placeholder(profile.medical_conditions.as_deref(), NOT_SPECIFIED),
        or_placeholder(profile.medications.as_deref(), NOT_SPECIFIED),
        blood_type,
        or_placeholder(profile.allergies.as_deref(), NOT_SPECIFIED),
    )
}

/// Top three entries, ranked, one blank line apart.
pub fn hospitals_message(hospitals: &[Hospital]) -> String {
    hospitals
        .iter()
        .take(HOSPITALS_IN_MESSAGE)
        .enumerate()
        .map(|(i, h)| format!("{}. {} ({:.1}km): {}", i + 1, h.name, h.distance_km, h.map_link()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct SosOrchestrator {
    db: Database,
    gateway: Arc<NotificationGateway>,
    locator: Arc<HospitalLocator>,
    hospital_delay: Duration,
    radius_m: u32,
}

impl SosOrchestrator {
    pub fn new(
        db: Database,
        gateway: Arc<NotificationGateway>,
        locator: Arc<HospitalLocator>,
        hospital_delay: Duration,
        radius_m: u32,
    ) -> Self {
        Self {
            db,
            gateway,
            locator,
            hospital_delay,
            radius_m,
        }
    }

    /// Run phase 1 and spawn phase 2.
    pub async fn trigger(&self, at: Coordinates) -> Result<SosOutcome, SosError> {
        if !at.is_valid() {
            return Err(SosError::InvalidCoordinates);
        }
        let profile = self
            .db
            .with_conn(get_profile)?
            .ok_or(SosError::ProfileNotFound)?;

        tracing::info!(latitude = at.latitude, longitude = at.longitude, "SOS phase 1: sending emergency messages");
        let message = emergency_message(&profile, at);

        let primary_emergency = self.gateway.send(&profile.primary_phone, &message).await;
        let secondary = profile.secondary_contact().map(str::to_string);
        let secondary_emergency = match &secondary {
            Some(phone) => self.gateway.send(phone, &message).await,
            None => NotificationResult::skipped(),
        };

        let follow_up = tokio::spawn(run_follow_up(
            Arc::clone(&self.gateway),
            Arc::clone(&self.locator),
            at,
            self.radius_m,
            self.hospital_delay,
            profile.primary_phone.clone(),
            secondary,
        ));

        Ok(SosOutcome {
            immediate: ImmediateResult {
                primary_emergency,
                secondary_emergency,
            },
            follow_up,
        })
    }
}

async fn run_follow_up(
    gateway: Arc<NotificationGateway>,
    locator: Arc<HospitalLocator>,
    at: Coordinates,
    radius_m: u32,
    delay: Duration,
    primary: String,
    secondary: Option<String>,
) -> FollowUpReport {
    tokio::time::sleep(delay).await;

    let hospitals = match locator.find_nearby(at, radius_m).await {
        Ok(hospitals) if !hospitals.is_empty() => hospitals,
        Ok(_) => {
            tracing::info!("SOS phase 2 skipped: no hospitals found");
            return FollowUpReport::default();
        }
        Err(e) => {
            tracing::warn!(error = %e, "SOS phase 2 skipped: hospital lookup failed");
            return FollowUpReport {
                error: Some(e.to_string()),
                ..Default::default()
            };
        }
    };

    tracing::info!(count = hospitals.len(), "SOS phase 2: sending hospital information");
    let message = hospitals_message(&hospitals);

    let primary_hospitals = gateway.send(&primary, &message).await;
    if !primary_hospitals.success {
        tracing::error!(error = ?primary_hospitals.error, "Hospital info to primary contact failed");
    }
    let secondary_hospitals = match &secondary {
        Some(phone) => {
            let result = gateway.send(phone, &message).await;
            if !result.success {
                tracing::error!(error = ?result.error, "Hospital info to secondary contact failed");
            }
            result
        }
        None => NotificationResult::skipped(),
    };

    FollowUpReport {
        hospitals,
        primary_hospitals: Some(primary_hospitals),
        secondary_hospitals: Some(secondary_hospitals),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeEnv;
    use crate::db::repository::{upsert_profile, ProfileFields};
    use crate::hospitals::{StaticPlaceProvider, UNKNOWN_STATUS};
    use crate::notify::MockSmsProvider;
    use chrono::Utc;

    const HERE: Coordinates = Coordinates { latitude: 12.9716, longitude: 77.5946 };

    fn fields(secondary: Option<&str>) -> ProfileFields {
        ProfileFields {
            name: "Asha Rao".into(),
            primary_phone: "9876543210".into(),
            secondary_phone: secondary.map(str::to_string),
            medical_conditions: Some("Type 2 diabetes".into()),
            blood_type: BloodType::OPositive,
            ..Default::default()
        }
    }

    fn hospital(name: &str, lat: f64) -> Hospital {
        Hospital::located(HERE, name, "Bengaluru", lat, 77.5946, UNKNOWN_STATUS)
    }

    fn orchestrator(
        profile: Option<ProfileFields>,
        hospitals: Vec<Hospital>,
    ) -> (SosOrchestrator, Arc<MockSmsProvider>) {
        let db = Database::in_memory().unwrap();
        if let Some(fields) = profile {
            db.with_conn(|conn| upsert_profile(conn, &fields, Utc::now())).unwrap();
        }
        let provider = Arc::new(MockSmsProvider::new());
        let gateway = Arc::new(NotificationGateway::new(
            Some(provider.clone()),
            "91",
            RuntimeEnv::Development,
        ));
        let locator = Arc::new(HospitalLocator::new(vec![Box::new(StaticPlaceProvider::new(hospitals))]));
        let sos = SosOrchestrator::new(db, gateway, locator, Duration::from_secs(10), 5000);
        (sos, provider)
    }

    #[test]
    fn emergency_message_uses_placeholders() {
        let now = Utc::now();
        let profile = Profile {
            id: uuid::Uuid::new_v4(),
            name: "Asha Rao".into(),
            primary_phone: "9876543210".into(),
            secondary_phone: None,
            medical_conditions: Some("Asthma".into()),
            medications: None,
            blood_type: BloodType::Unspecified,
            allergies: Some("  ".into()),
            address: None,
            created_at: now,
            updated_at: now,
        };

        let message = emergency_message(&profile, Coordinates::new(12.97, 77.59));
        assert_eq!(
            message,
            "URGENT: Emergency assistance needed for Asha Rao.\n\
             Location: https://www.google.com/maps?q=12.97,77.59\n\
             Medical Conditions: Asthma\n\
             Medications: None specified\n\
             Blood Type: Unknown\n\
             Allergies: None specified"
        );
    }

    #[test]
    fn hospitals_message_ranks_top_three() {
        let list = vec![
            hospital("Alpha", 12.98),
            hospital("Beta", 12.99),
            hospital("Gamma", 13.00),
            hospital("Delta", 13.01),
        ];
        let message = hospitals_message(&list);
        let entries: Vec<_> = message.split("\n\n").collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], "1. Alpha (0.9km): https://www.google.com/maps?q=12.98,77.5946");
        assert!(entries[2].starts_with("3. Gamma ("));
        assert!(!message.contains("Delta"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_secondary_is_skipped() {
        let (sos, provider) = orchestrator(Some(fields(None)), vec![hospital("Alpha", 12.98)]);

        let outcome = sos.trigger(HERE).await.unwrap();
        assert!(outcome.immediate.primary_emergency.success);
        assert!(outcome.immediate.secondary_emergency.skipped);
        assert!(outcome.immediate.secondary_emergency.success);
        assert_eq!(provider.sent().len(), 1);
        assert!(provider.sent()[0].body.starts_with("URGENT: Emergency assistance needed for Asha Rao."));

        let report = outcome.follow_up.await.unwrap();
        assert_eq!(report.messages_sent(), 1);
        assert!(report.secondary_hospitals.unwrap().skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn both_contacts_get_both_phases() {
        let (sos, provider) = orchestrator(
            Some(fields(Some("+1 415 555 2671"))),
            vec![hospital("Beta", 12.99), hospital("Alpha", 12.98)],
        );

        let outcome = sos.trigger(HERE).await.unwrap();
        assert!(!outcome.immediate.secondary_emergency.skipped);
        // Phase 2 waits for its delay before sending anything.
        assert_eq!(provider.sent().len(), 2);

        let report = outcome.follow_up.await.unwrap();
        assert_eq!(report.messages_sent(), 2);
        assert_eq!(report.hospitals.len(), 2);

        let sent = provider.sent();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[2].to, "+919876543210");
        assert_eq!(sent[3].to, "+14155552671");
        assert!(sent[2].body.starts_with("1. Alpha"));
    }

    #[tokio::test(start_paused = true)]
    async fn no_hospitals_means_no_follow_up() {
        let (sos, provider) = orchestrator(Some(fields(Some("9123456780"))), Vec::new());

        let outcome = sos.trigger(HERE).await.unwrap();
        let report = outcome.follow_up.await.unwrap();

        assert_eq!(report.messages_sent(), 0);
        assert!(report.primary_hospitals.is_none());
        assert!(report.error.is_some());
        assert_eq!(provider.sent().len(), 2);
    }

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let (sos, provider) = orchestrator(None, Vec::new());
        let err = sos.trigger(HERE).await.err().unwrap();
        assert!(matches!(err, SosError::ProfileNotFound));
        assert!(provider.sent().is_empty());
    }

    #[tokio::test]
    async fn invalid_coordinates_rejected() {
        let (sos, _) = orchestrator(Some(fields(None)), Vec::new());
        let err = sos.trigger(Coordinates::new(95.0, 10.0)).await.err().unwrap();
        assert!(matches!(err, SosError::InvalidCoordinates));
    }
}

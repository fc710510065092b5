//! Application state shared by every HTTP handler.
//!
//! `CoreState` is built once at startup from `AppConfig`: it opens the
//! database, constructs the SMS, place-search, and generative-model
//! providers, and wires them into the reminder, SOS, and advisor services.
//! Handlers receive it as `Arc<CoreState>`.

use std::sync::Arc;

use serde::Serialize;

use crate::advisor::{GeminiClient, GenerativeModel, HealthAdvisor};
use crate::config::AppConfig;
use crate::db::{self, Database};
use crate::hospitals::HospitalLocator;
use crate::notify::{NotificationGateway, SmsProvider, TwilioProvider};
use crate::reminders::{ReminderScheduler, ReminderService};
use crate::sos::SosOrchestrator;

pub struct CoreState {
    pub config: AppConfig,
    pub db: Database,
    pub gateway: Arc<NotificationGateway>,
    pub locator: Arc<HospitalLocator>,
    pub reminders: ReminderService,
    pub sos: SosOrchestrator,
    pub advisor: HealthAdvisor,
}

impl CoreState {
    /// Open the configured database and build the real providers.
    pub fn from_config(config: AppConfig) -> Result<Self, CoreError> {
        let db = Database::open(&config.database_path)?;

        let sms: Option<Arc<dyn SmsProvider>> = config.twilio.as_ref().map(|t| {
            Arc::new(TwilioProvider::new(
                &t.account_sid,
                &t.auth_token,
                &t.from_number,
                config.http_timeout_secs,
            )) as Arc<dyn SmsProvider>
        });
        let locator = HospitalLocator::with_default_chain(
            config.google_maps_api_key.as_deref(),
            config.http_timeout_secs,
        );
        let model: Option<Arc<dyn GenerativeModel>> = config.gemini_api_key.as_ref().map(|key| {
            Arc::new(GeminiClient::new(key, &config.gemini_model, config.http_timeout_secs))
                as Arc<dyn GenerativeModel>
        });

        Ok(Self::assemble(config, db, sms, locator, model))
    }

    /// Wire the services around already-built providers.
    pub fn assemble(
        config: AppConfig,
        db: Database,
        sms: Option<Arc<dyn SmsProvider>>,
        locator: HospitalLocator,
        model: Option<Arc<dyn GenerativeModel>>,
    ) -> Self {
        let gateway = Arc::new(NotificationGateway::new(
            sms,
            &config.default_country_code,
            config.env,
        ));
        let locator = Arc::new(locator);
        let scheduler = ReminderScheduler::new(db.clone(), gateway.clone());
        let reminders = ReminderService::new(db.clone(), scheduler);
        let sos = SosOrchestrator::new(
            db.clone(),
            gateway.clone(),
            locator.clone(),
            config.sos_hospital_delay,
            config.hospital_search_radius_m,
        );
        let advisor = HealthAdvisor::new(model);

        Self {
            config,
            db,
            gateway,
            locator,
            reminders,
            sos,
            advisor,
        }
    }

    /// Which external providers are usable. Never includes secrets.
    pub fn provider_status(&self) -> ProviderStatus {
        ProviderStatus {
            sms: self.gateway.is_configured(),
            hospital_providers: self.locator.provider_names(),
            generative_model: self.advisor.model_name().map(str::to_string),
        }
    }

    /// Log the configuration summary at startup.
    pub fn log_startup_summary(&self) {
        let status = self.provider_status();
        tracing::info!(
            database = %self.config.database_path.display(),
            env = ?self.config.env,
            country_code = %self.config.default_country_code,
            "Configuration loaded"
        );
        if status.sms {
            tracing::info!("SMS provider configured");
        } else {
            tracing::warn!("SMS provider not configured; messages will be simulated");
        }
        tracing::info!(providers = ?status.hospital_providers, "Hospital search chain");
        match &status.generative_model {
            Some(model) => tracing::info!(model = %model, "Generative model configured"),
            None => tracing::warn!("Generative model not configured; advisor endpoints disabled"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub sms: bool,
    pub hospital_providers: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generative_model: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

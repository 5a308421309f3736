//! Periodic alert pass over every registered user

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, instrument, warn};

use super::message::compose_alert;
use crate::classifier::{ALERT_PRECIPITATION_MM, RiskAssessment, RiskClassifier};
use crate::email::Mailer;
use crate::models::UserRecord;
use crate::safe_zones::{SafeZoneSearch, SearchParams};
use crate::users::UserDirectory;
use crate::weather::{ProbeTarget, WeatherProbe};
use crate::Result;

/// Alert when the model says so or rainfall alone crosses the threshold
#[must_use]
pub fn should_alert(assessment: &RiskAssessment) -> bool {
    assessment.is_risk || assessment.precipitation >= ALERT_PRECIPITATION_MM
}

/// What happened for one user during a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOutcome {
    Clear,
    Alerted { safe_zones: usize },
}

/// Tally of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub users_checked: usize,
    pub alerts_sent: usize,
    /// Users whose weather lookup or email delivery failed
    pub failures: usize,
}

pub struct AlertPipeline {
    users: Arc<dyn UserDirectory>,
    probe: Arc<dyn WeatherProbe>,
    classifier: Arc<dyn RiskClassifier>,
    search: SafeZoneSearch,
    mailer: Arc<dyn Mailer>,
    params: SearchParams,
    poll_interval: Duration,
}

impl AlertPipeline {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        probe: Arc<dyn WeatherProbe>,
        classifier: Arc<dyn RiskClassifier>,
        search: SafeZoneSearch,
        mailer: Arc<dyn Mailer>,
        params: SearchParams,
        poll_interval: Duration,
    ) -> Self {
        Self {
            users,
            probe,
            classifier,
            search,
            mailer,
            params,
            poll_interval,
        }
    }

    /// Check one user's home location and send an alert if needed
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn evaluate_user(&self, user: &UserRecord) -> Result<UserOutcome> {
        let weather = self
            .probe
            .fetch(&ProbeTarget::Coordinates(user.home_coordinate))
            .await?;

        let assessment = self.classifier.predict(&weather);
        if !should_alert(&assessment) {
            info!(
                "No risk for {} ({})",
                user.username,
                weather.format_precipitation()
            );
            return Ok(UserOutcome::Clear);
        }

        warn!(
            "Cloudburst risk at {}, {}: {}",
            user.address,
            user.city,
            weather.format_precipitation()
        );

        let zones = self
            .search
            .find_safe_zones(&user.home_coordinate, &self.params)
            .await;
        let message = compose_alert(user, &weather, &zones);
        self.mailer
            .send(&user.email, &message.subject, &message.body)
            .await?;

        Ok(UserOutcome::Alerted {
            safe_zones: zones.len(),
        })
    }

    /// Evaluate every registered user once; one user's failure never stops the pass
    pub async fn run_once(&self) -> Result<PassReport> {
        let users = self.users.list_all().await?;
        let mut report = PassReport::default();

        for user in &users {
            report.users_checked += 1;
            match self.evaluate_user(user).await {
                Ok(UserOutcome::Alerted { safe_zones }) => {
                    info!(
                        "Alert sent to {} with {} safe zones",
                        user.email, safe_zones
                    );
                    report.alerts_sent += 1;
                }
                Ok(UserOutcome::Clear) => {}
                Err(e) => {
                    error!("Alert check failed for {}: {}", user.email, e);
                    report.failures += 1;
                }
            }
        }

        info!(
            "Alert pass complete: {} users, {} alerts, {} failures",
            report.users_checked, report.alerts_sent, report.failures
        );
        Ok(report)
    }

    /// Run a pass immediately, then every poll interval until `shutdown` resolves
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Alert monitor started, checking every {}s",
            self.poll_interval.as_secs()
        );

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Alert monitor stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!("Alert pass failed: {}", e);
                    }
                }
            }
        }
    }
}

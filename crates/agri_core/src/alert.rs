//! User-facing summaries of coordinator outcomes. Formatting is kept apart
//! from the operations so the UI can render or suppress them.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::coordinator::{
    FullTestOutcome, ImmediateTestOutcome, PermissionReport, TestNotificationView,
};
use crate::notifications::{PermissionState, TriggerSpec};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

pub trait AlertPresenter: Send + Sync {
    fn present(&self, alert: &Alert);
}

/// Keeps every presented alert; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingPresenter {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    pub fn last(&self) -> Option<Alert> {
        self.alerts.lock().last().cloned()
    }
}

impl AlertPresenter for RecordingPresenter {
    fn present(&self, alert: &Alert) {
        self.alerts.lock().push(alert.clone());
    }
}

pub fn clock_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Absolute time when known, otherwise the delay the trigger was created with.
pub fn fire_label(fires_at: Option<DateTime<Utc>>, trigger: &TriggerSpec) -> String {
    let absolute = |at: DateTime<Utc>| {
        at.with_timezone(&Local)
            .format("%d/%m/%Y %H:%M:%S")
            .to_string()
    };
    match (fires_at, trigger) {
        (Some(at), _) => absolute(at),
        (None, TriggerSpec::At { date }) => absolute(*date),
        (None, TriggerSpec::After { seconds }) => format!("dans {seconds} s"),
    }
}

impl FullTestOutcome {
    pub fn alert(&self) -> Alert {
        match self {
            FullTestOutcome::Scheduled(schedule) => Alert::new(
                "Test programmé",
                format!(
                    "Deux notifications de test sont programmées :\n\
                     - Rappel soins des cultures à {}\n\
                     - Alerte météo à {}\n\
                     Elles ne se répéteront pas.",
                    clock_time(schedule.daily_at),
                    clock_time(schedule.weather_at)
                ),
            ),
            FullTestOutcome::PermissionDenied => Alert::new(
                "Permission refusée",
                "Autorisez les notifications dans les réglages pour lancer le test.",
            ),
            FullTestOutcome::Failed { reason } => {
                Alert::new("Erreur", format!("Impossible de programmer le test : {reason}"))
            }
        }
    }
}

impl ImmediateTestOutcome {
    pub fn alert(&self) -> Alert {
        match self {
            ImmediateTestOutcome::Scheduled {
                scheduled,
                remaining,
                ..
            } => {
                let timing = if *scheduled > 1 {
                    "La première arrive dans quelques secondes, la suivante peu après."
                } else {
                    "Elle arrive dans quelques secondes."
                };
                Alert::new(
                    "Test lancé",
                    format!(
                        "{scheduled} notification(s) de test programmée(s). {timing}\n\
                         Tests restants : {remaining}"
                    ),
                )
            }
            ImmediateTestOutcome::LimitReached { max } => Alert::new(
                "Limite atteinte",
                format!(
                    "Les {max} notifications de test ont déjà été envoyées. \
                     Réinitialisez le compteur pour recommencer."
                ),
            ),
            ImmediateTestOutcome::Failed { reason, .. } => {
                Alert::new("Erreur", format!("Le test a échoué : {reason}"))
            }
        }
    }
}

pub fn listing(views: &[TestNotificationView]) -> Alert {
    if views.is_empty() {
        return Alert::new("Notifications de test", "Aucune notification de test programmée.");
    }
    let lines: Vec<String> = views
        .iter()
        .enumerate()
        .map(|(index, view)| format!("{}. {} ({})", index + 1, view.title, view.fire_label))
        .collect();
    Alert::new(
        format!("Notifications de test ({})", views.len()),
        lines.join("\n"),
    )
}

pub fn canceled(count: usize) -> Alert {
    Alert::new(
        "Notifications annulées",
        format!("{count} notification(s) de test annulée(s)."),
    )
}

pub fn permission(report: Option<&PermissionReport>) -> Alert {
    let Some(report) = report else {
        return Alert::new("Erreur", "Impossible de lire l'état des notifications.");
    };
    let status = match report.permission {
        PermissionState::Granted => "accordée",
        PermissionState::Denied => "refusée",
        PermissionState::Undetermined => "non demandée",
    };
    Alert::new(
        "État des notifications",
        format!(
            "Permission : {status}\nTests envoyés : {}/{}\nTests restants : {}",
            report.sent, report.max, report.remaining
        ),
    )
}

pub fn reset(done: bool) -> Alert {
    if done {
        Alert::new("Compteur réinitialisé", "Vous pouvez relancer les tests de notification.")
    } else {
        Alert::new("Erreur", "Impossible de réinitialiser le compteur.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn full_test_alert_lists_both_fire_times() {
        let daily_at = Utc.with_ymd_and_hms(2025, 4, 14, 7, 35, 0).unwrap();
        let weather_at = daily_at + chrono::Duration::seconds(30);
        let outcome = FullTestOutcome::Scheduled(crate::coordinator::FullTestSchedule {
            push_token: "token".into(),
            daily_at,
            weather_at,
            daily_id: "a".into(),
            weather_id: "b".into(),
        });
        let alert = outcome.alert();
        assert!(alert.message.contains(&clock_time(daily_at)));
        assert!(alert.message.contains(&clock_time(weather_at)));
    }

    #[test]
    fn limit_alert_names_the_quota() {
        let alert = ImmediateTestOutcome::LimitReached { max: 2 }.alert();
        assert_eq!(alert.title, "Limite atteinte");
        assert!(alert.message.contains("Les 2 notifications"));
    }

    #[test]
    fn empty_listing_is_not_an_error() {
        let alert = listing(&[]);
        assert!(alert.message.contains("Aucune"));
    }

    #[test]
    fn permission_alert_reports_counter() {
        let report = PermissionReport {
            permission: PermissionState::Granted,
            sent: 1,
            max: 2,
            remaining: 1,
        };
        let alert = permission(Some(&report));
        assert!(alert.message.contains("accordée"));
        assert!(alert.message.contains("1/2"));
        assert_eq!(permission(None).title, "Erreur");
    }

    #[test]
    fn relative_triggers_render_as_delay_only_when_unresolved() {
        assert_eq!(fire_label(None, &TriggerSpec::after(40)), "dans 40 s");
        let at = Utc.with_ymd_and_hms(2025, 4, 14, 7, 30, 40).unwrap();
        let label = fire_label(Some(at), &TriggerSpec::after(40));
        assert_eq!(label, at.with_timezone(&Local).format("%d/%m/%Y %H:%M:%S").to_string());
    }
}

//! Dashboard session state machine and its timers.
//!
//! [`SessionState::apply`] is the only way the view, tab and notification
//! flags change. A [`Session`] owns the refresh, contamination-alert and
//! drift timers; they start on login and are cancelled together on logout.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::SafetyScore;
use crate::scheduler::{ScheduledTask, TaskGroup};

// ---

const CONTAMINATION_MESSAGE: &str =
    "Alert: A high contamination area has been identified near your active sector.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tab {
    Dashboard,
    Heatmap,
    Reports,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum View {
    Landing,
    Dashboard(Tab),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationKind {
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    // ---
    pub message: String,
    pub kind: NotificationKind,
}

impl Notification {
    // ---
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NotificationKind::Warning,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NotificationKind::Info,
        }
    }
}

/// Inputs that drive [`SessionState`] transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LogIn,
    LogOut,
    SelectTab(Tab),
    Notify(Notification),
    ClearNotification,
    /// An advisory finished resolving for the local area.
    AssessmentResolved(SafetyScore),
    /// The delayed nearby-contamination alert fired.
    ContaminationAlert,
    DismissCritical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    // ---
    pub view: View,
    pub notification: Option<Notification>,
    pub show_alerts: bool,
    pub show_critical_modal: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            view: View::Landing,
            notification: None,
            show_alerts: false,
            show_critical_modal: false,
        }
    }
}

impl SessionState {
    // ---
    pub fn is_logged_in(&self) -> bool {
        matches!(self.view, View::Dashboard(_))
    }

    /// Compute the next state. Only `LogIn` is accepted on the landing view.
    pub fn apply(self, event: SessionEvent) -> Self {
        // ---
        if !self.is_logged_in() {
            return match event {
                SessionEvent::LogIn => Self {
                    view: View::Dashboard(Tab::Dashboard),
                    ..self
                },
                _ => self,
            };
        }

        match event {
            SessionEvent::LogIn => self,
            SessionEvent::LogOut => Self::default(),
            SessionEvent::SelectTab(tab) => Self {
                view: View::Dashboard(tab),
                ..self
            },
            SessionEvent::Notify(notification) => Self {
                notification: Some(notification),
                ..self
            },
            SessionEvent::ClearNotification => Self {
                notification: None,
                ..self
            },
            SessionEvent::AssessmentResolved(score) => {
                if !score.is_alerting() {
                    return self;
                }
                // An existing notification is never overwritten by an area scan.
                let notification = self.notification.or_else(|| {
                    Some(Notification::warning(format!(
                        "Area Scan: {score} water detected locally."
                    )))
                });
                Self {
                    notification,
                    show_critical_modal: self.show_critical_modal
                        || score == SafetyScore::Unsafe,
                    ..self
                }
            }
            SessionEvent::ContaminationAlert => Self {
                notification: Some(Notification::warning(CONTAMINATION_MESSAGE)),
                show_alerts: true,
                ..self
            },
            SessionEvent::DismissCritical => Self {
                show_critical_modal: false,
                ..self
            },
        }
    }
}

// ---

/// Timer output delivered to the session owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Refetch readings/reports and re-resolve the advisory.
    Refresh,
    /// Delayed contamination alert; already applied to the state.
    ContaminationAlert,
    /// Apply one step of synthetic sensor drift.
    Drift,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionTimings {
    // ---
    pub refresh_every: Duration,
    pub alert_after: Duration,
    pub drift_every: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            refresh_every: Duration::from_secs(30),
            alert_after: Duration::from_secs(60),
            drift_every: Duration::from_secs(5),
        }
    }
}

/// One user's dashboard session.
#[derive(Debug)]
pub struct Session {
    // ---
    id: Uuid,
    state: SessionState,
    timings: SessionTimings,
    tasks: TaskGroup,
    ticks: Option<mpsc::UnboundedReceiver<Tick>>,
}

impl Session {
    // ---
    pub fn new(timings: SessionTimings) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::default(),
            timings,
            tasks: TaskGroup::new(),
            ticks: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn timers_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Apply an event, starting or cancelling timers on login/logout.
    pub fn dispatch(&mut self, event: SessionEvent) {
        // ---
        let was_logged_in = self.state.is_logged_in();
        self.state = std::mem::take(&mut self.state).apply(event);

        match (was_logged_in, self.state.is_logged_in()) {
            (false, true) => self.start_timers(),
            (true, false) => self.end(),
            _ => {}
        }
    }

    /// Wait for the next timer tick. Returns `None` once the session has
    /// ended.
    pub async fn next_tick(&mut self) -> Option<Tick> {
        // ---
        let tick = self.ticks.as_mut()?.recv().await?;
        if tick == Tick::ContaminationAlert {
            self.state = std::mem::take(&mut self.state).apply(SessionEvent::ContaminationAlert);
        }
        Some(tick)
    }

    /// Cancel every timer and drop any undelivered ticks.
    pub fn end(&mut self) {
        // ---
        if self.timers_running() {
            info!("Session {} ended, cancelling {} timers", self.id, self.tasks.len());
        }
        self.tasks.cancel_all();
        self.ticks = None;
        if self.state.is_logged_in() {
            self.state = std::mem::take(&mut self.state).apply(SessionEvent::LogOut);
        }
    }

    fn start_timers(&mut self) {
        // ---
        let (tx, rx) = mpsc::unbounded_channel();
        self.ticks = Some(rx);
        debug!("Session {} starting timers: {:?}", self.id, self.timings);

        self.tasks.push(ScheduledTask::every(
            "refresh",
            self.timings.refresh_every,
            sender(&tx, Tick::Refresh),
        ));
        self.tasks.push(ScheduledTask::every(
            "drift",
            self.timings.drift_every,
            sender(&tx, Tick::Drift),
        ));
        self.tasks.push(ScheduledTask::after(
            "contamination-alert",
            self.timings.alert_after,
            sender(&tx, Tick::ContaminationAlert),
        ));
    }
}

fn sender(
    tx: &mpsc::UnboundedSender<Tick>,
    tick: Tick,
) -> impl FnMut() -> std::future::Ready<()> + Send + 'static {
    // ---
    let tx = tx.clone();
    move || {
        // The receiver is gone only after the session ended.
        let _ = tx.send(tick);
        std::future::ready(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn logged_in() -> SessionState {
        SessionState::default().apply(SessionEvent::LogIn)
    }

    #[test]
    fn test_login_and_tabs() {
        // ---
        let state = SessionState::default();
        assert_eq!(state.view, View::Landing);

        // Tab selection is ignored before login.
        let state = state.apply(SessionEvent::SelectTab(Tab::Heatmap));
        assert_eq!(state.view, View::Landing);

        let state = state.apply(SessionEvent::LogIn);
        assert_eq!(state.view, View::Dashboard(Tab::Dashboard));

        let state = state.apply(SessionEvent::SelectTab(Tab::Reports));
        assert_eq!(state.view, View::Dashboard(Tab::Reports));
    }

    #[test]
    fn test_logout_clears_flags() {
        // ---
        let state = logged_in()
            .apply(SessionEvent::AssessmentResolved(SafetyScore::Unsafe))
            .apply(SessionEvent::ContaminationAlert)
            .apply(SessionEvent::LogOut);
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn test_assessment_notifications() {
        // ---
        let safe = logged_in().apply(SessionEvent::AssessmentResolved(SafetyScore::Safe));
        assert_eq!(safe, logged_in());

        let risk = logged_in().apply(SessionEvent::AssessmentResolved(SafetyScore::Risk));
        assert_eq!(
            risk.notification,
            Some(Notification::warning("Area Scan: Risk water detected locally."))
        );
        assert!(!risk.show_critical_modal);

        let unsafe_ = logged_in().apply(SessionEvent::AssessmentResolved(SafetyScore::Unsafe));
        assert!(unsafe_.show_critical_modal);
        let dismissed = unsafe_.apply(SessionEvent::DismissCritical);
        assert!(!dismissed.show_critical_modal);
        assert!(dismissed.notification.is_some());
    }

    #[test]
    fn test_existing_notification_is_kept() {
        // ---
        let state = logged_in()
            .apply(SessionEvent::Notify(Notification::info("Report submitted")))
            .apply(SessionEvent::AssessmentResolved(SafetyScore::Unsafe));
        assert_eq!(state.notification, Some(Notification::info("Report submitted")));
        assert!(state.show_critical_modal);

        let cleared = state.apply(SessionEvent::ClearNotification);
        assert_eq!(cleared.notification, None);
    }

    #[test]
    fn test_contamination_alert_overrides() {
        // ---
        let state = logged_in()
            .apply(SessionEvent::Notify(Notification::info("hello")))
            .apply(SessionEvent::ContaminationAlert);
        assert!(state.show_alerts);
        assert_eq!(state.notification, Some(Notification::warning(CONTAMINATION_MESSAGE)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_timers() {
        // ---
        let mut session = Session::new(SessionTimings {
            refresh_every: Duration::from_secs(25),
            alert_after: Duration::from_secs(60),
            drift_every: Duration::from_secs(7),
        });
        assert!(!session.timers_running());

        session.dispatch(SessionEvent::LogIn);
        assert!(session.timers_running());

        let (mut refreshes, mut drifts) = (0, 0);
        loop {
            match session.next_tick().await {
                Some(Tick::Refresh) => refreshes += 1,
                Some(Tick::Drift) => drifts += 1,
                Some(Tick::ContaminationAlert) => break,
                None => panic!("session ended unexpectedly"),
            }
        }
        assert_eq!(refreshes, 2);
        assert_eq!(drifts, 8);
        assert!(session.state().show_alerts);
        assert_eq!(
            session.state().notification,
            Some(Notification::warning(CONTAMINATION_MESSAGE))
        );

        session.dispatch(SessionEvent::LogOut);
        assert!(!session.timers_running());
        assert_eq!(session.state().view, View::Landing);
        assert_eq!(session.next_tick().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_without_login_is_noop() {
        // ---
        let mut session = Session::new(SessionTimings::default());
        session.end();
        assert_eq!(session.next_tick().await, None);
        assert_eq!(session.state(), &SessionState::default());
    }
}

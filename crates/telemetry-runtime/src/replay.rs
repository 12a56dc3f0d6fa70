//! Drive an aggregator from a recorded script.
//!
//! Commands are applied strictly in order. A command's `at` timestamp, when
//! present, moves the [`ManualClock`] before the command runs, so recorded
//! timings come out exactly as captured.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use telemetry_core::catalog::is_registered;
use telemetry_core::clock::{Clock, ManualClock};
use telemetry_core::observable::Subscription;
use telemetry_data::reader::{ScriptCommand, TimedCommand};
use telemetry_data::TelemetryAggregator;

use crate::auth::{bind_identity, AuthState, AuthStore, UserProfile};
use crate::shared::SharedAggregator;

/// Counters describing one replay run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: usize,
    /// Chokepoint attempts against names outside the catalog.
    pub ignored: usize,
    /// Commands whose `at` was earlier than the previous command's.
    pub out_of_order: usize,
    pub failed: usize,
}

pub struct Replayer {
    aggregator: SharedAggregator,
    auth: AuthStore,
    clock: Arc<ManualClock>,
    stats: ReplayStats,
    _identity: Subscription<AuthState>,
}

impl Replayer {
    /// A fresh aggregator on a manual clock starting at `start`, with an
    /// in-memory auth store bound to it.
    pub fn new(start: DateTime<Utc>) -> Self {
        let clock = Arc::new(ManualClock::new(start));
        let aggregator = SharedAggregator::new(TelemetryAggregator::with_clock(clock.clone()));
        Self::with_parts(aggregator, AuthStore::in_memory(), clock)
    }

    /// `aggregator` should be built on `clock` for timestamps to line up.
    pub fn with_parts(aggregator: SharedAggregator, auth: AuthStore, clock: Arc<ManualClock>) -> Self {
        auth.restore();
        let identity = bind_identity(&auth, aggregator.clone());
        Self {
            aggregator,
            auth,
            clock,
            stats: ReplayStats::default(),
            _identity: identity,
        }
    }

    pub fn aggregator(&self) -> &SharedAggregator {
        &self.aggregator
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn stats(&self) -> ReplayStats {
        self.stats
    }

    pub fn run(&mut self, commands: &[TimedCommand]) -> ReplayStats {
        for command in commands {
            self.apply(command);
        }
        tracing::info!(
            applied = self.stats.applied,
            ignored = self.stats.ignored,
            failed = self.stats.failed,
            "script replay finished"
        );
        self.stats
    }

    pub fn apply(&mut self, timed: &TimedCommand) {
        if let Some(at) = timed.at {
            if at < self.clock.now() {
                tracing::warn!(
                    source = %timed.source.display(),
                    line = timed.line,
                    "timestamp earlier than previous command"
                );
                self.stats.out_of_order += 1;
            }
            self.clock.set(at);
        }

        match &timed.command {
            ScriptCommand::JourneyStep { step, screen, data } => {
                self.aggregator
                    .with(|agg| agg.track_journey_step(step, screen, data.clone()));
            }
            ScriptCommand::Event {
                event,
                screen,
                data,
                duration,
            } => {
                self.aggregator.with(|agg| {
                    agg.track_event(event.as_str(), screen.as_deref(), data.clone(), *duration);
                });
            }
            ScriptCommand::Chokepoint {
                name,
                success,
                duration,
                error,
            } => {
                if !is_registered(name) {
                    tracing::warn!(
                        source = %timed.source.display(),
                        line = timed.line,
                        chokepoint = %name,
                        "script names an unregistered chokepoint"
                    );
                    self.stats.ignored += 1;
                    return;
                }
                self.aggregator.with(|agg| {
                    agg.track_chokepoint_attempt(name, *success, *duration, error.as_deref())
                });
            }
            ScriptCommand::Satisfaction {
                screen,
                rating,
                feedback,
            } => {
                self.aggregator
                    .with(|agg| agg.track_user_satisfaction(screen, *rating, feedback.as_deref()));
            }
            ScriptCommand::Conversion {
                conversion_type,
                screen,
                data,
            } => {
                self.aggregator
                    .with(|agg| agg.track_conversion(conversion_type, screen, data.clone()));
            }
            ScriptCommand::Error {
                error,
                screen,
                context,
            } => {
                self.aggregator
                    .with(|agg| agg.track_error(error, screen, context.clone()));
            }
            ScriptCommand::Identify { user_id } => {
                self.aggregator.with(|agg| agg.set_user_id(user_id));
            }
            ScriptCommand::SignIn {
                user_id,
                email,
                display_name,
                token,
            } => {
                let user = UserProfile {
                    id: user_id.clone(),
                    email: email.clone(),
                    display_name: display_name.clone(),
                };
                if let Err(e) = self.auth.sign_in(user, token.as_str()) {
                    tracing::warn!(line = timed.line, error = %e, "sign-in failed");
                    self.stats.failed += 1;
                    return;
                }
            }
            ScriptCommand::SignOut => {
                if let Err(e) = self.auth.sign_out() {
                    tracing::warn!(line = timed.line, error = %e, "sign-out failed");
                    self.stats.failed += 1;
                    return;
                }
            }
            ScriptCommand::Clear => {
                self.aggregator.with(|agg| agg.clear_metrics());
            }
        }

        self.stats.applied += 1;
    }
}

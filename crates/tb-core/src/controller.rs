//! The account controller: the single writer over a [`TimeAccount`].
//!
//! Every successful mutation updates the in-memory account, tells
//! subscribers what changed, and hands a fresh snapshot to the
//! [`SaveQueue`]. The in-memory state is authoritative as soon as a method
//! returns; call [`AccountController::flush`] when durability matters.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::account::{AccountSnapshot, ExportData, TimeAccount};
use crate::balance::{self, TimelineDataPoint};
use crate::clock::{Clock, SystemClock};
use crate::defaults::{MeterDefaults, StaticDefaults};
use crate::error::AccountError;
use crate::event::MeterEvent;
use crate::log::EventLog;
use crate::meter::{Meter, MeterCatalog};
use crate::notify::{NoopNotifier, NotificationSink};
use crate::persist::SaveQueue;
use crate::settings::{DEFAULT_LANGUAGE, Settings, SettingsProvider, StoredSettings};
use crate::storage::{ACCOUNT_KEY, SharedStore, lock};
use crate::types::{
    AccountKind, EventId, MeterId, ValidationError, default_timeline_period, validate_name,
};

/// What a successful mutation changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    Loaded,
    MeterActivated {
        meter: MeterId,
        event: EventId,
        /// The event that was closed by switching, if any.
        switched_from: Option<EventId>,
    },
    MeterDeactivated {
        event: EventId,
    },
    EventDeleted {
        event: EventId,
    },
    EventUpdated {
        event: EventId,
    },
    MeterAdded {
        meter: MeterId,
    },
    MeterRenamed {
        meter: MeterId,
    },
    MeterRemoved {
        meter: MeterId,
    },
    MetersReordered,
    TimelinePeriodChanged,
    Imported {
        /// Running events closed because their meter was not imported.
        stopped: usize,
    },
    Reset,
}

/// Handle returned by [`AccountController::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn(&StateChange) + Send>;

/// Configures and creates an [`AccountController`].
pub struct ControllerBuilder {
    store: SharedStore,
    kind: AccountKind,
    defaults: Option<Box<dyn MeterDefaults>>,
    settings: Option<Box<dyn SettingsProvider>>,
    notifier: Box<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl ControllerBuilder {
    #[must_use]
    pub const fn kind(mut self, kind: AccountKind) -> Self {
        self.kind = kind;
        self
    }

    /// Source of meters for accounts that have none. Defaults to the
    /// built-in list for the account kind.
    #[must_use]
    pub fn defaults(mut self, defaults: impl MeterDefaults + 'static) -> Self {
        self.defaults = Some(Box::new(defaults));
        self
    }

    /// Defaults to [`StoredSettings`] over the same store.
    #[must_use]
    pub fn settings(mut self, settings: impl SettingsProvider + 'static) -> Self {
        self.settings = Some(Box::new(settings));
        self
    }

    #[must_use]
    pub fn notifier(mut self, notifier: impl NotificationSink + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Creates the controller with an empty account. Call
    /// [`AccountController::load`] to read the stored one.
    pub fn build(self) -> AccountController {
        let kind = self.kind;
        let defaults: Box<dyn MeterDefaults> = match self.defaults {
            Some(defaults) => defaults,
            None => Box::new(StaticDefaults::builtin(kind)),
        };
        let settings: Box<dyn SettingsProvider> = match self.settings {
            Some(settings) => settings,
            None => Box::new(StoredSettings::load(self.store.clone())),
        };
        AccountController {
            account: TimeAccount::new(kind),
            saver: SaveQueue::spawn(self.store.clone()),
            store: self.store,
            defaults,
            settings,
            notifier: self.notifier,
            clock: self.clock,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }
}

/// Orchestrates the meter catalog, the event log and the balance engine.
pub struct AccountController {
    account: TimeAccount,
    store: SharedStore,
    saver: SaveQueue,
    defaults: Box<dyn MeterDefaults>,
    settings: Box<dyn SettingsProvider>,
    notifier: Box<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl AccountController {
    pub fn builder(store: SharedStore) -> ControllerBuilder {
        ControllerBuilder {
            store,
            kind: AccountKind::default(),
            defaults: None,
            settings: None,
            notifier: Box::new(NoopNotifier),
            clock: Arc::new(SystemClock),
        }
    }

    pub const fn kind(&self) -> AccountKind {
        self.account.meters.kind()
    }

    pub const fn meters(&self) -> &MeterCatalog {
        &self.account.meters
    }

    pub const fn events(&self) -> &EventLog {
        &self.account.events
    }

    pub fn active_event(&self) -> Option<&MeterEvent> {
        self.account.events.active()
    }

    /// The meter the running event was started from, if it still exists.
    pub fn active_meter(&self) -> Option<&Meter> {
        let event = self.active_event()?;
        self.account
            .meters
            .meters()
            .iter()
            .find(|m| event.originates_from(m))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn settings(&self) -> Settings {
        self.settings.settings()
    }

    pub fn settings_mut(&mut self) -> &mut dyn SettingsProvider {
        self.settings.as_mut()
    }

    /// Registers a callback run synchronously after every mutation.
    pub fn subscribe(&mut self, listener: impl Fn(&StateChange) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a callback. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    /// Reads the stored account, repairing it on the way in.
    ///
    /// An account without meters gets the default meters. A zero or negative
    /// stored timeline period becomes 24 hours. Running events whose meter no
    /// longer exists are stopped. The normalized account is written back.
    pub fn load(&mut self) -> Result<(), AccountError> {
        // Pending writes must land before the store is trusted.
        self.saver.flush();
        let now = self.clock.now();
        let kind = self.kind();

        let stored = lock(&self.store)?.get(ACCOUNT_KEY)?;
        let (meters, events, period) = match stored {
            Some(json) => {
                let snapshot: AccountSnapshot =
                    serde_json::from_str(&json).map_err(AccountError::Format)?;
                (snapshot.meters, snapshot.events, snapshot.timeline_period)
            }
            None => (Vec::new(), Vec::new(), Duration::zero()),
        };

        let meters = if meters.is_empty() {
            tracing::info!(%kind, "no stored meters, loading defaults");
            self.default_catalog()?
        } else {
            MeterCatalog::from_meters(kind, meters)
        };
        let timeline_period = if period > Duration::zero() {
            period
        } else {
            default_timeline_period()
        };
        let mut events = EventLog::from_events(events);
        let stopped = events.auto_stop_orphans(&meters, now);

        self.account = TimeAccount {
            events,
            meters,
            timeline_period,
        };
        tracing::info!(
            meters = self.account.meters.len(),
            events = self.account.events.len(),
            stopped,
            "account loaded"
        );
        self.commit(StateChange::Loaded);
        Ok(())
    }

    /// Blocks until every queued snapshot has been written.
    pub fn flush(&self) {
        self.saver.flush();
    }

    /// Adds a meter at the end of the display order.
    pub fn add_meter(&mut self, name: &str, factor: Option<f64>) -> Result<MeterId, AccountError> {
        let meter = self.account.meters.add(name, factor)?;
        let id = meter.id;
        tracing::debug!(meter = %id, name = %meter.name, factor = meter.factor, "meter added");
        self.commit(StateChange::MeterAdded { meter: id });
        Ok(id)
    }

    /// Renames a meter. The running event follows the rename when it was
    /// started from this meter; closed events keep their old name.
    pub fn rename_meter(&mut self, id: MeterId, name: &str) -> Result<(), AccountError> {
        let meter = self
            .account
            .meters
            .get(id)
            .ok_or(AccountError::MeterNotFound(id))?;
        let is_origin = self
            .account
            .events
            .active()
            .is_some_and(|event| event.originates_from(meter));

        let renamed = self.account.meters.rename(id, name)?.name.clone();
        if is_origin {
            if let Some(event) = self.account.events.active_mut() {
                event.meter_name.clone_from(&renamed);
            }
        }
        tracing::debug!(meter = %id, name = %renamed, "meter renamed");
        self.commit(StateChange::MeterRenamed { meter: id });
        Ok(())
    }

    /// Removes a meter that is not the origin of the running event.
    pub fn remove_meter(&mut self, id: MeterId) -> Result<Meter, AccountError> {
        let removed = self
            .account
            .meters
            .remove(id, self.account.events.active())?;
        tracing::debug!(meter = %id, name = %removed.name, "meter removed");
        self.commit(StateChange::MeterRemoved { meter: id });
        Ok(removed)
    }

    /// Applies a new display order. Returns `false`, changing nothing, unless
    /// `ordered` is a permutation of the current meter IDs.
    pub fn reorder_meters(&mut self, ordered: &[MeterId]) -> bool {
        if !self.account.meters.reorder(ordered) {
            tracing::debug!("ignoring reorder that is not a permutation");
            return false;
        }
        self.commit(StateChange::MetersReordered);
        true
    }

    /// Starts tracking `meter`, closing whatever was running.
    pub fn activate(&mut self, meter: MeterId, comment: Option<&str>) -> Result<EventId, AccountError> {
        let meter = self
            .account
            .meters
            .get(meter)
            .cloned()
            .ok_or(AccountError::MeterNotFound(meter))?;
        let comment = self.kind().validate_comment(comment)?;
        let now = self.clock.now();

        let (event, switched_from) = self.account.events.activate(&meter, comment, now);
        tracing::debug!(meter = %meter.id, %event, ?switched_from, "meter activated");
        self.commit(StateChange::MeterActivated {
            meter: meter.id,
            event,
            switched_from,
        });
        self.notify(&format!("{} started", self.kind().label()), &meter.name);
        Ok(event)
    }

    /// Stops the running event. Returns its ID, or `None` when nothing ran.
    pub fn deactivate(&mut self) -> Option<EventId> {
        let now = self.clock.now();
        let event = self.account.events.deactivate(now)?;
        let (id, name) = (event.id, event.meter_name.clone());
        tracing::debug!(event = %id, "meter deactivated");
        self.commit(StateChange::MeterDeactivated { event: id });
        self.notify(&format!("{} stopped", self.kind().label()), &name);
        Some(id)
    }

    /// Removes an event, running or not.
    pub fn delete_event(&mut self, id: EventId) -> Result<MeterEvent, AccountError> {
        let removed = self
            .account
            .events
            .delete(id)
            .ok_or(AccountError::EventNotFound(id))?;
        tracing::debug!(event = %id, active = removed.is_active(), "event deleted");
        self.commit(StateChange::EventDeleted { event: id });
        Ok(removed)
    }

    /// Overwrites the interval of a closed event.
    pub fn update_event_times(
        &mut self,
        id: EventId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        let now = self.clock.now();
        self.account.events.update_times(id, start, end, now)?;
        tracing::debug!(event = %id, %start, %end, "event times updated");
        self.commit(StateChange::EventUpdated { event: id });
        Ok(())
    }

    /// Signed sum of all contributions, open events counted until now.
    pub fn current_balance(&self) -> Duration {
        balance::current_balance(self.account.events.events(), self.clock.now())
    }

    /// Balance samples over the configured timeline period.
    pub fn timeline(&self) -> Vec<TimelineDataPoint> {
        self.timeline_for(self.account.timeline_period)
    }

    /// Balance samples over `[now - period, now]`.
    pub fn timeline_for(&self, period: Duration) -> Vec<TimelineDataPoint> {
        balance::timeline(self.account.events.events(), period, self.clock.now())
    }

    pub const fn timeline_period(&self) -> Duration {
        self.account.timeline_period
    }

    pub fn set_timeline_period(&mut self, period: Duration) -> Result<(), AccountError> {
        if period <= Duration::zero() {
            return Err(ValidationError::NonPositivePeriod.into());
        }
        if period == self.account.timeline_period {
            return Ok(());
        }
        self.account.timeline_period = period;
        tracing::debug!(seconds = period.num_seconds(), "timeline period changed");
        self.commit(StateChange::TimelinePeriodChanged);
        Ok(())
    }

    /// Serializes meters and events with the current settings.
    pub fn export_data(&self) -> Result<String, AccountError> {
        let settings = self.settings.settings();
        let data = ExportData {
            exported_at: self.clock.now(),
            language: settings.language,
            tutorial_completed: settings.tutorial_completed,
            meters: self.account.meters.meters().to_vec(),
            events: self.account.events.events().to_vec(),
        };
        serde_json::to_string_pretty(&data).map_err(AccountError::Format)
    }

    /// Replaces meters and events with the contents of an export.
    ///
    /// Every meter name must be valid, otherwise nothing changes. Language
    /// and tutorial state are applied to the settings. Meters are renumbered
    /// by position and truncated to capacity. The timeline period is kept.
    pub fn import_data(&mut self, payload: &str) -> Result<(), AccountError> {
        let mut data: ExportData = serde_json::from_str(payload).map_err(AccountError::Format)?;
        if data.meters.is_empty() {
            return Err(ValidationError::NoMeters.into());
        }
        for meter in &mut data.meters {
            meter.name = validate_name(&meter.name)?;
        }
        let now = self.clock.now();

        let language = data.language.trim();
        self.settings.set_language(if language.is_empty() {
            DEFAULT_LANGUAGE
        } else {
            language
        });
        self.settings.set_tutorial_completed(data.tutorial_completed);

        let mut meters = data.meters;
        for (order, meter) in (0..).zip(meters.iter_mut()) {
            meter.display_order = order;
        }
        let meters = MeterCatalog::from_meters(self.kind(), meters);
        let mut events = EventLog::from_events(data.events);
        let stopped = events.auto_stop_orphans(&meters, now);

        self.account.meters = meters;
        self.account.events = events;
        tracing::info!(
            meters = self.account.meters.len(),
            events = self.account.events.len(),
            stopped,
            "account imported"
        );
        self.commit(StateChange::Imported { stopped });
        Ok(())
    }

    /// Drops all events and goes back to the default meters.
    pub fn reset_data(&mut self) -> Result<(), AccountError> {
        let meters = self.default_catalog()?;
        self.account.events.clear();
        self.account.meters = meters;
        self.account.timeline_period = default_timeline_period();
        tracing::info!("account reset");
        self.commit(StateChange::Reset);
        Ok(())
    }

    /// Forwards to the notification sink.
    pub(crate) fn notify(&self, title: &str, body: &str) {
        self.notifier.notify(title, body);
    }

    fn default_catalog(&self) -> Result<MeterCatalog, AccountError> {
        let templates = self.defaults.load_defaults()?;
        MeterCatalog::from_templates(self.kind(), &templates)
    }

    fn commit(&mut self, change: StateChange) {
        for (_, listener) in &self.listeners {
            listener(&change);
        }
        match serde_json::to_string(&self.account.to_snapshot()) {
            Ok(json) => self.saver.enqueue(ACCOUNT_KEY, json),
            Err(error) => tracing::warn!(%error, "failed to serialize account snapshot"),
        }
    }
}

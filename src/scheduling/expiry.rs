//! Expiry scheduler over two mirrored indices.
//!
//! `time_index` maps [`TimeKey`] (expiry time, made unique by its key) to the key, and
//! `key_index` maps each key back to its expiry time. Both are supplied by the caller and
//! only mutated through the scheduler while it runs. The loop in [`Expirer::process`] always
//! knows the earliest pending expiry, parks on a single [`WakeSignal`] until then, and fires
//! triggers in time order, never before their time.
use std::{fmt::Debug, sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::{signal::WakeSignal, Trigger};
use crate::{
    codec::timestamp::Timestamp,
    config::SchedulerConfig,
    ignore_missing,
    store::{Evict, OrderedStore, Store, TimeKey},
    LapseError, LapseResult,
};

pub struct Expirer<K, TI, KI> {
    time_index: Arc<TI>,
    key_index: Arc<KI>,
    data: Option<Arc<dyn Evict<K>>>,
    trigger: Box<dyn Trigger<K>>,
    signal: WakeSignal,
    renewal: Duration,
}

impl<K, TI, KI> Expirer<K, TI, KI>
where
    K: Clone + PartialEq + Debug + Send + Sync + 'static,
    TI: OrderedStore<Key = TimeKey<K>, Value = K> + 'static,
    KI: Store<Key = K, Value = Timestamp> + 'static,
{
    /// New scheduler over the two indices, renewing every three seconds when idle.
    pub fn new(time_index: Arc<TI>, key_index: Arc<KI>, trigger: impl Trigger<K> + 'static) -> Self {
        Self {
            time_index,
            key_index,
            data: None,
            trigger: Box::new(trigger),
            signal: WakeSignal::new(),
            renewal: SchedulerConfig::default().renewal_interval(),
        }
    }

    /// Expired keys are also removed from `data`.
    pub fn with_data_store<D: Store<Key = K> + 'static>(mut self, data: Arc<D>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_renewal_interval(mut self, renewal: Duration) -> Self {
        self.renewal = renewal;
        self
    }

    pub fn with_config(self, config: &SchedulerConfig) -> Self {
        self.with_renewal_interval(config.renewal_interval())
    }

    pub fn renewal_interval(&self) -> Duration {
        self.renewal
    }

    /// Registers `key` to expire at `at`, replacing any earlier registration.
    pub fn schedule(&self, key: K, at: Timestamp) -> LapseResult<()> {
        let current = self.peek()?;
        let mut retrigger = match &current {
            Some((earliest, _)) => at < earliest.at,
            None => true,
        };

        match self.key_index.get(&key) {
            Ok(previous) => {
                let stale = TimeKey::new(previous, key.clone());
                if matches!(&current, Some((earliest, _)) if *earliest == stale) {
                    retrigger = true;
                }
                ignore_missing(self.time_index.delete(&stale))?;
            }
            Err(LapseError::NotFound) => {}
            Err(err) => return Err(err),
        }

        self.key_index.set(key.clone(), at)?;
        self.time_index.set(TimeKey::new(at, key.clone()), key.clone())?;
        debug!(?key, %at, retrigger, "scheduled expiry");

        // the loop may be parked on an entry that fired since `current` was read
        let woke = if retrigger {
            self.signal.resolve()
        } else {
            self.signal.resolve_if_before(at)
        };
        if woke {
            trace!(?key, "woke expiry loop");
        }
        Ok(())
    }

    /// Registers `key` to expire `after` from now.
    pub fn schedule_in(&self, key: K, after: Duration) -> LapseResult<()> {
        let at = Timestamp::now()
            .checked_add(after)
            .ok_or(LapseError::TimeOverflow)?;
        self.schedule(key, at)
    }

    /// Removes a pending expiry, returning the time it was due.
    pub fn cancel(&self, key: &K) -> LapseResult<Timestamp> {
        let at = self.key_index.get(key)?;
        let slot = TimeKey::new(at, key.clone());
        let retrigger = matches!(self.peek()?, Some((earliest, _)) if earliest == slot);

        ignore_missing(self.time_index.delete(&slot))?;
        ignore_missing(self.key_index.delete(key))?;
        debug!(?key, %at, retrigger, "cancelled expiry");

        if retrigger {
            self.signal.resolve();
        }
        Ok(at)
    }

    pub fn expiry_of(&self, key: &K) -> LapseResult<Option<Timestamp>> {
        match self.key_index.get(key) {
            Ok(at) => Ok(Some(at)),
            Err(LapseError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn next_expiry(&self) -> LapseResult<Option<Timestamp>> {
        Ok(self.peek()?.map(|(slot, _)| slot.at))
    }

    /// Number of registered expiries.
    pub fn pending(&self) -> LapseResult<usize> {
        self.key_index.len()
    }

    /// Runs the expiry loop. Only returns on a store error.
    pub async fn process(&self) -> LapseResult<()> {
        info!(renewal_interval = ?self.renewal, "expiry loop started");
        let result = self.run().await;
        if let Err(err) = &result {
            warn!(%err, "expiry loop stopped");
        }
        result
    }

    /// Starts [`Expirer::process`] on the current tokio runtime.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<LapseResult<()>> {
        tokio::spawn(async move { self.process().await })
    }

    async fn run(&self) -> LapseResult<()> {
        loop {
            // armed before reading the index so no write can slip between the two
            let wait = self.signal.arm();
            let now = Timestamp::now();

            let timeout = match self.peek()? {
                None => {
                    self.signal.park(None);
                    self.renewal
                }
                Some((slot, key)) => match slot.at.duration_since(now) {
                    Some(remaining) if !remaining.is_zero() => {
                        self.signal.park(Some(slot.at));
                        remaining
                    }
                    _ => {
                        self.fire(slot, key)?;
                        continue;
                    }
                },
            };

            let reason = wait.wait(timeout).await;
            trace!(?reason, "expiry loop woke");
        }
    }

    /// Earliest entry of the time index. An index emptied under us reads as empty.
    fn peek(&self) -> LapseResult<Option<(TimeKey<K>, K)>> {
        if self.time_index.is_empty()? {
            return Ok(None);
        }
        match self.time_index.first() {
            Ok(entry) => Ok(Some(entry)),
            Err(LapseError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn fire(&self, slot: TimeKey<K>, key: K) -> LapseResult<()> {
        debug!(?key, at = %slot.at, "key expired");
        self.trigger.on_expire(slot.at, &key);

        if let Some(data) = &self.data {
            if !data.evict(&key)? {
                trace!(?key, "expired key already absent from data store");
            }
        }

        ignore_missing(self.time_index.delete(&slot))?;
        // a reschedule racing this firing owns the newer record
        if !self.key_index.delete_if_eq(&key, &slot.at)? {
            trace!(?key, "key rescheduled while firing");
        }
        Ok(())
    }
}

//! Eviction events and the periodic sweep.
//!
//! Every listener owns an unbounded channel. The sweep pushes each evicted record into every
//! channel without waiting, and each listener drains its channel at its own pace. Listeners get
//! every eviction that happens after they subscribed, in no particular order relative to other
//! listeners, and a slow listener never holds up the sweep.

use crate::{component_id::ComponentId, store::ComponentIdStore};
use std::{
    sync::{Mutex, Weak},
    time::Duration,
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use uuid::Uuid;

/// A record removed from the database by the eviction sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictedComponent {
    pub token: Uuid,
    pub component_id: ComponentId,
}

/// Receiving end of one eviction listener. Dropping it unsubscribes.
pub struct EvictionListener {
    receiver: mpsc::UnboundedReceiver<EvictedComponent>,
}

impl EvictionListener {
    /// Waits for the next eviction. Returns `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<EvictedComponent> {
        self.receiver.recv().await
    }

    /// Next eviction that has already been delivered, if any
    pub fn try_recv(&mut self) -> Option<EvictedComponent> {
        self.receiver.try_recv().ok()
    }
}

#[derive(Default)]
pub(crate) struct EvictionListeners {
    senders: Mutex<Vec<mpsc::UnboundedSender<EvictedComponent>>>,
}

impl EvictionListeners {
    pub(crate) fn subscribe(&self) -> EvictionListener {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sender);
        EvictionListener { receiver }
    }

    /// Hands the event to every listener, forgetting the ones that were dropped
    pub(crate) fn notify(&self, event: &EvictedComponent) {
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|sender| sender.send(event.clone()).is_ok());
    }
}

pub(crate) struct SweepScheduler {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweepScheduler {
    /// Sweeps `store` every `period`, starting after `initial_delay`. The task ends when
    /// stopped or when the store is dropped.
    pub(crate) fn spawn(
        store: Weak<ComponentIdStore>,
        initial_delay: Duration,
        period: Duration,
    ) -> Self {
        let (stop, mut stopped) = watch::channel(false);
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + initial_delay, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = stopped.changed() => break,
                }

                let store = match store.upgrade() {
                    Some(store) => store,
                    None => break,
                };
                if let Err(e) = store.sweep().await {
                    log::warn!("Component id eviction sweep failed, retrying next period: {}", e);
                }
            }
            log::debug!("Component id eviction scheduler stopped");
        });

        Self { stop, handle }
    }

    /// Lets a sweep that is already running finish, then ends the task
    pub(crate) async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            log::warn!("Component id eviction scheduler panicked: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evicted(owner: &str) -> EvictedComponent {
        EvictedComponent {
            token: Uuid::new_v4(),
            component_id: ComponentId::new(owner, vec!["1".into()]),
        }
    }

    #[test]
    fn every_listener_gets_every_event() {
        let listeners = EvictionListeners::default();
        let mut first = listeners.subscribe();
        let mut second = listeners.subscribe();

        let a = evicted("a");
        let b = evicted("b");
        listeners.notify(&a);
        listeners.notify(&b);

        for listener in [&mut first, &mut second] {
            assert_eq!(listener.try_recv(), Some(a.clone()));
            assert_eq!(listener.try_recv(), Some(b.clone()));
            assert_eq!(listener.try_recv(), None);
        }
    }

    #[test]
    fn dropped_listeners_are_forgotten() {
        let listeners = EvictionListeners::default();
        let mut kept = listeners.subscribe();
        drop(listeners.subscribe());

        listeners.notify(&evicted("a"));
        assert_eq!(listeners.senders.lock().unwrap().len(), 1);
        assert!(kept.try_recv().is_some());
    }

    #[test]
    fn listeners_only_see_later_evictions() {
        let listeners = EvictionListeners::default();
        listeners.notify(&evicted("before"));

        let mut late = listeners.subscribe();
        assert_eq!(late.try_recv(), None);
    }
}

//! RichTextSync: keeps a host editor consistent with an externally owned snapshot.
//!
//! Two sources of truth are reconciled without feedback loops:
//!
//! 1. The owner passes its current value through [`RichTextSync::set_external_value`]
//!    (typically on every render). A value that differs from the latest requested one
//!    schedules a single deferred reconciliation; further values reported before it
//!    runs only replace the pending target.
//! 2. When the reconciliation runs, a value equal to the editor's own last
//!    serialization is an echo of an emission and is only remembered. Anything else
//!    clears the editor and rebuilds it inside one `external-sync` update, and the
//!    update notification that rebuild produces is swallowed.
//! 3. Genuine user edits are serialized and handed to `on_change` unless they equal
//!    the value the owner already holds.
//!
//! State is per instance. Dropping the [`RichTextSync`] unregisters its listener and
//! turns any still-queued deferred work into a no-op.

use crate::change;
use crate::config::SyncConfig;
use crate::events::{EventBus, Subscription, SyncEvent, now_millis};
use crate::host::{EXTERNAL_SYNC_TAG, EditorUpdate, HostEditor};
use crate::node::DocumentSnapshot;
use crate::reconstruct::{NodeReconstructor, RebuildReport};
use crate::scheduler::Scheduler;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info};
use uuid::Uuid;

/// Where the controller is in its cycle, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    /// An external snapshot is being written into the editor.
    ReconcilingExternal,
    /// The next editor update is expected to be the echo of a reconciliation.
    SuppressingEcho,
}

#[derive(Default)]
pub struct SyncOptions {
    /// Content loaded into the editor at mount. Never reported through `on_change`.
    pub initial_value: Option<DocumentSnapshot>,
    pub config: SyncConfig,
    /// Diagnostics bus to publish on. A private one is created if absent.
    pub events: Option<Rc<EventBus<SyncEvent>>>,
}

#[derive(Debug, Default)]
struct SyncState {
    last_known_external: Option<DocumentSnapshot>,
    last_internal_serialization: Option<DocumentSnapshot>,
    applying_external_sync: bool,
    suppress_next_emission: bool,
    reconciliation_scheduled: bool,
    /// Latest requested external value not yet reconciled. `Some(None)` requests a clear.
    pending_external: Option<Option<DocumentSnapshot>>,
    reconcile_epoch: u64,
}

struct SyncInner {
    editor_id: String,
    editor: Rc<HostEditor>,
    state: RefCell<SyncState>,
    on_change: Box<dyn Fn(&DocumentSnapshot)>,
    scheduler: Rc<dyn Scheduler>,
    reconstructor: NodeReconstructor,
    config: SyncConfig,
    events: Rc<EventBus<SyncEvent>>,
}

/// Sync engine bound to one mounted editor.
pub struct RichTextSync {
    inner: Rc<SyncInner>,
    _listener: Subscription,
}

impl RichTextSync {
    /// Attach to `editor`. Genuine user edits are reported through `on_change`.
    pub fn mount(
        editor: Rc<HostEditor>,
        scheduler: Rc<dyn Scheduler>,
        options: SyncOptions,
        on_change: impl Fn(&DocumentSnapshot) + 'static,
    ) -> Self {
        let SyncOptions {
            initial_value,
            config,
            events,
        } = options;

        let inner = Rc::new(SyncInner {
            editor_id: Uuid::new_v4().to_string(),
            editor,
            state: RefCell::new(SyncState::default()),
            on_change: Box::new(on_change),
            scheduler,
            reconstructor: NodeReconstructor::new(&config),
            config,
            events: events.unwrap_or_else(|| Rc::new(EventBus::new())),
        });

        if let Some(initial) = initial_value {
            let report = inner.editor.update(&[EXTERNAL_SYNC_TAG], |tree| {
                tree.clear_root();
                let report = inner.reconstructor.rebuild_into(tree, &initial);
                tree.set_selection(None);
                report
            });
            inner.publish_dropped(&report);
            let mut state = inner.state.borrow_mut();
            state.last_internal_serialization = Some(inner.editor.snapshot());
            state.last_known_external = Some(initial);
        }

        let weak = Rc::downgrade(&inner);
        let listener = inner.editor.register_update_listener(move |update| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_update(update);
            }
        });

        let weak = Rc::downgrade(&inner);
        inner.scheduler.defer(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                debug!("Editor {} mounted", inner.editor_id);
                inner.publish(SyncEvent::Mounted {
                    editor_id: inner.editor_id.clone(),
                    timestamp: now_millis(),
                });
            }
        }));

        Self {
            inner,
            _listener: listener,
        }
    }

    /// Report the owner's current value. Cheap when nothing changed.
    pub fn set_external_value(&self, value: Option<DocumentSnapshot>) {
        self.inner.request(value);
    }

    pub fn editor(&self) -> &Rc<HostEditor> {
        &self.inner.editor
    }

    pub fn editor_id(&self) -> &str {
        &self.inner.editor_id
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn events(&self) -> Rc<EventBus<SyncEvent>> {
        Rc::clone(&self.inner.events)
    }

    pub fn phase(&self) -> SyncPhase {
        let state = self.inner.state.borrow();
        if state.applying_external_sync {
            SyncPhase::ReconcilingExternal
        } else if state.suppress_next_emission {
            SyncPhase::SuppressingEcho
        } else {
            SyncPhase::Idle
        }
    }

    pub fn is_reconciliation_scheduled(&self) -> bool {
        self.inner.state.borrow().reconciliation_scheduled
    }

    pub fn last_known_external(&self) -> Option<DocumentSnapshot> {
        self.inner.state.borrow().last_known_external.clone()
    }

    /// Detach from the editor. Equivalent to dropping.
    pub fn unmount(self) {
        debug!("Editor {} unmounted", self.inner.editor_id);
    }
}

impl SyncInner {
    fn publish(&self, event: SyncEvent) {
        self.events.emit(&event);
    }

    fn publish_dropped(&self, report: &RebuildReport) {
        for dropped in &report.dropped {
            self.publish(SyncEvent::ContentDropped {
                editor_id: self.editor_id.clone(),
                path: dropped.path.clone(),
                kind: dropped.kind.clone(),
                reason: dropped.reason.clone(),
                timestamp: now_millis(),
            });
        }
    }

    fn request(self: &Rc<Self>, value: Option<DocumentSnapshot>) {
        let mut state = self.state.borrow_mut();
        let latest = match &state.pending_external {
            Some(pending) => pending.as_ref(),
            None => state.last_known_external.as_ref(),
        };
        if change::equal(latest, value.as_ref()) {
            return;
        }

        state.pending_external = Some(value);
        if state.reconciliation_scheduled {
            debug!("Editor {}: coalesced external change", self.editor_id);
            return;
        }
        state.reconciliation_scheduled = true;
        if state.applying_external_sync {
            // Picked up by the running pass once it completes.
            return;
        }
        drop(state);

        let weak = Rc::downgrade(self);
        self.scheduler.defer(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.reconcile();
            }
        }));
    }

    fn reconcile(self: &Rc<Self>) {
        loop {
            let target = {
                let mut state = self.state.borrow_mut();
                state.reconciliation_scheduled = false;
                match state.pending_external.take() {
                    Some(target) => target,
                    None => return,
                }
            };
            self.apply_external(target);

            if !self.state.borrow().reconciliation_scheduled {
                return;
            }
        }
    }

    fn apply_external(self: &Rc<Self>, target: Option<DocumentSnapshot>) {
        let epoch = {
            let mut state = self.state.borrow_mut();
            let is_echo = target.is_some()
                && change::equal(target.as_ref(), state.last_internal_serialization.as_ref());
            if is_echo {
                state.last_known_external = target;
                drop(state);
                debug!("Editor {}: external value is its own echo", self.editor_id);
                self.publish(SyncEvent::ExternalEchoSkipped {
                    editor_id: self.editor_id.clone(),
                    timestamp: now_millis(),
                });
                return;
            }

            state.applying_external_sync = true;
            state.suppress_next_emission = true;
            state.reconcile_epoch += 1;
            state.last_known_external = target.clone();
            state.reconcile_epoch
        };

        let report = self.editor.update(&[EXTERNAL_SYNC_TAG], |tree| {
            tree.clear_root();
            let report = match &target {
                Some(snapshot) => self.reconstructor.rebuild_into(tree, snapshot),
                None => RebuildReport::default(),
            };
            tree.set_selection(None);
            report
        });

        {
            let mut state = self.state.borrow_mut();
            state.applying_external_sync = false;
            if target.is_none() {
                state.last_internal_serialization = None;
            }
        }

        let weak = Rc::downgrade(self);
        self.scheduler.defer(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut state = inner.state.borrow_mut();
                if state.reconcile_epoch == epoch {
                    state.suppress_next_emission = false;
                }
            }
        }));

        info!(
            "Editor {}: reconciled external value ({} top-level nodes, {} dropped)",
            self.editor_id,
            report.top_level,
            report.dropped.len()
        );
        self.publish_dropped(&report);
        self.publish(SyncEvent::ReconciliationApplied {
            editor_id: self.editor_id.clone(),
            top_level_nodes: report.top_level,
            dropped: report.dropped.len(),
            timestamp: now_millis(),
        });
    }

    fn handle_update(&self, update: &EditorUpdate) {
        if !update.dirty && self.config.ignore_selection_change {
            return;
        }

        let mut state = self.state.borrow_mut();
        if state.suppress_next_emission {
            state.suppress_next_emission = false;
            state.last_internal_serialization = Some(update.snapshot.clone());
            drop(state);
            self.publish(SyncEvent::EchoSuppressed {
                editor_id: self.editor_id.clone(),
                timestamp: now_millis(),
            });
            return;
        }

        if state.applying_external_sync || update.has_tag(EXTERNAL_SYNC_TAG) {
            state.last_internal_serialization = Some(update.snapshot.clone());
            return;
        }

        state.last_internal_serialization = Some(update.snapshot.clone());
        if change::equal(Some(&update.snapshot), state.last_known_external.as_ref()) {
            debug!("Editor {}: edit matches owner value", self.editor_id);
            return;
        }
        drop(state);

        (self.on_change)(&update.snapshot);
        self.publish(SyncEvent::ChangeEmitted {
            editor_id: self.editor_id.clone(),
            timestamp: now_millis(),
        });
    }
}

//! Shared helpers for richtext-sync integration tests.
#![allow(dead_code)]

use richtext_sync::node::SnapshotNode;
use richtext_sync::{
    DocumentSnapshot, EventBus, HostEditor, RichTextSync, Scheduler, Subscription, SyncEvent,
    SyncOptions, TickQueue,
};
use std::cell::RefCell;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

/// Route `tracing` output to the test writer. Respects `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// One paragraph holding one text run.
pub fn doc(text: &str) -> DocumentSnapshot {
    DocumentSnapshot::new(vec![SnapshotNode::paragraph(vec![SnapshotNode::text(text)])])
}

/// A mounted sync engine driven by an explicit tick queue.
pub struct Harness {
    pub queue: Rc<TickQueue>,
    pub sync: RichTextSync,
    pub changes: Rc<RefCell<Vec<DocumentSnapshot>>>,
    pub events: Rc<RefCell<Vec<SyncEvent>>>,
    _events_sub: Subscription,
}

impl Harness {
    pub fn mount(initial_value: Option<DocumentSnapshot>) -> Self {
        Self::mount_on(HostEditor::new(), initial_value)
    }

    pub fn mount_on(editor: HostEditor, initial_value: Option<DocumentSnapshot>) -> Self {
        init_tracing();

        let queue = Rc::new(TickQueue::new());
        let bus = Rc::new(EventBus::new());
        let events = Rc::new(RefCell::new(Vec::new()));
        let events_clone = Rc::clone(&events);
        let events_sub = bus.subscribe(move |event: &SyncEvent| {
            events_clone.borrow_mut().push(event.clone());
        });

        let changes = Rc::new(RefCell::new(Vec::new()));
        let changes_clone = Rc::clone(&changes);
        let sync = RichTextSync::mount(
            Rc::new(editor),
            Rc::clone(&queue) as Rc<dyn Scheduler>,
            SyncOptions {
                initial_value,
                events: Some(bus),
                ..SyncOptions::default()
            },
            move |snapshot| changes_clone.borrow_mut().push(snapshot.clone()),
        );

        Self {
            queue,
            sync,
            changes,
            events,
            _events_sub: events_sub,
        }
    }

    pub fn editor(&self) -> &Rc<HostEditor> {
        self.sync.editor()
    }

    pub fn text(&self) -> String {
        self.editor().snapshot().plain_text()
    }

    pub fn change_count(&self) -> usize {
        self.changes.borrow().len()
    }

    pub fn last_change(&self) -> Option<DocumentSnapshot> {
        self.changes.borrow().last().cloned()
    }

    pub fn count_events(&self, predicate: impl Fn(&SyncEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|event| predicate(event)).count()
    }

    pub fn reconciliations(&self) -> usize {
        self.count_events(|event| matches!(event, SyncEvent::ReconciliationApplied { .. }))
    }

    /// Simulate typing at the end of the first text run, creating one if needed.
    pub fn type_text(&self, text: &str) {
        self.editor().update(&[], |tree| match tree.first_text() {
            Some(key) => tree.insert_text(key, text).unwrap(),
            None => {
                let paragraph = tree.create_paragraph();
                let run = tree.create_text("");
                tree.append(paragraph, run).unwrap();
                tree.append_to_root(paragraph).unwrap();
                tree.insert_text(run, text).unwrap();
            }
        });
    }

    /// Hand the last emitted snapshot back to the engine, as an owner re-rendering would.
    pub fn echo_last_change(&self) {
        self.sync.set_external_value(self.last_change());
    }

    pub fn settle(&self) {
        self.queue.run_until_idle();
    }
}

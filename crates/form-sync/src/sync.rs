//! Keeps a [`FormState`] and a [`ResumeStore`] consistent in both directions.
//!
//! Form edits are forwarded to the store as partial updates limited to the edited
//! field's group. Replacements of the stored resume (undo, redo, loads) reset the
//! form, unless the new resume is just the echo of a form edit.

use crate::entity::{Resume, form_defaults};
use crate::form::{ChangeKind, FieldChange, FormState, Result};
use crate::groups::{SectionGroup, read_document};
use crate::store::ResumeStore;
use richtext_sync::change;
use richtext_sync::{
    DocumentSnapshot, HostEditor, RichTextSync, Scheduler, Subscription, SyncOptions,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, warn};

struct FormSyncInner {
    form: Rc<FormState>,
    store: Rc<ResumeStore>,
    previous: RefCell<Resume>,
    resetting: Cell<bool>,
}

pub struct FormSync {
    inner: Rc<FormSyncInner>,
    _form_watch: Subscription,
    _store_watch: Subscription,
}

impl FormSync {
    /// Load the store's resume into `form` and start syncing.
    pub fn bind(form: Rc<FormState>, store: Rc<ResumeStore>) -> Result<Self> {
        let resume = store.resume();
        form.reset(form_defaults(&resume)?);

        let inner = Rc::new(FormSyncInner {
            form,
            store,
            previous: RefCell::new(resume),
            resetting: Cell::new(false),
        });

        let weak = Rc::downgrade(&inner);
        let form_watch = inner.form.watch(move |change| {
            if let Some(inner) = weak.upgrade() {
                inner.on_field_change(change);
            }
        });

        let weak = Rc::downgrade(&inner);
        let store_watch = inner.store.subscribe(move |resume| {
            if let Some(inner) = weak.upgrade() {
                inner.on_resume_replaced(resume);
            }
        });

        Ok(Self {
            inner,
            _form_watch: form_watch,
            _store_watch: store_watch,
        })
    }

    pub fn form(&self) -> &Rc<FormState> {
        &self.inner.form
    }

    pub fn store(&self) -> &Rc<ResumeStore> {
        &self.inner.store
    }
}

impl FormSyncInner {
    fn on_field_change(&self, change: &FieldChange) {
        if change.kind != ChangeKind::Change || self.resetting.get() {
            return;
        }
        let Some(name) = &change.name else {
            return;
        };
        let Some(group) = SectionGroup::from_path(name) else {
            debug!("Field {} belongs to no group", name);
            return;
        };

        match group.patch(&self.form.get_values()) {
            Ok(patch) => {
                self.store.update(&patch);
            }
            Err(e) => warn!("Not forwarding {:?} edit to {}: {}", group, name, e),
        }
    }

    fn on_resume_replaced(&self, resume: &Resume) {
        if change::deep_equal(&*self.previous.borrow(), resume) {
            return;
        }

        let defaults = match form_defaults(resume) {
            Ok(defaults) => defaults,
            Err(e) => {
                warn!("Cannot derive form values from resume: {}", e);
                return;
            }
        };

        if change::deep_equal(&defaults, &self.form.get_values()) {
            debug!("Resume replacement is the echo of a form edit");
            *self.previous.borrow_mut() = resume.clone();
            return;
        }

        debug!("Resetting form from replaced resume");
        *self.previous.borrow_mut() = resume.clone();
        self.resetting.set(true);
        self.form.reset(defaults);
        self.resetting.set(false);
    }
}

/// A rich-text editor bound to one form field holding a document snapshot.
///
/// Editor edits are written to the field. Changes to the field from anywhere else
/// (resets, other writers) are reconciled into the editor.
pub struct RichTextField {
    path: String,
    sync: Rc<RichTextSync>,
    _watch: Subscription,
}

impl RichTextField {
    pub fn bind(
        form: &Rc<FormState>,
        path: &str,
        editor: Rc<HostEditor>,
        scheduler: Rc<dyn Scheduler>,
        options: SyncOptions,
    ) -> Self {
        let initial_value = field_snapshot(form, path);

        let weak_form = Rc::downgrade(form);
        let field_path = path.to_string();
        let sync = Rc::new(RichTextSync::mount(
            editor,
            scheduler,
            SyncOptions {
                initial_value,
                ..options
            },
            move |snapshot| {
                let Some(form) = weak_form.upgrade() else {
                    return;
                };
                let result = snapshot.to_value().map_err(|e| e.to_string()).and_then(|value| {
                    form.set_value(&field_path, value).map_err(|e| e.to_string())
                });
                if let Err(e) = result {
                    warn!("Failed to write editor content to {}: {}", field_path, e);
                }
            },
        ));

        let weak_form = Rc::downgrade(form);
        let weak_sync = Rc::downgrade(&sync);
        let field_path = path.to_string();
        let watch = form.watch(move |change| {
            if !change.affects(&field_path) {
                return;
            }
            if let (Some(form), Some(sync)) = (weak_form.upgrade(), weak_sync.upgrade()) {
                sync.set_external_value(field_snapshot(&form, &field_path));
            }
        });

        Self {
            path: path.to_string(),
            sync,
            _watch: watch,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn sync(&self) -> &RichTextSync {
        &self.sync
    }

    pub fn editor(&self) -> &Rc<HostEditor> {
        self.sync.editor()
    }
}

/// The snapshot stored at `path`.
fn field_snapshot(form: &FormState, path: &str) -> Option<DocumentSnapshot> {
    read_document(path, form.get_value(path).as_ref())
}

//! ResumeStore: the externally owned resume, with undo/redo.

use crate::entity::Resume;
use crate::groups::ResumePatch;
use richtext_sync::change;
use richtext_sync::{EventBus, Subscription};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub struct ResumeStore {
    current: RefCell<Resume>,
    /// Oldest entry at the front, dropped first once the limit is reached.
    undo_stack: RefCell<VecDeque<Resume>>,
    redo_stack: RefCell<Vec<Resume>>,
    replaced: Rc<EventBus<Resume>>,
    history_limit: usize,
}

impl ResumeStore {
    pub const DEFAULT_HISTORY_LIMIT: usize = 100;

    pub fn new(resume: Resume) -> Self {
        Self {
            current: RefCell::new(resume),
            undo_stack: RefCell::new(VecDeque::new()),
            redo_stack: RefCell::new(Vec::new()),
            replaced: Rc::new(EventBus::new()),
            history_limit: Self::DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn resume(&self) -> Resume {
        self.current.borrow().clone()
    }

    /// Merge `patch` into the current resume. Returns whether anything changed.
    pub fn update(&self, patch: &ResumePatch) -> bool {
        if patch.is_empty() {
            return false;
        }
        let mut next = self.resume();
        patch.apply(&mut next);
        self.commit(next)
    }

    /// Replace the whole resume, recording history.
    pub fn set_resume(&self, resume: Resume) -> bool {
        self.commit(resume)
    }

    fn commit(&self, next: Resume) -> bool {
        if change::deep_equal(&*self.current.borrow(), &next) {
            debug!("Resume update changed nothing");
            return false;
        }
        let previous = self.current.replace(next.clone());
        {
            let mut undo = self.undo_stack.borrow_mut();
            undo.push_back(previous);
            while undo.len() > self.history_limit {
                undo.pop_front();
            }
        }
        self.redo_stack.borrow_mut().clear();
        self.replaced.emit(&next);
        true
    }

    pub fn undo(&self) -> Result<()> {
        let previous = self
            .undo_stack
            .borrow_mut()
            .pop_back()
            .ok_or(StoreError::NothingToUndo)?;
        let current = self.current.replace(previous.clone());
        self.redo_stack.borrow_mut().push(current);
        debug!("Undo: {} steps left", self.undo_stack.borrow().len());
        self.replaced.emit(&previous);
        Ok(())
    }

    pub fn redo(&self) -> Result<()> {
        let next = self
            .redo_stack
            .borrow_mut()
            .pop()
            .ok_or(StoreError::NothingToRedo)?;
        let current = self.current.replace(next.clone());
        self.undo_stack.borrow_mut().push_back(current);
        debug!("Redo: {} steps left", self.redo_stack.borrow().len());
        self.replaced.emit(&next);
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.borrow().is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.borrow().is_empty()
    }

    /// Called with the new resume after every replacement, including undo and redo.
    pub fn subscribe(&self, callback: impl Fn(&Resume) + 'static) -> Subscription {
        self.replaced.subscribe(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn named(first_name: &str) -> ResumePatch {
        ResumePatch {
            first_name: Some(first_name.into()),
            ..ResumePatch::default()
        }
    }

    #[test]
    fn test_update_undo_redo() {
        let store = ResumeStore::new(Resume::default_resume());
        assert!(store.update(&named("Ada")));
        assert!(store.update(&named("Grace")));

        store.undo().unwrap();
        assert_eq!(store.resume().first_name, "Ada");
        store.undo().unwrap();
        assert_eq!(store.resume().first_name, "");
        assert_eq!(store.undo(), Err(StoreError::NothingToUndo));

        store.redo().unwrap();
        assert_eq!(store.resume().first_name, "Ada");
        assert!(store.can_redo());

        store.update(&named("Barbara"));
        assert!(!store.can_redo());
        assert_eq!(store.redo(), Err(StoreError::NothingToRedo));
    }

    #[test]
    fn test_noop_updates_are_not_recorded() {
        let store = ResumeStore::new(Resume::default_resume());
        let notified = Rc::new(Cell::new(0));
        let notified_clone = Rc::clone(&notified);
        let _sub = store.subscribe(move |_| notified_clone.set(notified_clone.get() + 1));

        assert!(!store.update(&ResumePatch::default()));
        assert!(!store.update(&named("")));
        assert!(!store.can_undo());
        assert_eq!(notified.get(), 0);

        store.update(&named("Ada"));
        store.undo().unwrap();
        store.redo().unwrap();
        assert_eq!(notified.get(), 3);
    }

    #[test]
    fn test_history_limit() {
        let store = ResumeStore::new(Resume::default_resume()).with_history_limit(2);
        for name in ["a", "b", "c", "d"] {
            store.update(&named(name));
        }
        store.undo().unwrap();
        store.undo().unwrap();
        assert_eq!(store.resume().first_name, "b");
        assert!(!store.can_undo());

        // Redoing back to the top refills history without exceeding the limit.
        store.redo().unwrap();
        store.redo().unwrap();
        assert_eq!(store.resume().first_name, "d");
        store.update(&named("e"));
        store.undo().unwrap();
        store.undo().unwrap();
        assert_eq!(store.resume().first_name, "c");
        assert!(!store.can_undo());
    }
}

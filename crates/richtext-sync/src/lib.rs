//! richtext-sync: keeps a rich-text editor's live tree consistent with an
//! externally owned, serialized snapshot of the same document.
//!
//! This crate provides:
//! - The snapshot model and its Lexical-style JSON encoding (`node`)
//! - Semantic snapshot equality (`change`)
//! - A host editor with transactional updates and update listeners (`host`)
//! - Reconstruction of the live tree from a snapshot with graceful fallbacks (`reconstruct`)
//! - The loop-free sync controller (`controller`) and next-tick scheduling (`scheduler`)
//! - Diagnostics events and the subscription bus they are published on (`events`)
//! - Engine configuration from defaults, the environment, or JSON (`config`)

pub mod change;
pub mod config;
pub mod controller;
pub mod events;
pub mod host;
pub mod node;
pub mod reconstruct;
pub mod scheduler;

pub use config::{ConfigError, SyncConfig};
pub use controller::{RichTextSync, SyncOptions, SyncPhase};
pub use events::{EventBus, Subscription, SyncEvent};
pub use host::{EXTERNAL_SYNC_TAG, EditorUpdate, HostEditor, LiveTree, NodeKey, TreeError};
pub use node::{DocumentNode, DocumentSnapshot, SnapshotError, SnapshotNode};
pub use reconstruct::{NodeReconstructor, RebuildReport};
pub use scheduler::{LocalTaskScheduler, Scheduler, TickQueue};

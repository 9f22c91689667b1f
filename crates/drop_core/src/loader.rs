//! Seam to the asynchronous model loader.
//!
//! Loads are fire-and-forget: the core hands a [`LoadRequest`] to a
//! [`ModelLoader`] and later receives a [`LoadCompletion`] through the
//! [`LoadInbox`] it drains at the start of each frame. Completions may arrive in
//! any order relative to each other; the ticket on each one lets the attachment
//! arbiter tell the current load from superseded ones.

use std::fmt;

use bevy::prelude::Resource;

use crate::attachment::ModelSlot;
use crate::scene::TransformId;

/// Monotonically increasing id of a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub ticket: LoadTicket,
    pub slot: ModelSlot,
    pub path: String,
}

/// A loaded model, rooted at a render transform.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModel {
    pub scene: TransformId,
    /// Loader-specific identity, usually the asset path
    pub identity: String,
}

/// Loader-side failure, reported upstream and never retried by the core.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadError {
    pub path: String,
    pub reason: String,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to load '{}': {}", self.path, self.reason)
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadCompletion {
    pub ticket: LoadTicket,
    pub slot: ModelSlot,
    pub result: Result<LoadedModel, LoadError>,
}

/// Anything that can start a model load.
pub trait ModelLoader {
    fn load(&mut self, request: LoadRequest);
}

/// Loader that only queues requests; the render side dispatches them.
#[derive(Resource, Debug, Default)]
pub struct LoadQueue {
    requests: Vec<LoadRequest>,
}

impl LoadQueue {
    pub fn drain(&mut self) -> std::vec::Drain<'_, LoadRequest> {
        self.requests.drain(..)
    }

    pub fn pending(&self) -> &[LoadRequest] {
        &self.requests
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl ModelLoader for LoadQueue {
    fn load(&mut self, request: LoadRequest) {
        self.requests.push(request);
    }
}

/// Sending half handed to whatever resolves loads.
#[derive(Debug, Clone)]
pub struct LoadSender(async_channel::Sender<LoadCompletion>);

impl LoadSender {
    /// Deliver a completion. Returns false once the inbox is gone.
    pub fn complete(&self, completion: LoadCompletion) -> bool {
        self.0.try_send(completion).is_ok()
    }
}

/// Receiving half, drained by the controller inside the frame.
#[derive(Debug)]
pub struct LoadInbox(async_channel::Receiver<LoadCompletion>);

impl LoadInbox {
    pub fn drain(&self) -> Vec<LoadCompletion> {
        std::iter::from_fn(|| self.0.try_recv().ok()).collect()
    }
}

pub fn load_channel() -> (LoadSender, LoadInbox) {
    let (tx, rx) = async_channel::unbounded();
    (LoadSender(tx), LoadInbox(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbox_preserves_delivery_order() {
        let (sender, inbox) = load_channel();
        for ticket in [3, 1, 2] {
            assert!(sender.complete(LoadCompletion {
                ticket: LoadTicket(ticket),
                slot: ModelSlot::A,
                result: Err(LoadError {
                    path: "models/a.glb".into(),
                    reason: "missing".into(),
                }),
            }));
        }

        let tickets: Vec<_> = inbox.drain().iter().map(|c| c.ticket.0).collect();
        assert_eq!(tickets, vec![3, 1, 2]);
        assert!(inbox.drain().is_empty());
    }

    #[test]
    fn test_sender_reports_closed_inbox() {
        let (sender, inbox) = load_channel();
        drop(inbox);
        assert!(!sender.complete(LoadCompletion {
            ticket: LoadTicket(0),
            slot: ModelSlot::B,
            result: Err(LoadError {
                path: String::new(),
                reason: String::new(),
            }),
        }));
    }

    #[test]
    fn test_queue_collects_requests() {
        let mut queue = LoadQueue::default();
        queue.load(LoadRequest {
            ticket: LoadTicket(7),
            slot: ModelSlot::C,
            path: "models/c.glb".into(),
        });
        assert_eq!(queue.pending().len(), 1);
        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(drained[0].ticket, LoadTicket(7));
        assert!(queue.is_empty());
    }
}

//! Hooks: named subscriptions that own a fence and a writer.
//!
//! A [`HookSet`] is what the write path talks to. Each mutation is offered to
//! every hook watching the mutated collection and the resulting messages come
//! back tagged with the hook that produced them, in registration order.

use crate::error::{FenceError, Result};
use crate::event::MutationEvent;
use crate::fence::{Fence, Meta, detect_and_emit};
use crate::scan::ScanWriter;
use crate::store::Collaborators;

/// One message produced for one hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub hook: String,
    pub message: String,
}

#[derive(Debug)]
pub struct Hook {
    name: String,
    metas: Vec<Meta>,
    writer: ScanWriter,
    fence: Fence,
}

impl Hook {
    pub fn new(name: impl Into<String>, fence: Fence, writer: ScanWriter) -> Self {
        Self {
            name: name.into(),
            metas: Vec::new(),
            writer,
            fence,
        }
    }

    pub fn with_meta(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metas.push(Meta::new(name, value));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metas(&self) -> &[Meta] {
        &self.metas
    }

    pub fn fence(&self) -> &Fence {
        &self.fence
    }

    /// Messages for `event`, in delivery order.
    pub fn notify(&mut self, event: &MutationEvent, ctx: &Collaborators<'_>) -> Vec<String> {
        detect_and_emit(
            &self.name,
            &self.writer,
            &mut self.fence,
            &self.metas,
            event,
            ctx,
        )
    }
}

/// Hooks in registration order.
#[derive(Debug, Default)]
pub struct HookSet {
    hooks: Vec<Hook>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. Names are unique within a set.
    pub fn add(&mut self, hook: Hook) -> Result<()> {
        if hook.name.is_empty() {
            return Err(FenceError::InvalidInput("hook name cannot be empty".into()));
        }
        if self.get(&hook.name).is_some() {
            return Err(FenceError::InvalidInput(format!(
                "hook '{}' already exists",
                hook.name
            )));
        }
        log::debug!(
            "registered hook '{}' on collection '{}'",
            hook.name,
            hook.fence.spec().key
        );
        self.hooks.push(hook);
        Ok(())
    }

    /// Unregister a hook, discarding its fence state.
    pub fn remove(&mut self, name: &str) -> Option<Hook> {
        let position = self.hooks.iter().position(|hook| hook.name == name)?;
        Some(self.hooks.remove(position))
    }

    pub fn get(&self, name: &str) -> Option<&Hook> {
        self.hooks.iter().find(|hook| hook.name == name)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Offer `event` to every hook watching `event.key`.
    pub fn notify(&mut self, event: &MutationEvent, ctx: &Collaborators<'_>) -> Vec<Notification> {
        let mut notifications = Vec::new();
        for hook in self
            .hooks
            .iter_mut()
            .filter(|hook| hook.fence.spec().key == event.key)
        {
            for message in hook.notify(event, ctx) {
                notifications.push(Notification {
                    hook: hook.name.clone(),
                    message,
                });
            }
        }
        notifications
    }
}

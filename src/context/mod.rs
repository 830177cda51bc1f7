//! Per-unit-of-work context — the submission handle plus type-safe state
//! injection for everything else the host wants to thread through.
//!
//! The host runtime builds one [`Context`] per unit of work (one inbound
//! request, one job, one message) and passes it by reference through the
//! handling code. The background-task handle is an explicit field on the
//! context rather than an entry in some dynamically-keyed map, so
//! collaborators reach it as `ctx.tasks()` with no downcasting.
//!
//! Dropping the context marks the unit of work as finished: its submission
//! handle seals, and tasks already admitted carry on under the pool's
//! lifetime.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use crate::scheduler::BackgroundTasks;

/// Type-erased extensions map — used to inject per-unit state into handling
/// code without requiring collaborators to know about each other's types.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Create a new empty extensions map
    pub fn new() -> Self {
        return Self {
            map: HashMap::new(),
        };
    }

    /// Insert a value into the extensions map
    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.map.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a value from the extensions map
    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Get a mutable reference to a value from the extensions map
    pub fn get_mut<T>(&mut self) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Remove a value from the extensions map
    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

/// Per-unit-of-work context carrying the background-task handle.
pub struct Context {
    tasks: BackgroundTasks,
    extensions: Extensions,
}

impl Context {
    /// Create a new context around a submission handle
    pub fn new(tasks: BackgroundTasks) -> Self {
        return Self {
            tasks,
            extensions: Extensions::new(),
        };
    }

    /// The submission handle for this unit of work.
    ///
    /// Collaborators may clone it, but every clone seals when the context is
    /// dropped.
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

impl Drop for Context {
    // The unit of work is over once its context goes away; no further
    // submissions are accepted through this handle or its clones.
    fn drop(&mut self) {
        self.tasks.seal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{Admission, Admitted};
    use crate::scheduler::ScheduleError;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn context() -> (Context, UnboundedReceiver<Admitted>) {
        let (admission, rx) = Admission::bounded(4);
        let ctx = Context::new(BackgroundTasks::new(Arc::new(admission)));
        (ctx, rx)
    }

    // ── Extensions ────────────────────────────────────────────────────────────

    #[test]
    fn extensions_insert_and_get() {
        let mut ext = Extensions::new();
        ext.insert(7_u32);
        ext.insert(String::from("hello"));

        assert_eq!(ext.get::<u32>(), Some(&7));
        assert_eq!(ext.get::<String>(), Some(&String::from("hello")));
        assert_eq!(ext.get::<i64>(), None);
    }

    #[test]
    fn extensions_get_mut_and_remove() {
        let mut ext = Extensions::new();
        ext.insert(1_u32);

        *ext.get_mut::<u32>().unwrap() += 1;
        assert_eq!(ext.remove::<u32>(), Some(2));
        assert_eq!(ext.get::<u32>(), None);
    }

    // ── Context ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn tasks_are_submittable_while_context_lives() {
        let (ctx, _rx) = context();
        ctx.tasks().submit_no_wait(async {}).unwrap();
    }

    #[tokio::test]
    async fn dropping_context_seals_cloned_handles() {
        let (ctx, _rx) = context();
        let handle = ctx.tasks().clone();
        drop(ctx);

        assert!(matches!(
            handle.submit_no_wait(async {}).unwrap_err(),
            ScheduleError::UnitFinished
        ));
        assert!(matches!(
            handle.submit(async {}).await.unwrap_err(),
            ScheduleError::UnitFinished
        ));
    }

    #[tokio::test]
    async fn context_state_rides_alongside_the_handle() {
        let (mut ctx, _rx) = context();
        ctx.extensions_mut().insert("trace-id-1234".to_string());
        assert_eq!(
            ctx.extensions().get::<String>().map(String::as_str),
            Some("trace-id-1234")
        );
    }
}

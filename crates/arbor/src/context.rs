//! The context: the component bag threaded through every traversal call.
//!
//! The hot components (system handle, data traversal, event traversal,
//! timing) are plain fields, so access is a field projection and absence is
//! unrepresentable. Everything else lives in a type-keyed bag with
//! runtime-checked lookup, which is how hosts extend the context.

use std::any::{Any, TypeId};
use std::rc::Rc;

use ahash::HashMap;

use crate::Flow;
use crate::graph::DataTraversal;
use crate::routing::EventTraversal;
use crate::system::SystemHandle;
use crate::timing::Timing;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ComponentError {
    #[error("context component not found: {0}")]
    NotFound(&'static str),
}

/// The per-traversal context.
pub struct Context {
    system: SystemHandle,
    data: DataTraversal,
    event: EventTraversal,
    timing: Timing,
    components: HashMap<TypeId, Rc<dyn Any>>,
}

impl Context {
    pub(crate) fn new(
        system: SystemHandle,
        data: DataTraversal,
        event: EventTraversal,
        timing: Timing,
    ) -> Self {
        Self {
            system,
            data,
            event,
            timing,
            components: HashMap::default(),
        }
    }

    pub(crate) fn into_data(self) -> DataTraversal {
        self.data
    }

    #[inline]
    pub fn system(&self) -> &SystemHandle {
        &self.system
    }

    #[inline]
    pub fn data(&self) -> &DataTraversal {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut DataTraversal {
        &mut self.data
    }

    #[inline]
    pub fn event(&self) -> &EventTraversal {
        &self.event
    }

    #[inline]
    pub fn event_mut(&mut self) -> &mut EventTraversal {
        &mut self.event
    }

    #[inline]
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Add (or replace) a host component, returning the previous binding.
    pub fn add<T: 'static>(&mut self, component: Rc<T>) -> Option<Rc<dyn Any>> {
        self.components
            .insert(TypeId::of::<T>(), component as Rc<dyn Any>)
    }

    pub fn remove<T: 'static>(&mut self) -> Option<Rc<dyn Any>> {
        self.components.remove(&TypeId::of::<T>())
    }

    pub fn has<T: 'static>(&self) -> bool {
        self.components.contains_key(&TypeId::of::<T>())
    }

    /// Fetch a host component, asserting its presence.
    ///
    /// This is the statically-checked flavor: absence is a programming error
    /// and fails hard. Use [`Self::try_get`] for the runtime-checked flavor.
    pub fn get<T: 'static>(&self) -> Rc<T> {
        match self.try_get::<T>() {
            Ok(component) => component,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fetch a host component, reporting absence as an error.
    pub fn try_get<T: 'static>(&self) -> Result<Rc<T>, ComponentError> {
        let component = self
            .components
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or(ComponentError::NotFound(std::any::type_name::<T>()))?;
        // Keyed by type id, so the downcast cannot fail.
        Ok(component
            .downcast::<T>()
            .unwrap_or_else(|_| unreachable!("component stored under foreign type id")))
    }
}

/// Run `f` with `component` bound in the context, restoring the previous
/// binding (if any) afterwards.
pub fn with_component<T: 'static, R>(
    ctx: &mut Context,
    component: Rc<T>,
    f: impl FnOnce(&mut Context) -> Flow<R>,
) -> Flow<R> {
    let previous = ctx.add(component);
    let result = f(ctx);
    match previous {
        Some(previous) => {
            ctx.components.insert(TypeId::of::<T>(), previous);
        }
        None => {
            ctx.remove::<T>();
        }
    }
    result
}

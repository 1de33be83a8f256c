//! Control-flow wrappers: the hooks that keep the data graph aligned with
//! the controller's branching structure.
//!
//! Each wrapper gives a syntactic construct (branch, switch case, loop
//! iteration) its own child data block, so that state attached inside it
//! stays put no matter which way the surrounding control flow goes.

use std::cell::RefCell;
use std::rc::Rc;

use crate::Flow;
use crate::context::Context;
use crate::graph::DataBlock;
use crate::id::{IdValue, ValueId, simple_id};
use crate::signal::ReadSignal;

fn enter_block<R>(
    ctx: &mut Context,
    block: Rc<RefCell<DataBlock>>,
    body: impl FnOnce(&mut Context) -> Flow<R>,
) -> Flow<R> {
    let scope = ctx.data_mut().open_block(block);
    let result = body(ctx);
    ctx.data_mut().close_block(scope, result.is_err());
    result
}

/// Branch on `condition`: `then_body` runs while it reads true, `else_body`
/// while it reads false, neither while it is unavailable.
///
/// Each branch keeps its own data block. The untaken branch's caches are
/// released (during refresh passes); its persistent state survives.
pub fn if_else<C>(
    ctx: &mut Context,
    condition: C,
    then_body: impl FnOnce(&mut Context) -> Flow,
    else_body: impl FnOnce(&mut Context) -> Flow,
) -> Flow
where
    C: ReadSignal<Value = bool>,
{
    let then_block = ctx.data_mut().get_block();
    let else_block = ctx.data_mut().get_block();
    match condition.try_read().map(|taken| *taken) {
        Some(true) => {
            ctx.data().clear_block(&else_block);
            enter_block(ctx, then_block, then_body)
        }
        Some(false) => {
            ctx.data().clear_block(&then_block);
            enter_block(ctx, else_block, else_body)
        }
        None => {
            ctx.data().clear_block(&then_block);
            ctx.data().clear_block(&else_block);
            Ok(())
        }
    }
}

/// [`if_else`] without an else branch.
pub fn when<C>(ctx: &mut Context, condition: C, body: impl FnOnce(&mut Context) -> Flow) -> Flow
where
    C: ReadSignal<Value = bool>,
{
    if_else(ctx, condition, body, |_| Ok(()))
}

/// Open a naming context: a scope in which [`named_block`] identities are
/// resolved, backed by a naming map stored at this call site.
pub fn naming_context<R>(
    ctx: &mut Context,
    body: impl FnOnce(&mut Context) -> Flow<R>,
) -> Flow<R> {
    let scope = ctx.data_mut().open_naming();
    let result = body(ctx);
    ctx.data_mut().close_naming(scope);
    result
}

/// Run `body` inside the data block named `id` in the current naming
/// context. Named blocks reassociate by identity, so they may reorder freely
/// between traversals without losing state.
pub fn named_block<R>(
    ctx: &mut Context,
    id: &ValueId,
    body: impl FnOnce(&mut Context) -> Flow<R>,
) -> Flow<R> {
    let block = ctx.data_mut().acquire_named_block(id);
    enter_block(ctx, block, body)
}

/// Like [`named_block`], but the block is manually owned: it survives losing
/// all of its references (with caches cleared) until [`delete_named_block`].
pub fn named_block_manual<R>(
    ctx: &mut Context,
    id: &ValueId,
    body: impl FnOnce(&mut Context) -> Flow<R>,
) -> Flow<R> {
    let block = ctx.data_mut().acquire_named_block(id);
    ctx.data().set_manual_delete(id, true);
    enter_block(ctx, block, body)
}

/// Drop the current naming context's claim on the block named `id`.
pub fn delete_named_block(ctx: &Context, id: &ValueId) {
    ctx.data().delete_named_block(id);
}

/// Dispatch on a key signal: `body` runs inside a data block named by the
/// key's value, so each case keeps its own state for as long as it remains
/// referenced. Nothing runs while the key is unavailable.
pub fn switch_on<S, K>(
    ctx: &mut Context,
    key: S,
    body: impl FnOnce(&mut Context, &K) -> Flow,
) -> Flow
where
    S: ReadSignal<Value = K>,
    K: IdValue,
{
    naming_context(ctx, |ctx| match key.read_cloned() {
        Some(case) => named_block(ctx, &simple_id(case.clone()), |ctx| body(ctx, &case)),
        None => Ok(()),
    })
}

/// Run `body` once per index in `0..count`, each iteration in its own data
/// block drawn from a pool at this call site.
///
/// After the loop, the caches of the next unused pool block are released,
/// so an iteration count that shrank this pass doesn't leave stale caches
/// behind.
pub fn repeat(
    ctx: &mut Context,
    count: usize,
    mut body: impl FnMut(&mut Context, usize) -> Flow,
) -> Flow {
    let (pool, _) = ctx
        .data_mut()
        .get_data(Vec::<Rc<RefCell<DataBlock>>>::new);
    for index in 0..count {
        let block = {
            let mut pool = pool.borrow_mut();
            while pool.len() <= index {
                pool.push(Rc::new(RefCell::new(DataBlock::default())));
            }
            pool[index].clone()
        };
        enter_block(ctx, block, |ctx| body(ctx, index))?;
    }
    let next = pool.borrow().get(count).cloned();
    if let Some(block) = next {
        ctx.data().clear_block(&block);
    }
    Ok(())
}

/// Iterate `items`, giving each element a named block keyed by `id_of`, so
/// per-element state follows the element across insertions, removals and
/// reorderings.
pub fn for_each<I, T>(
    ctx: &mut Context,
    items: I,
    id_of: impl Fn(&T) -> ValueId,
    mut body: impl FnMut(&mut Context, &T) -> Flow,
) -> Flow
where
    I: IntoIterator<Item = T>,
{
    naming_context(ctx, |ctx| {
        for item in items {
            named_block(ctx, &id_of(&item), |ctx| body(ctx, &item))?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::System;
    use crate::routing::{on_event, on_refresh};
    use crate::signal::{ReadSignal as _, WriteSignal as _, state};

    struct Flip;

    #[test]
    fn untaken_branch_keeps_its_persistent_state() {
        let seen: Rc<std::cell::RefCell<Vec<i32>>> = Rc::new(std::cell::RefCell::new(Vec::new()));

        let probe = seen.clone();
        let mut system = System::new(move |ctx| {
            let flag = state(ctx, || true);
            on_event::<Flip, _>(ctx, |_ctx, _flip| {
                let flipped = !*flag.read();
                flag.write(flipped).unwrap();
                Ok(())
            })?;
            if_else(
                ctx,
                flag.clone(),
                |ctx| {
                    let counter = state(ctx, || 0_i32);
                    on_refresh(ctx, |_ctx| {
                        let next = *counter.read() + 1;
                        counter.write(next).unwrap();
                        probe.borrow_mut().push(next);
                        Ok(())
                    })
                },
                |_ctx| Ok(()),
            )
        });

        system.refresh();
        system.refresh();
        system.dispatch_event(Flip); // branch goes dormant
        system.dispatch_event(Flip); // and comes back
        // The counter resumed where it left off: branch state is persistent,
        // only caches are released while untaken.
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    struct SetMode(&'static str);

    #[test]
    fn switch_cases_are_collected_when_left() {
        let creations = Rc::new(Cell::new(0_usize));

        let created = creations.clone();
        let mut system = System::new(move |ctx| {
            let mode = state(ctx, || "a");
            switch_on(ctx, mode.clone(), |ctx, case| {
                if *case == "a" {
                    let _ = state(ctx, || {
                        created.set(created.get() + 1);
                    });
                }
                Ok(())
            })?;
            on_event::<SetMode, _>(ctx, |_ctx, event| {
                mode.write(event.0).unwrap();
                Ok(())
            })
        });

        system.refresh();
        assert_eq!(creations.get(), 1);
        // Leaving case "a" lets its named block go; returning recreates it.
        system.dispatch_event(SetMode("b"));
        system.dispatch_event(SetMode("a"));
        assert_eq!(creations.get(), 2);
    }

    struct SetCount(usize);

    #[test]
    fn loop_iterations_keep_positional_state() {
        let creations = Rc::new(Cell::new(0_usize));

        let created = creations.clone();
        let mut system = System::new(move |ctx| {
            let count = state(ctx, || 3_usize);
            repeat(ctx, *count.read(), |ctx, index| {
                let slot = state(ctx, || {
                    created.set(created.get() + 1);
                    index * 10
                });
                assert_eq!(*slot.read(), index * 10);
                Ok(())
            })?;
            on_event::<SetCount, _>(ctx, |_ctx, event| {
                count.write(event.0).unwrap();
                Ok(())
            })
        });

        system.refresh();
        assert_eq!(creations.get(), 3);
        // Shrinking and regrowing reuses the pooled per-iteration blocks.
        system.dispatch_event(SetCount(1));
        system.dispatch_event(SetCount(3));
        assert_eq!(creations.get(), 3);
    }
}

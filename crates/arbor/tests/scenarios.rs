//! End-to-end scenarios: a whole system, a controller, and events pumped
//! through it.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use itertools::Itertools as _;

use arbor::action::{Action as _, increment};
use arbor::routing::{make_routable, on_event, on_refresh, on_targeted_event, routing_region};
use arbor::signal::{
    AsyncReporter, AsyncStatus, ReadSignal, WriteSignal, add_fallback, apply, async_apply, empty,
    has_value_signal, mask, state, value,
};
use arbor::{RoutableNodeId, System, ValueId, simple_id};

struct Click;

#[test]
fn s1_counter_counts_clicks_and_changes_identity() {
    let _ = env_logger::builder().is_test(true).try_init();
    let refreshes: Rc<RefCell<Vec<(i32, ValueId)>>> = Rc::new(RefCell::new(Vec::new()));

    let probe = refreshes.clone();
    let mut system = System::new(move |ctx| {
        let n = state(ctx, || 0_i32);
        on_refresh(ctx, |_ctx| {
            probe
                .borrow_mut()
                .push((n.read_cloned().unwrap(), n.value_id()));
            Ok(())
        })?;
        on_event::<Click, _>(ctx, |_ctx, _click| {
            increment(n.clone(), 1).perform(&mut || {}, ());
            Ok(())
        })?;
        Ok(())
    });

    system.refresh();
    for _ in 0..5 {
        system.dispatch_event(Click);
    }

    let refreshes = refreshes.borrow();
    let values: Vec<i32> = refreshes.iter().map(|(value, _)| *value).collect();
    assert_eq!(values, vec![0, 1, 2, 3, 4, 5]);
    // The identity differs between each of the six refreshes.
    for ((_, a), (_, b)) in refreshes.iter().tuple_combinations() {
        assert_ne!(a, b);
    }
}

struct Touch;
struct SetN(i32);

#[test]
fn s2_apply_memoizes_until_the_input_changes() {
    let invocations = Rc::new(Cell::new(0_u32));
    let refreshes: Rc<RefCell<Vec<(i32, ValueId)>>> = Rc::new(RefCell::new(Vec::new()));

    let counter = invocations.clone();
    let probe = refreshes.clone();
    let mut system = System::new(move |ctx| {
        let n = state(ctx, || 3_i32);
        let squared = apply(
            ctx,
            |v: &i32| {
                counter.set(counter.get() + 1);
                v * v
            },
            n.clone(),
        );
        on_refresh(ctx, |_ctx| {
            probe
                .borrow_mut()
                .push((squared.read_cloned().unwrap(), squared.value_id()));
            Ok(())
        })?;
        on_event::<SetN, _>(ctx, |_ctx, event| {
            n.write(event.0).unwrap();
            Ok(())
        })?;
        Ok(())
    });

    system.refresh();
    assert_eq!(invocations.get(), 1);
    assert_eq!(refreshes.borrow().last().unwrap().0, 9);

    // An event that doesn't touch the input: no recomputation, same version.
    system.dispatch_event(Touch);
    assert_eq!(invocations.get(), 1);
    {
        let refreshes = refreshes.borrow();
        let (result, id) = &refreshes[1];
        assert_eq!(*result, 9);
        assert_eq!(*id, refreshes[0].1);
    }

    // Changing the input recomputes exactly once and bumps the version.
    system.dispatch_event(SetN(4));
    assert_eq!(invocations.get(), 2);
    {
        let refreshes = refreshes.borrow();
        let (result, id) = refreshes.last().unwrap();
        assert_eq!(*result, 16);
        assert_ne!(*id, refreshes[0].1);
    }
}

struct SetOrder(Vec<String>);

#[test]
fn s3_named_block_state_follows_reordered_elements() {
    let creations = Rc::new(Cell::new(0_usize));
    let seen: Rc<RefCell<Vec<(String, String)>>> = Rc::new(RefCell::new(Vec::new()));

    let created = creations.clone();
    let probe = seen.clone();
    let mut system = System::new(move |ctx| {
        let order = state(ctx, || {
            vec!["a".to_owned(), "b".to_owned(), "c".to_owned()]
        });
        let items = order.read_cloned().unwrap();
        arbor::control::for_each(
            ctx,
            items,
            |item| simple_id(item.clone()),
            |ctx, item| {
                let per_item = state(ctx, || {
                    created.set(created.get() + 1);
                    format!("state-of-{item}")
                });
                if ctx.event().is_refresh() {
                    probe
                        .borrow_mut()
                        .push((item.clone(), per_item.read_cloned().unwrap()));
                }
                Ok(())
            },
        )?;
        // The handler sits after the loop: the pass that delivers the event
        // still traverses the old order, and the trailing refresh (with GC
        // enabled) picks up the new one.
        on_event::<SetOrder, _>(ctx, |_ctx, event| {
            order.write(event.0.clone()).unwrap();
            Ok(())
        })
    });

    system.refresh();
    assert_eq!(creations.get(), 3);

    seen.borrow_mut().clear();
    system.dispatch_event(SetOrder(vec![
        "c".to_owned(),
        "a".to_owned(),
        "b".to_owned(),
    ]));

    // All three blocks were re-referenced in the new order, none recreated.
    assert_eq!(creations.get(), 3);
    assert_eq!(
        *seen.borrow(),
        vec![
            ("c".to_owned(), "state-of-c".to_owned()),
            ("a".to_owned(), "state-of-a".to_owned()),
            ("b".to_owned(), "state-of-b".to_owned()),
        ]
    );
}

#[test]
fn s4_fallback_and_mask() {
    let with_fallback = add_fallback(empty::<i32>(), value(7));
    assert_eq!(has_value_signal(&with_fallback).read_cloned(), Some(true));
    assert_eq!(with_fallback.read_cloned(), Some(7));

    let masked = mask(value(5), value(false));
    assert!(!masked.has_value());
    assert!(masked.value_id().is_null());
}

struct Poke;

#[test]
fn s5_targeted_events_prune_sibling_regions() {
    let probe: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let targets: Rc<RefCell<HashMap<&'static str, RoutableNodeId>>> =
        Rc::new(RefCell::new(HashMap::new()));

    let log = probe.clone();
    let registry = targets.clone();
    let mut system = System::new(move |ctx| {
        routing_region(ctx, |ctx| {
            if !ctx.event().is_refresh() {
                log.borrow_mut().push("region-1");
            }
            let node = make_routable(ctx, &simple_id("node-1"));
            registry.borrow_mut().insert("node-1", node.clone());
            on_targeted_event::<Poke, _>(ctx, &node, |_ctx, _poke| {
                log.borrow_mut().push("handler-1");
                Ok(())
            })
        })?;
        routing_region(ctx, |ctx| {
            if !ctx.event().is_refresh() {
                log.borrow_mut().push("region-2");
            }
            let node = make_routable(ctx, &simple_id("node-2"));
            registry.borrow_mut().insert("node-2", node.clone());
            on_targeted_event::<Poke, _>(ctx, &node, |_ctx, _poke| {
                log.borrow_mut().push("handler-2");
                Ok(())
            })
        })?;
        if !ctx.event().is_refresh() {
            log.borrow_mut().push("tail");
        }
        Ok(())
    });

    system.refresh();

    // Untargeted: every region runs, no targeted handler fires.
    probe.borrow_mut().clear();
    system.dispatch_event(Poke);
    assert_eq!(*probe.borrow(), vec!["region-1", "region-2", "tail"]);

    // Targeted at node-2: region-1 is pruned, the handler fires exactly
    // once, and the abort skips everything after the target.
    probe.borrow_mut().clear();
    let target = targets.borrow().get("node-2").cloned().unwrap();
    system.dispatch_targeted_event(Poke, &target);
    assert_eq!(*probe.borrow(), vec!["region-2", "handler-2"]);
}

struct SetInput(String);

type PendingLaunches = Rc<RefCell<Vec<(AsyncReporter<String>, String)>>>;

#[test]
fn s6_async_latch_launches_completes_and_restarts() {
    let pending: PendingLaunches = Rc::new(RefCell::new(Vec::new()));
    let statuses: Rc<RefCell<Vec<(AsyncStatus, Option<String>)>>> =
        Rc::new(RefCell::new(Vec::new()));

    let launches = pending.clone();
    let probe = statuses.clone();
    let mut system = System::new(move |ctx| {
        let input = state(ctx, || "job-1".to_owned());
        on_event::<SetInput, _>(ctx, |_ctx, event| {
            input.write(event.0.clone()).unwrap();
            Ok(())
        })?;
        let result = async_apply(
            ctx,
            |reporter, arg: &String| {
                launches.borrow_mut().push((reporter, arg.clone()));
            },
            input.clone(),
        );
        on_refresh(ctx, |_ctx| {
            probe
                .borrow_mut()
                .push((result.status(), result.read_cloned()));
            Ok(())
        })?;
        Ok(())
    });

    // Refresh 1: launched, no value yet.
    system.refresh();
    assert_eq!(
        statuses.borrow().last().unwrap(),
        &(AsyncStatus::Launched, None)
    );

    // The external result arrives; the system wants a refresh.
    {
        let (reporter, arg) = pending.borrow_mut().pop().unwrap();
        reporter.report(format!("{arg} done"));
    }
    assert!(system.refresh_needed());

    // Refresh 2: complete, with the delivered value.
    system.refresh();
    assert_eq!(
        statuses.borrow().last().unwrap(),
        &(AsyncStatus::Complete, Some("job-1 done".to_owned()))
    );

    // Changing the input resets and relaunches with the new argument.
    system.dispatch_event(SetInput("job-2".to_owned()));
    {
        let pending = pending.borrow();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].1, "job-2");
    }
    assert_eq!(statuses.borrow().last().unwrap().0, AsyncStatus::Launched);

    // Supersede that launch before it reports: its eventual report must be
    // discarded as stale.
    system.dispatch_event(SetInput("job-3".to_owned()));
    let (stale_reporter, stale_arg) = pending.borrow_mut().remove(0);
    stale_reporter.report(format!("{stale_arg} done"));
    system.refresh();
    assert_eq!(
        statuses.borrow().last().unwrap(),
        &(AsyncStatus::Launched, None),
        "a superseded launch must not complete the new one"
    );

    let (reporter, arg) = pending.borrow_mut().pop().unwrap();
    reporter.report(format!("{arg} done"));
    system.refresh();
    assert_eq!(
        statuses.borrow().last().unwrap(),
        &(AsyncStatus::Complete, Some("job-3 done".to_owned()))
    );
}

#[test]
fn consecutive_refreshes_are_idempotent() {
    let invocations = Rc::new(Cell::new(0_u32));
    let refreshes: Rc<RefCell<Vec<(i32, ValueId)>>> = Rc::new(RefCell::new(Vec::new()));

    let counter = invocations.clone();
    let probe = refreshes.clone();
    let mut system = System::new(move |ctx| {
        let n = state(ctx, || 21_i32);
        let doubled = apply(
            ctx,
            |v: &i32| {
                counter.set(counter.get() + 1);
                v * 2
            },
            n.clone(),
        );
        on_refresh(ctx, |_ctx| {
            probe
                .borrow_mut()
                .push((doubled.read_cloned().unwrap(), doubled.value_id()));
            Ok(())
        })?;
        Ok(())
    });

    system.refresh();
    system.refresh();

    let refreshes = refreshes.borrow();
    assert_eq!(invocations.get(), 1);
    assert_eq!(refreshes[0], refreshes[1]);
}

struct SetText(String);

#[test]
fn text_views_render_and_validate() {
    let rendered: Rc<RefCell<Vec<Option<String>>>> = Rc::new(RefCell::new(Vec::new()));
    let rejected: Rc<RefCell<Vec<arbor::ValidationError>>> = Rc::new(RefCell::new(Vec::new()));

    let probe = rendered.clone();
    let errors = rejected.clone();
    let mut system = System::new(move |ctx| {
        let n = state(ctx, || 41_i32);
        let text = arbor::text::as_text(ctx, n.clone());
        on_refresh(ctx, |_ctx| {
            probe.borrow_mut().push(text.read_cloned());
            Ok(())
        })?;
        on_event::<SetText, _>(ctx, |_ctx, event| {
            if let Err(err) = text.write(event.0.clone()) {
                errors.borrow_mut().push(err);
            }
            Ok(())
        })?;
        Ok(())
    });

    system.refresh();
    assert_eq!(rendered.borrow().last().unwrap().as_deref(), Some("41"));

    system.dispatch_event(SetText("42".to_owned()));
    assert_eq!(rendered.borrow().last().unwrap().as_deref(), Some("42"));
    assert!(rejected.borrow().is_empty());

    // A malformed write is rejected and the value stands.
    system.dispatch_event(SetText("forty-two".to_owned()));
    assert_eq!(rejected.borrow().len(), 1);
    assert_eq!(rendered.borrow().last().unwrap().as_deref(), Some("42"));
}

#[test]
fn host_components_extend_the_context() {
    struct Theme {
        accent: &'static str,
    }

    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

    let probe = seen.clone();
    let mut system = System::new(move |ctx| {
        assert!(!ctx.has::<Theme>());
        assert!(ctx.try_get::<Theme>().is_err());

        arbor::context::with_component(
            ctx,
            Rc::new(Theme { accent: "teal" }),
            |ctx| {
                let theme = ctx.get::<Theme>();
                probe.borrow_mut().push(theme.accent.to_owned());
                Ok(())
            },
        )?;

        assert!(!ctx.has::<Theme>());
        Ok(())
    });

    system.refresh();
    assert_eq!(*seen.borrow(), vec!["teal".to_owned()]);
}

//! Concurrency tests: one shared Preprocessor, many calling threads.
//!
//! The engine holds no per-call state, so concurrent calls with disjoint
//! events must behave exactly like single-threaded runs, and a rule's
//! exclusive lock must cover only its evaluation window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use rand::Rng;
use serde_json::json;

use fluxgate_engine::{ExclusiveLock, Preprocessor, RouteEntry};
use fluxgate_events::{EvalContext, MapEvent, MapEventCloner, MapFieldWriter, Value};

const WAIT_LIMIT: Duration = Duration::from_secs(5);

fn wait_until(flag: &AtomicBool) {
    let deadline = Instant::now() + WAIT_LIMIT;
    while !flag.load(Ordering::SeqCst) {
        assert!(Instant::now() < deadline, "flag never set");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn concurrent_calls_match_single_threaded_results() {
    // Three rules: double even values, drop negatives, stamp everything
    // that survives. Expected output is computable from the input alone,
    // so any cross-call interference shows up as a wrong field.
    let entries = vec![
        RouteEntry::update(1, MapFieldWriter::single("doubled"))
            .with_guard(|scope: &[&MapEvent], _: &EvalContext| -> Result<Value> {
                Ok(json!(scope[0].get("v").as_i64().unwrap_or(0) % 2 == 0))
            })
            .with_assignment(|scope: &[&MapEvent], _: &EvalContext| -> Result<Value> {
                Ok(json!(scope[0].get("v").as_i64().unwrap_or(0) * 2))
            }),
        RouteEntry::drop_rule(2).with_guard(
            |scope: &[&MapEvent], _: &EvalContext| -> Result<Value> {
                Ok(json!(scope[0].get("v").as_i64().unwrap_or(0) < 0))
            },
        ),
        RouteEntry::update(3, MapFieldWriter::single("seen"))
            .with_assignment(|_: &[&MapEvent], _: &EvalContext| -> Result<Value> {
                Ok(json!(true))
            }),
    ];
    let pre = Arc::new(Preprocessor::new(MapEventCloner, entries));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pre = Arc::clone(&pre);
            thread::spawn(move || {
                let ctx = EvalContext::default();
                let mut rng = rand::thread_rng();
                for _ in 0..200 {
                    let v: i64 = rng.gen_range(-50..50);
                    let event = Arc::new(MapEvent::new("Tick").with_field("v", json!(v)));
                    let result = pre.process(event, &ctx).unwrap();
                    if v < 0 {
                        assert!(result.is_none(), "v={v} should have been dropped");
                        continue;
                    }
                    let out = result.unwrap();
                    assert_eq!(out.get("v"), &json!(v));
                    assert_eq!(out.get("seen"), &json!(true));
                    if v % 2 == 0 {
                        assert_eq!(out.get("doubled"), &json!(v * 2));
                    } else {
                        assert_eq!(out.get("doubled"), &Value::Null);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn lock_free_rule_is_not_blocked_by_a_held_lock() {
    let lock: ExclusiveLock = Arc::new(RwLock::new(()));
    let entered = Arc::new(AtomicBool::new(false));
    let release = Arc::new(AtomicBool::new(false));

    // Rule 1 holds the lock while its evaluation waits on `release`.
    let locked_entry = RouteEntry::update(1, MapFieldWriter::single("out"))
        .with_guard(|scope: &[&MapEvent], _: &EvalContext| -> Result<Value> {
            Ok(json!(scope[0].get("kind") == &json!("locked")))
        })
        .with_exclusive_lock(Arc::clone(&lock))
        .with_assignment({
            let entered = Arc::clone(&entered);
            let release = Arc::clone(&release);
            move |_: &[&MapEvent], _: &EvalContext| -> Result<Value> {
                entered.store(true, Ordering::SeqCst);
                let deadline = Instant::now() + WAIT_LIMIT;
                while !release.load(Ordering::SeqCst) {
                    anyhow::ensure!(Instant::now() < deadline, "never released");
                    thread::sleep(Duration::from_millis(1));
                }
                Ok(json!("locked-result"))
            }
        });

    // Rule 2 shares no lock and must proceed while rule 1 is held up.
    let free_entry = RouteEntry::update(2, MapFieldWriter::single("out"))
        .with_guard(|scope: &[&MapEvent], _: &EvalContext| -> Result<Value> {
            Ok(json!(scope[0].get("kind") == &json!("free")))
        })
        .with_assignment(|_: &[&MapEvent], _: &EvalContext| -> Result<Value> {
            Ok(json!("free-result"))
        });

    let pre = Arc::new(Preprocessor::new(
        MapEventCloner,
        vec![locked_entry, free_entry],
    ));

    let blocked = {
        let pre = Arc::clone(&pre);
        thread::spawn(move || {
            let event = Arc::new(MapEvent::new("Job").with_field("kind", json!("locked")));
            pre.process(event, &EvalContext::default())
        })
    };
    wait_until(&entered);

    // The lock is held right now; a call touching only the lock-free rule
    // must still complete.
    let event = Arc::new(MapEvent::new("Job").with_field("kind", json!("free")));
    let free_result = pre
        .process(event, &EvalContext::default())
        .unwrap()
        .unwrap();
    assert_eq!(free_result.get("out"), &json!("free-result"));
    assert!(!release.load(Ordering::SeqCst));

    release.store(true, Ordering::SeqCst);
    let locked_result = blocked.join().unwrap().unwrap().unwrap();
    assert_eq!(locked_result.get("out"), &json!("locked-result"));
}

#[test]
fn rules_sharing_a_lock_exclude_each_other_during_evaluation() {
    let lock: ExclusiveLock = Arc::new(RwLock::new(()));
    let in_window = Arc::new(AtomicBool::new(false));
    let overlapped = Arc::new(AtomicBool::new(false));

    let entry = RouteEntry::update(1, MapFieldWriter::single("out"))
        .with_exclusive_lock(Arc::clone(&lock))
        .with_assignment({
            let in_window = Arc::clone(&in_window);
            let overlapped = Arc::clone(&overlapped);
            move |scope: &[&MapEvent], _: &EvalContext| -> Result<Value> {
                if in_window.swap(true, Ordering::SeqCst) {
                    overlapped.store(true, Ordering::SeqCst);
                }
                thread::sleep(Duration::from_millis(2));
                in_window.store(false, Ordering::SeqCst);
                Ok(scope[0].get("v").clone())
            }
        });
    let pre = Arc::new(Preprocessor::new(MapEventCloner, vec![entry]));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let pre = Arc::clone(&pre);
            thread::spawn(move || {
                let ctx = EvalContext::default();
                for i in 0..10 {
                    let v = json!(t * 100 + i);
                    let event = Arc::new(MapEvent::new("Job").with_field("v", v.clone()));
                    let out = pre.process(event, &ctx).unwrap().unwrap();
                    assert_eq!(out.get("out"), &v);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(
        !overlapped.load(Ordering::SeqCst),
        "two evaluations ran inside the same lock window"
    );
}

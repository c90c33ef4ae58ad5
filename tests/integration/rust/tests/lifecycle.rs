//! Thread Lifecycle Integration Tests
//!
//! Covers join ordering, liveness monotonicity, condition-wait recursion
//! count restoration, and the consistency of `all_threads` snapshots.

use core_types::{Symbol, Value};
use crossbeam::channel;
use thread_system::{Condition, ReentrantMutex, ThreadError, ThreadRuntime};

/// Test: join returns only after the target is dead and unlinked, and
/// liveness never comes back.
#[test]
fn test_join_ordering_and_liveness() {
    let rt = ThreadRuntime::new();
    let (release_tx, release_rx) = channel::bounded::<()>(1);

    let worker = rt
        .enter(|exec| {
            exec.make_thread(
                move |exec| {
                    exec.run_unlocked(|| release_rx.recv().unwrap())?;
                    Ok(Value::Nil)
                },
                Some("worker"),
            )
            .unwrap()
        })
        .unwrap();

    assert!(rt.enter(|exec| exec.thread_alive(&worker)).unwrap());

    release_tx.send(()).unwrap();
    rt.enter(|exec| {
        exec.thread_join(&worker).unwrap();
        // Join returned: the worker must be gone from the live set in
        // the very same critical section.
        assert!(!exec.thread_alive(&worker));
        assert!(!exec.all_threads().contains(&worker));
    })
    .unwrap();

    // Dead stays dead.
    assert!(!rt.enter(|exec| exec.thread_alive(&worker)).unwrap());
    assert_eq!(worker.name(), Some("worker"));
}

/// Test: condition_wait restores the recursion count it released.
///
/// The main thread holds the mutex three levels deep when it waits; after
/// a notify from a helper it must owe exactly three unlocks again.
#[test]
fn test_condition_wait_restores_recursion_count() {
    let rt = ThreadRuntime::new();
    let mutex = ReentrantMutex::new(None);
    let cond = Condition::new(mutex.clone(), None);

    rt.enter(|exec| {
        exec.mutex_lock(&mutex).unwrap();
        exec.mutex_lock(&mutex).unwrap();
        exec.mutex_lock(&mutex).unwrap();
    })
    .unwrap();

    let m = mutex.clone();
    let c = cond.clone();
    let notifier = rt
        .enter(|exec| {
            exec.make_thread(
                move |exec| {
                    // Blocks until the waiter has fully released the
                    // mutex for its wait.
                    exec.mutex_lock(&m)?;
                    exec.condition_notify(&c, false)?;
                    exec.mutex_unlock(&m)?;
                    Ok(Value::Nil)
                },
                Some("notifier"),
            )
            .unwrap()
        })
        .unwrap();

    rt.enter(|exec| {
        exec.condition_wait(&cond).unwrap();
        assert!(exec.mutex_owned(&mutex));
        exec.mutex_unlock(&mutex).unwrap();
        exec.mutex_unlock(&mutex).unwrap();
        exec.mutex_unlock(&mutex).unwrap();
        assert!(!exec.mutex_owned(&mutex));
        assert!(matches!(
            exec.mutex_unlock(&mutex),
            Err(ThreadError::NotOwned)
        ));
    })
    .unwrap();

    rt.enter(|exec| exec.thread_join(&notifier).unwrap())
        .unwrap();
}

/// Test: an all_threads snapshot never contains a dead thread and never
/// omits a live one, even while threads are exiting concurrently.
#[test]
fn test_all_threads_snapshot_consistency() {
    let rt = ThreadRuntime::new();
    let (release_tx, release_rx) = channel::bounded::<()>(4);

    let mut workers = Vec::new();
    for i in 0..4 {
        let rx = release_rx.clone();
        let worker = rt
            .enter(|exec| {
                exec.make_thread(
                    move |exec| {
                        exec.run_unlocked(|| rx.recv().unwrap())?;
                        Ok(Value::Nil)
                    },
                    Some(&format!("snapshot-{}", i)),
                )
                .unwrap()
            })
            .unwrap();
        workers.push(worker);
    }

    // Let two of the four exit at their own pace.
    release_tx.send(()).unwrap();
    release_tx.send(()).unwrap();

    for _ in 0..50 {
        rt.enter(|exec| {
            let snapshot = exec.all_threads();
            // Within one critical section the snapshot is exact: every
            // handle still reports alive.
            for t in &snapshot {
                assert!(exec.thread_alive(t));
            }
            // Nothing alive is omitted.
            for w in &workers {
                if exec.thread_alive(w) {
                    assert!(snapshot.contains(w));
                }
            }
            assert!(snapshot.contains(&exec.current_thread()));
        })
        .unwrap();
        std::thread::yield_now();
    }

    release_tx.send(()).unwrap();
    release_tx.send(()).unwrap();
    for worker in &workers {
        rt.enter(|exec| exec.thread_join(worker).unwrap()).unwrap();
    }
    let remaining = rt.enter(|exec| exec.all_threads()).unwrap();
    assert_eq!(remaining.len(), 1);
}

/// Test: a spawned thread inherits the spawner's active resource and
/// shares the global variable table.
#[test]
fn test_spawn_inherits_context() {
    let rt = ThreadRuntime::new();
    let (seen_tx, seen_rx) = channel::bounded(1);
    let shared = Symbol::new("shared");

    let var = shared.clone();
    let worker = rt
        .enter(|exec| {
            exec.select_resource(core_types::ResourceId(42));
            exec.set_var(var.clone(), Value::Int(7));
            exec.make_thread(
                move |exec| {
                    seen_tx
                        .send((exec.active_resource(), exec.get_var(&var)))
                        .unwrap();
                    Ok(Value::Nil)
                },
                None,
            )
            .unwrap()
        })
        .unwrap();

    let (resource, value) = seen_rx.recv().unwrap();
    assert_eq!(resource, core_types::ResourceId(42));
    assert_eq!(value, Some(Value::Int(7)));
    rt.enter(|exec| exec.thread_join(&worker).unwrap()).unwrap();

    // The resource-conflict query sees the dead thread's selection gone.
    rt.enter(|exec| {
        assert!(!exec.resource_in_use_elsewhere(core_types::ResourceId(42)));
    })
    .unwrap();
}

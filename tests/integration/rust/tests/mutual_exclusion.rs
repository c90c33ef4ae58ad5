//! Mutual Exclusion Integration Tests
//!
//! Verifies the reentrant-mutex guarantees across real native threads:
//! no two threads inside the same critical section, recursion counts
//! paired exactly, non-owners unable to disturb ownership.

use core_types::{Symbol, Value};
use crossbeam::channel;
use thread_system::{ReentrantMutex, ThreadError, ThreadRuntime};

/// Test: two threads lock/increment/unlock a shared counter 10,000 times
/// each; the final value is exactly 20,000.
///
/// The critical section deliberately yields between read and write, so a
/// broken mutex would lose updates.
#[test]
fn test_counter_increments_are_exclusive() {
    let rt = ThreadRuntime::new();
    let mutex = ReentrantMutex::new(Some("counter"));
    let counter = Symbol::new("counter");

    rt.enter(|exec| exec.set_var(counter.clone(), Value::Int(0)))
        .unwrap();

    let mut workers = Vec::new();
    for i in 0..2 {
        let m = mutex.clone();
        let var = counter.clone();
        let worker = rt
            .enter(|exec| {
                exec.make_thread(
                    move |exec| {
                        for _ in 0..10_000 {
                            exec.mutex_lock(&m)?;
                            let n = exec
                                .get_var(&var)
                                .and_then(|v| v.as_int())
                                .expect("counter must stay an integer");
                            // Give the other thread every chance to
                            // interleave inside the critical section.
                            exec.thread_yield()?;
                            exec.set_var(var.clone(), Value::Int(n + 1));
                            exec.mutex_unlock(&m)?;
                        }
                        Ok(Value::Nil)
                    },
                    Some(&format!("incrementer-{}", i)),
                )
                .unwrap()
            })
            .unwrap();
        workers.push(worker);
    }

    for worker in &workers {
        rt.enter(|exec| exec.thread_join(worker).unwrap()).unwrap();
    }

    let total = rt
        .enter(|exec| exec.get_var(&counter).and_then(|v| v.as_int()))
        .unwrap();
    assert_eq!(total, Some(20_000));
}

/// Test: a non-owner unlock attempt errors and leaves the owner's hold
/// untouched.
#[test]
fn test_non_owner_unlock_rejected() {
    let rt = ThreadRuntime::new();
    let mutex = ReentrantMutex::new(None);
    let (verdict_tx, verdict_rx) = channel::bounded(1);

    rt.enter(|exec| {
        exec.mutex_lock(&mutex).unwrap();
        exec.mutex_lock(&mutex).unwrap();
    })
    .unwrap();

    let m = mutex.clone();
    let intruder = rt
        .enter(|exec| {
            exec.make_thread(
                move |exec| {
                    let rejected = matches!(exec.mutex_unlock(&m), Err(ThreadError::NotOwned));
                    verdict_tx.send(rejected).unwrap();
                    Ok(Value::Nil)
                },
                Some("intruder"),
            )
            .unwrap()
        })
        .unwrap();

    assert!(verdict_rx.recv().unwrap());
    rt.enter(|exec| exec.thread_join(&intruder).unwrap())
        .unwrap();

    // The owner still owes exactly the two unlocks it took.
    rt.enter(|exec| {
        assert!(exec.mutex_owned(&mutex));
        exec.mutex_unlock(&mutex).unwrap();
        exec.mutex_unlock(&mutex).unwrap();
        assert!(!exec.mutex_owned(&mutex));
        assert!(matches!(
            exec.mutex_unlock(&mutex),
            Err(ThreadError::NotOwned)
        ));
    })
    .unwrap();
}

/// Test: a contended lock is granted only after the owner's final unlock.
#[test]
fn test_lock_waits_for_full_release() {
    let rt = ThreadRuntime::new();
    let mutex = ReentrantMutex::new(None);
    let order = Symbol::new("order");
    let (locked_tx, locked_rx) = channel::bounded(1);

    rt.enter(|exec| {
        exec.set_var(order.clone(), Value::List(vec![]));
        exec.mutex_lock(&mutex).unwrap();
    })
    .unwrap();

    let m = mutex.clone();
    let var = order.clone();
    let waiter = rt
        .enter(|exec| {
            exec.make_thread(
                move |exec| {
                    locked_tx.send(()).unwrap();
                    exec.mutex_lock(&m)?;
                    // Record that we got in.
                    exec.set_var(var.clone(), Value::symbol("waiter-entered"));
                    exec.mutex_unlock(&m)?;
                    Ok(Value::Nil)
                },
                Some("waiter"),
            )
            .unwrap()
        })
        .unwrap();

    locked_rx.recv().unwrap();
    rt.enter(|exec| {
        // The waiter cannot have entered yet: we still own the mutex.
        assert_eq!(exec.get_var(&order), Some(Value::List(vec![])));
        exec.mutex_unlock(&mutex).unwrap();
    })
    .unwrap();

    rt.enter(|exec| exec.thread_join(&waiter).unwrap()).unwrap();
    let seen = rt.enter(|exec| exec.get_var(&order)).unwrap();
    assert_eq!(seen, Some(Value::symbol("waiter-entered")));
}

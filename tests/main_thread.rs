//! Main-thread designation is process-wide, so everything touching it
//! lives in this one test binary and one test function.

use crossbeam_channel::unbounded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use strand_rs::prelude::*;
use strand_rs::executor;

#[test]
fn test_main_thread_contract() {
    let main_loop = install_main_thread().unwrap();

    // Reached without any dispatch: the thread itself is the main thread.
    assert!(is_main_thread());
    assert!(main_context().is_current());
    assert!(ExecutionContext::wrap(executor::main()).is_current());
    assert!(!concurrent_default_context().is_current());

    // Same thread may ask again, another thread may not.
    assert!(install_main_thread().is_ok());
    let taken = thread::spawn(|| install_main_thread().map(|_| ()))
        .join()
        .unwrap();
    assert!(matches!(taken, Err(Error::MainThreadTaken(_))));
    assert!(!thread::spawn(|| main_context().is_current()).join().unwrap());

    // async_ on the main thread runs inline.
    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();
    main_context().async_(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    // just_dispatch waits for the loop.
    let c = counter.clone();
    main_context().just_dispatch(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(main_loop.pump(), 1);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(main_loop.pump(), 0);

    // sync from another thread is served by the running loop, and `after`
    // on the main context fires on the main thread.
    let stop = main_loop.stop_handle();
    let (tx, rx) = unbounded();
    let background = thread::spawn(move || {
        let seen = main_context().sync(|| (is_main_thread(), main_context().is_current()));

        let scheduled = Instant::now();
        main_context().after(Duration::from_millis(100), move || {
            tx.send((scheduled.elapsed(), is_main_thread())).unwrap();
            stop.stop();
        });
        seen
    });

    main_loop.run();

    assert_eq!(background.join().unwrap(), (true, true));
    let (elapsed, on_main) = rx.try_recv().unwrap();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(on_main);

    // Work posted by other threads before the loop runs is buffered.
    let posters: Vec<_> = (0..3)
        .map(|_| {
            let counter = counter.clone();
            thread::spawn(move || {
                main_context().async_(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            })
        })
        .collect();
    for poster in posters {
        poster.join().unwrap();
    }
    assert_eq!(counter.load(Ordering::SeqCst), 2);

    let ran = main_loop.run_for(Duration::from_millis(50));
    assert_eq!(ran, 3);
    assert_eq!(counter.load(Ordering::SeqCst), 5);

    // A stop requested while no loop is running does not end the next one.
    let stop = main_loop.stop_handle();
    stop.stop();
    let c = counter.clone();
    thread::spawn(move || {
        main_context().async_(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
    })
    .join()
    .unwrap();
    assert_eq!(main_loop.run_for(Duration::from_millis(50)), 1);
    assert_eq!(counter.load(Ordering::SeqCst), 6);

    // An unbounded duration blocks like `run` until the stop arrives.
    let c = counter.clone();
    thread::spawn(move || {
        main_context().async_(move || {
            c.fetch_add(1, Ordering::SeqCst);
            stop.stop();
        });
    })
    .join()
    .unwrap();
    assert_eq!(main_loop.run_for(Duration::MAX), 1);
    assert_eq!(counter.load(Ordering::SeqCst), 7);
}

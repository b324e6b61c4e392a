// ABOUTME: Concurrency tests for the decoder pool: exclusive checkout and the instance ceiling.

use docwire::{doc, encode_document, DecoderConfig, DecoderPool, PoolConfig};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

const THREADS: usize = 8;
const ROUNDS: usize = 50;
const CEILING: usize = 3;

fn bounded_pool() -> DecoderPool {
    let decoder = DecoderConfig {
        buffer_capacity: 4096,
        max_name_length: 64,
        ..DecoderConfig::default()
    };
    let config = PoolConfig {
        max_memory: CEILING * decoder.instance_cost(),
        decoder,
        max_instances: NonZeroUsize::new(CEILING),
    };
    DecoderPool::new("concurrent", config)
}

#[test]
fn test_no_decoder_is_shared_between_threads() {
    let pool = Arc::new(bounded_pool());
    let in_use = Arc::new(Mutex::new(HashSet::new()));
    let bytes = Arc::new(encode_document(&doc! { "k": "v", "n": 1 }).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let in_use = Arc::clone(&in_use);
            let bytes = Arc::clone(&bytes);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let mut dec = pool.acquire(None);
                    let id = dec.buffer_mut().as_ptr() as usize;
                    assert!(in_use.lock().insert(id), "decoder handed out twice");

                    dec.load(&bytes).unwrap();
                    let decoded = dec.decode_document().unwrap().unwrap();
                    assert_eq!(decoded.get_str("k"), Some("v"));
                    assert_eq!(dec.decode_document().unwrap(), None);

                    assert!(in_use.lock().remove(&id));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = pool.stats();
    assert!(stats.created as usize <= CEILING, "created {} decoders", stats.created);
    assert!(stats.live <= CEILING);
    assert_eq!(stats.idle, stats.live);
    assert!(in_use.lock().is_empty());
}

#[test]
fn test_blocked_acquire_wakes_on_release() {
    let pool = Arc::new(bounded_pool());
    let held: Vec<_> = (0..CEILING).map(|_| pool.try_acquire(None).unwrap()).collect();
    assert!(pool.try_acquire(None).is_none());

    thread::scope(|s| {
        let waiter = s.spawn(|| {
            let dec = pool.acquire(None);
            dec.is_private()
        });
        drop(held);
        assert!(waiter.join().unwrap());
    });

    assert_eq!(pool.stats().created as usize, CEILING);
}

mod common;

use common::*;
use heapless::spsc::Queue;
use proptest::prelude::*;
use usb_webcam_rs::{
    capture::ReadyQueue,
    control,
    frame_buf::{BufferPool, Owner, PoolError, NUM_FRAME_BUFFER},
};

#[derive(Clone, Copy, Debug)]
enum Op {
    Acquire(u8),
    Publish(u8),
    Release(u8),
}

fn op() -> impl Strategy<Value = Op> {
    // One index past the end to exercise range checks
    let index = 0..=NUM_FRAME_BUFFER;
    prop_oneof![
        index.clone().prop_map(Op::Acquire),
        index.clone().prop_map(Op::Publish),
        index.prop_map(Op::Release),
    ]
}

proptest! {
    #[test]
    fn ownership_follows_free_capture_transmit(ops in prop::collection::vec(op(), 0..64)) {
        let mut pool = pool();
        let mut cache = RecordingCache::default();
        let mut model = [Owner::Free; NUM_FRAME_BUFFER as usize];

        for op in ops {
            match op {
                Op::Acquire(i) => {
                    let result = pool.acquire_for_capture(i).map(|slot| slot.len());
                    let expected = match model.get(i as usize) {
                        None => Err(PoolError::IndexOutOfRange(i)),
                        Some(Owner::Free) => Ok(SLOT_SIZE),
                        Some(Owner::Capture) => Err(PoolError::AlreadyCapturing(i)),
                        Some(Owner::Transmit) => Err(PoolError::Busy(i)),
                    };
                    if expected.is_ok() {
                        model[i as usize] = Owner::Capture;
                    }
                    prop_assert_eq!(result, expected);
                }
                Op::Publish(i) => {
                    let result = pool.publish(i, &mut cache);
                    let expected = match model.get(i as usize) {
                        None => Err(PoolError::IndexOutOfRange(i)),
                        Some(Owner::Capture) => Ok(()),
                        Some(_) => Err(PoolError::NotCapturing(i)),
                    };
                    if expected.is_ok() {
                        model[i as usize] = Owner::Transmit;
                    }
                    prop_assert_eq!(result, expected);
                }
                Op::Release(i) => {
                    let result = pool.release(i);
                    match model.get_mut(i as usize) {
                        None => {
                            prop_assert_eq!(result, Err(PoolError::IndexOutOfRange(i)));
                        }
                        Some(owner) => {
                            prop_assert_eq!(result, Ok(*owner));
                            *owner = Owner::Free;
                        }
                    }
                }
            }

            for (i, owner) in model.iter().enumerate() {
                prop_assert_eq!(pool.owner(i as u8), Some(*owner));
            }
        }

        // Only publishing invalidates, one buffer at a time
        let base = pool.base_address();
        for op in cache.ops.iter() {
            match *op {
                CacheOp::Invalidate(addr, len) => {
                    prop_assert_eq!(len, SLOT_SIZE);
                    prop_assert_eq!((addr - base) % SLOT_SIZE, 0);
                }
                CacheOp::Clean(..) => {
                    prop_assert!(false, "unexpected clean");
                }
            }
        }
    }

    #[test]
    fn capture_never_writes_the_frame_on_air(steps in prop::collection::vec(any::<bool>(), 1..80)) {
        let mut sensor = MockSensor::default();
        let mut ctx = boot(&mut sensor).unwrap();
        let mut usb = MockUsb::configured();
        let mut queue: ReadyQueue = Queue::new();
        let (mut tx, mut rx) = queue.split();

        usb.stream(1);
        control::poll(&mut ctx, &mut sensor, &mut usb, &mut rx);

        let mut completions = 0;
        for interrupt in steps {
            let forwarded = usb.frames.len();
            if interrupt {
                ctx.on_capture_complete(&mut tx);
                completions += 1;
            } else {
                control::poll(&mut ctx, &mut sensor, &mut usb, &mut rx);

                // Once the queue is drained only the frame on air is held by the transmitter
                for index in 0..ctx.pool.count() {
                    if Some(index) != ctx.on_air() {
                        prop_assert_ne!(ctx.pool.owner(index), Some(Owner::Transmit));
                    }
                }
            }

            let writing = ctx.capture.writing().unwrap();
            prop_assert_eq!(ctx.pool.owner(writing), Some(Owner::Capture));
            if let Some(on_air) = ctx.on_air() {
                prop_assert_ne!(on_air, writing);
                prop_assert_eq!(ctx.pool.owner(on_air), Some(Owner::Transmit));
            }
            prop_assert!(usb.frames.len() <= forwarded + 1);
            if usb.frames.len() > forwarded {
                prop_assert_eq!(usb.frames.last().copied(), ctx.on_air());
            }
        }

        prop_assert_eq!(ctx.capture.stats().frames, completions);
        prop_assert!(usb.frames.iter().all(|i| *i < NUM_FRAME_BUFFER));
        prop_assert_eq!(usb.kicks.len(), 1);
    }
}

#[test]
fn reset_zeroes_every_buffer() {
    let region = region();
    let mut pool = BufferPool::new(region, NUM_FRAME_BUFFER, SLOT_SIZE).unwrap();
    let mut cache = RecordingCache::default();

    pool.acquire_for_capture(0).unwrap().copy_from_slice(&[0x5A; SLOT_SIZE]);
    pool.publish(0, &mut cache).unwrap();
    pool.acquire_for_capture(2).unwrap();
    assert!(pool.slot(0).unwrap().iter().all(|b| *b == 0x5A));

    pool.reset_all(&mut cache);
    let used = SLOT_SIZE * NUM_FRAME_BUFFER as usize;
    assert_eq!(
        cache.ops.last(),
        Some(&CacheOp::Clean(pool.base_address(), used))
    );

    for index in 0..NUM_FRAME_BUFFER {
        assert_eq!(pool.owner(index), Some(Owner::Free));
        assert!(pool.slot(index).unwrap().iter().all(|b| *b == 0));
    }

    // A buffer captured into right after a reset and published unchanged reads back as zeros
    pool.acquire_for_capture(1).unwrap();
    pool.publish(1, &mut cache).unwrap();
    assert!(pool.slot(1).unwrap().iter().all(|b| *b == 0));
}

#[test]
fn reset_leaves_memory_past_the_pool_alone() {
    let region = region();
    let mut pool = BufferPool::new(region, 2, SLOT_SIZE).unwrap();
    let mut cache = RecordingCache::default();

    pool.reset_all(&mut cache);
    assert_eq!(
        cache.ops,
        vec![CacheOp::Clean(pool.base_address(), 2 * SLOT_SIZE)]
    );
    assert_eq!(pool.slot(2), None);
}

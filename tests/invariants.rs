//! Property-based checks of the simulator's core invariants (P1-P7), run
//! over randomly generated sequences of writes, trims, and GC invocations
//! against the reduced test geometry.

use std::collections::HashSet;

use ftlsim::device::Simulator;
use ftlsim::geometry::Geometry;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Write(u64),
    Trim(u32),
    Gc,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..12).prop_map(Op::Write),
        (0u32..4).prop_map(Op::Trim),
        Just(Op::Gc),
    ]
}

fn assert_invariants(sim: &Simulator) {
    // P1: utl equals the sum of per-block valid counts.
    assert_eq!(sim.utilized_pages(), sim.blocks().total_valid());

    // P2 & P3: forward/reverse maps agree on every live mapping.
    let ppb = sim.geometry().pages_per_block;
    for lba in 0..sim.geometry().logical_pages() {
        if let Some(pp) = sim.forward_map().get(lba) {
            let (b, o) = sim.geometry().page_location(pp);
            assert!(sim.blocks().block(b).is_valid(o), "fwd[{lba}] -> invalid page");
            assert_eq!(sim.reverse_map().get(pp), Some(lba), "oob mismatch for lba {lba}");
        }
    }
    for block in 0..sim.geometry().total_blocks {
        for offset in 0..ppb {
            if sim.blocks().block(block).is_valid(offset) {
                let pp = sim.geometry().physical_page(block, offset);
                let lba = sim
                    .reverse_map()
                    .get(pp)
                    .expect("valid page must have an oob entry");
                assert_eq!(sim.forward_map().get(lba), Some(pp), "fwd does not point back at valid pp");
            }
        }
    }

    // P7: no duplicate block indices in the free queue.
    let contents = sim.free_queue_contents();
    let unique: HashSet<_> = contents.iter().collect();
    assert_eq!(contents.len(), unique.len(), "duplicate block in free queue");

    // P6: free + active + in-use == total_blocks.
    let total = sim.geometry().total_blocks as usize;
    assert_eq!(sim.free_blocks() + 1 + sim.used_blocks(), total);

    // Every block's valid_count is within [0, free_offset] <= ppb.
    for block in 0..sim.geometry().total_blocks {
        let state = sim.blocks().block(block);
        assert!(state.valid_count() <= state.free_offset());
        assert!(state.free_offset() <= ppb);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn invariants_hold_after_every_operation(ops in proptest::collection::vec(op_strategy(), 1..200)) {
        let mut sim = Simulator::new(Geometry::reduced_for_testing());
        for op in ops {
            match op {
                Op::Write(lba) => {
                    let _ = sim.write_page(lba, false);
                }
                Op::Trim(block) => {
                    let lba = u64::from(block) * u64::from(sim.geometry().pages_per_block);
                    let _ = sim.trim_block(lba);
                }
                Op::Gc => {
                    let _ = sim.run_gc_until_threshold();
                }
            }
            assert_invariants(&sim);
        }
    }

    #[test]
    fn overwrite_idempotence_of_validity(lba in 0u64..12, times in 1usize..8) {
        // L1: writing the same LBA N times leaves exactly one valid
        // physical page for that LBA.
        let mut sim = Simulator::new(Geometry::reduced_for_testing());
        for _ in 0..times {
            if sim.free_blocks() < sim.geometry().gc_threshold as usize {
                let _ = sim.run_gc_until_threshold();
            }
            sim.write_page(lba, false).unwrap();
        }
        let pp = sim.forward_map().get(lba).unwrap();
        let (b, o) = sim.geometry().page_location(pp);
        prop_assert!(sim.blocks().block(b).is_valid(o));

        // No other physical page may also claim to be lba's live copy.
        let mut live_copies = 0u32;
        for block in 0..sim.geometry().total_blocks {
            for offset in 0..sim.geometry().pages_per_block {
                if sim.blocks().block(block).is_valid(offset) {
                    let candidate = sim.geometry().physical_page(block, offset);
                    if sim.reverse_map().get(candidate) == Some(lba) {
                        live_copies += 1;
                    }
                }
            }
        }
        prop_assert_eq!(live_copies, 1);
    }
}

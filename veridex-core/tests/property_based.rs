//! Property-based tests for the search core's invariants:
//! - tightening is sound (never cuts off a feasible point) and monotone
//! - a second examination at a fixed point learns nothing
//! - bound store/restore round-trips bit-identically through any nesting

use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

use veridex_core::{
    BoundManager, BoundTighteningType, Config, Context, DenseTableau, RowBoundTightener, Statistics,
};

/// A random box together with a point inside it.
fn box_with_point(n: usize) -> impl Strategy<Value = (Vec<(f64, f64)>, Vec<f64>)> {
    prop::collection::vec((-10.0f64..10.0, 0.1f64..10.0, 0.0f64..1.0), n).prop_map(|vars| {
        let mut boxes = Vec::new();
        let mut point = Vec::new();
        for (lo, width, t) in vars {
            boxes.push((lo, lo + width));
            point.push(lo + t * width);
        }
        (boxes, point)
    })
}

/// Non-zero integer coefficients, comfortably above the tightening
/// threshold.
fn coefficients(n: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((-3i32..=3).prop_filter("nonzero", |c| *c != 0), n)
        .prop_map(|cs| cs.into_iter().map(f64::from).collect())
}

mod tightener_properties {
    use super::*;

    proptest! {
        /// A row built to pass through a known point can never tighten that
        /// point out of the box, bounds only ever narrow, and a repeated
        /// examination finds nothing new.
        #[test]
        fn sound_monotone_and_idempotent(
            (boxes, point) in (2usize..6).prop_flat_map(box_with_point),
            seed_coeffs in (2usize..6).prop_flat_map(coefficients),
        ) {
            let n = boxes.len().min(seed_coeffs.len());
            let boxes = &boxes[..n];
            let point = &point[..n];
            let coeffs = &seed_coeffs[..n];

            // rhs := c·p makes the row satisfiable at p.
            let rhs: f64 = coeffs.iter().zip(point).map(|(c, p)| c * p).sum();
            let tableau = DenseTableau::new(1, n, coeffs.to_vec(), vec![rhs], vec![0]);

            let ctx = Context::new();
            let mut bounds = BoundManager::new(&ctx);
            bounds.initialize(n);
            for (v, &(lo, hi)) in boxes.iter().enumerate() {
                bounds.set_lower_bound(v, lo);
                bounds.set_upper_bound(v, hi);
            }

            let config = Config {
                bound_tightening_type: BoundTighteningType::ConstraintMatrix,
                ..Config::default()
            };
            let mut tightener = RowBoundTightener::new(&config);
            tightener.set_dimensions(&tableau);
            let stats = Rc::new(RefCell::new(Statistics::new()));
            tightener.set_statistics(Rc::clone(&stats));

            tightener
                .examine_constraint_matrix(&tableau, &mut bounds, true)
                .expect("a row satisfiable inside the box cannot be infeasible");

            for (v, &(lo, hi)) in boxes.iter().enumerate() {
                // Soundness: the witness point survives.
                prop_assert!(bounds.lower_bound(v) <= point[v] + 1e-6);
                prop_assert!(bounds.upper_bound(v) >= point[v] - 1e-6);
                // Monotonicity: intervals only shrink.
                prop_assert!(bounds.lower_bound(v) >= lo);
                prop_assert!(bounds.upper_bound(v) <= hi);
            }

            // Idempotence: the fixed point is a fixed point.
            let learned = stats.borrow().num_tightenings_from_constraint_matrix;
            tightener.examine_constraint_matrix(&tableau, &mut bounds, true).unwrap();
            prop_assert_eq!(stats.borrow().num_tightenings_from_constraint_matrix, learned);
        }
    }
}

mod bound_round_trip_properties {
    use super::*;

    /// Valid tightenings per level: variable, side, positive shrink amount.
    fn level_ops(n: usize) -> impl Strategy<Value = Vec<(usize, bool, f64)>> {
        prop::collection::vec((0..n, prop::bool::ANY, 0.01f64..2.0), 0..8)
    }

    proptest! {
        /// Pushing levels of tightenings and popping them back restores
        /// every intermediate bound table bit-identically.
        #[test]
        fn store_restore_round_trips(
            levels in prop::collection::vec(level_ops(4), 1..5),
        ) {
            let ctx = Context::new();
            let mut bounds = BoundManager::new(&ctx);
            bounds.initialize(4);
            for v in 0..4 {
                bounds.set_lower_bound(v, -100.0);
                bounds.set_upper_bound(v, 100.0);
            }

            let mut snapshots = Vec::new();
            for ops in &levels {
                snapshots.push((
                    bounds.lower_bounds().to_vec(),
                    bounds.upper_bounds().to_vec(),
                ));
                bounds.store_local_bounds();
                ctx.push();
                for &(v, is_lower, amount) in ops {
                    if is_lower {
                        bounds.set_lower_bound(v, bounds.lower_bound(v) + amount);
                    } else {
                        bounds.set_upper_bound(v, bounds.upper_bound(v) - amount);
                    }
                }
            }

            while let Some((expected_lower, expected_upper)) = snapshots.pop() {
                ctx.pop();
                bounds.restore_local_bounds();
                prop_assert_eq!(bounds.lower_bounds(), expected_lower.as_slice());
                prop_assert_eq!(bounds.upper_bounds(), expected_upper.as_slice());
            }
            prop_assert_eq!(ctx.level(), 0);
        }
    }
}

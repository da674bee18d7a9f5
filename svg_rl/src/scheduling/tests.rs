//! Behavioural tests for step schedules.
//!
//! # Test Categories
//!
//! 1. **Boundary Tests**: step 0, one transition period, `usize::MAX`
//! 2. **Input Validation Tests**: NaN, Inf and negative values
//! 3. **Mathematical Correctness Tests**: closed-form values
//! 4. **Property-Based Tests**: monotonicity and boundedness

use super::*;

// ============================================================================
// CONSTANT SCHEDULE TESTS
// ============================================================================

mod constant_schedule_tests {
    use super::*;

    #[test]
    fn should_return_same_value_for_any_step() {
        let sched = ConstantSchedule::new(0.001);
        assert_eq!(sched.value(0), 0.001);
        assert_eq!(sched.value(1_000_000), 0.001);
        assert_eq!(sched.value(usize::MAX), 0.001);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "non-negative"))]
    fn should_reject_negative_value_in_debug() {
        let sched = ConstantSchedule::new(-0.5);
        assert_eq!(sched.value(0), 0.0);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "finite"))]
    fn should_reject_nan_in_debug() {
        let sched = ConstantSchedule::new(f64::NAN);
        assert_eq!(sched.value(0), 0.0);
    }
}

// ============================================================================
// EXPONENTIAL DECAY TESTS
// ============================================================================

mod exponential_decay_tests {
    use super::*;

    #[test]
    fn should_start_at_init() {
        let sched = ExponentialDecay::new(0.01, 0.5, 100);
        assert_eq!(sched.value(0), 0.01);
    }

    #[test]
    fn should_apply_rate_once_per_transition_period() {
        let sched = ExponentialDecay::new(0.01, 0.5, 100);
        assert!((sched.value(100) - 0.005).abs() < 1e-12);
        assert!((sched.value(200) - 0.0025).abs() < 1e-12);
    }

    #[test]
    fn should_interpolate_between_periods() {
        let sched = ExponentialDecay::new(1.0, 0.25, 10);
        // 0.25^0.5
        assert!((sched.value(5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn staircase_should_hold_value_within_period() {
        let sched = ExponentialDecay::new(1.0, 0.5, 10).with_staircase(true);
        assert_eq!(sched.value(9), 1.0);
        assert_eq!(sched.value(10), 0.5);
        assert_eq!(sched.value(19), 0.5);
    }

    #[test]
    fn unit_rate_should_be_constant() {
        let sched = ExponentialDecay::new(0.001, 1.0, 100);
        assert_eq!(sched.value(0), 0.001);
        assert_eq!(sched.value(usize::MAX), 0.001);
    }

    #[test]
    fn should_decay_to_zero_at_extreme_steps() {
        let sched = ExponentialDecay::new(1.0, 0.5, 1);
        let v = sched.value(usize::MAX);
        assert!(v.is_finite());
        assert!(v >= 0.0 && v < 1e-300);
    }

    #[test]
    fn growth_should_stay_finite() {
        let sched = ExponentialDecay::new(1.0, 2.0, 1);
        assert!(sched.value(100_000).is_finite());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "transition_steps must be > 0"))]
    fn should_reject_zero_transition_steps_in_debug() {
        let sched = ExponentialDecay::new(1.0, 0.5, 0);
        assert_eq!(sched.transition_steps(), 1);
        assert!((sched.value(1) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn should_be_usable_as_trait_object() {
        let schedules: Vec<Box<dyn Scheduler>> = vec![
            Box::new(ConstantSchedule::new(0.1)),
            Box::new(ExponentialDecay::new(0.1, 0.9, 10)),
        ];
        for s in &schedules {
            assert!((s.value(0) - 0.1).abs() < 1e-12);
        }
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: a decaying schedule never increases with the step.
        #[test]
        fn decay_is_monotone_non_increasing(
            init in 0.0f64..10.0,
            rate in 0.0f64..=1.0,
            transition_steps in 1usize..1000,
            step in 0usize..100_000,
            delta in 0usize..1000,
        ) {
            let sched = ExponentialDecay::new(init, rate, transition_steps);
            prop_assert!(sched.value(step + delta) <= sched.value(step) + 1e-12);
        }

        /// Property: a decaying schedule stays within [0, init].
        #[test]
        fn decay_is_bounded_by_init(
            init in 0.0f64..10.0,
            rate in 0.0f64..=1.0,
            transition_steps in 1usize..1000,
            step in 0usize..1_000_000,
        ) {
            let v = ExponentialDecay::new(init, rate, transition_steps).value(step);
            prop_assert!(v.is_finite());
            prop_assert!(v >= 0.0);
            prop_assert!(v <= init + 1e-12);
        }

        /// Property: staircase values are reached by the continuous schedule at period boundaries.
        #[test]
        fn staircase_matches_continuous_at_boundaries(
            init in 0.0f64..10.0,
            rate in 0.0f64..=1.0,
            transition_steps in 1usize..100,
            periods in 0usize..50,
        ) {
            let continuous = ExponentialDecay::new(init, rate, transition_steps);
            let stairs = continuous.with_staircase(true);
            let step = periods * transition_steps;
            prop_assert!((continuous.value(step) - stairs.value(step)).abs() < 1e-9);
        }
    }
}

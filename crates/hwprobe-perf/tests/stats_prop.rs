use hwprobe_perf::{RunningStat, Samples};
use proptest::prelude::*;

fn sample_values() -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(-1.0e6f64..1.0e6, 1..200)
}

proptest! {
    #[test]
    fn running_mean_matches_direct_mean(values in sample_values()) {
        let stat: RunningStat = values.iter().copied().collect();
        let direct = values.iter().sum::<f64>() / values.len() as f64;
        prop_assert!((stat.mean() - direct).abs() <= 1e-6 * direct.abs().max(1.0));
        prop_assert_eq!(stat.len(), values.len() as u64);
        prop_assert!(stat.variance() >= 0.0);
    }

    #[test]
    fn quartiles_are_ordered_and_bounded(values in sample_values()) {
        let samples: Samples = values.iter().copied().collect();
        let s = samples.summary().unwrap();
        prop_assert!(s.min <= s.first_quartile);
        prop_assert!(s.first_quartile <= s.median);
        prop_assert!(s.median <= s.third_quartile);
        prop_assert!(s.third_quartile <= s.max);
        prop_assert!(s.interquartile_range() >= 0.0);
    }
}

#[test]
fn constant_samples_have_no_spread() {
    let samples: Samples = std::iter::repeat(42.0).take(50).collect();
    let s = samples.summary().unwrap();
    assert_eq!(s.count, 50);
    assert_eq!(s.median, 42.0);
    assert_eq!(s.interquartile_range(), 0.0);
    assert_eq!(s.std_dev, 0.0);
    assert_eq!(s.shape, hwprobe_perf::Shape::Symmetric);
}

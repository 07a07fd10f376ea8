use super::*;
use approx::*;
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::arithmetic::{BetaDerivatives, Channels, Plain, Precise, PreciseDerivatives};
use crate::bonds::{ChannelBond, ConfigurationId, PairTable};
use crate::validation::biconnected_sum_brute_force;

fn uniform(n: usize, f: f64) -> PairTable<f64> {
    PairTable::from_fn(n, ConfigurationId(1), |_, _| f)
}

/// Mix of non-interacting, overlapping and soft pairs.
fn random_table(n: usize, rng: &mut StdRng) -> PairTable<f64> {
    PairTable::from_fn(n, ConfigurationId(rng.gen()), |_, _| {
        let roll: f64 = rng.gen();
        if roll < 0.25 {
            0.0
        } else if roll < 0.45 {
            -1.0
        } else {
            rng.gen_range(-1.0..1.0)
        }
    })
}

fn brute_force(table: &PairTable<f64>) -> f64 {
    biconnected_sum_brute_force(table.point_count(), |i, j| *table.get(i, j))
}

#[test]
fn test_two_points_is_minus_mayer_function() {
    let mut cluster = WheatleyCluster::new(2, Plain);
    for f in [-1.0, -0.3, 0.0, 2.5] {
        assert_abs_diff_eq!(cluster.compute(&uniform(2, f)).unwrap(), -f, epsilon = 1e-15);
    }
    // hard overlaps and absent bonds go through q exactly
    assert_eq!(cluster.compute(&uniform(2, -1.0)).unwrap(), 1.0);
    assert_eq!(cluster.compute(&uniform(2, 0.0)).unwrap(), 0.0);
}

#[test]
fn test_three_point_triangle() {
    let mut cluster = WheatleyCluster::new(3, Plain);
    // only the triangle is biconnected: (1 - 3) f^3
    assert_relative_eq!(cluster.compute(&uniform(3, -0.5)).unwrap(), 0.25, epsilon = 1e-14);
    assert_relative_eq!(cluster.compute(&uniform(3, 0.5)).unwrap(), -0.25, epsilon = 1e-14);
    assert_relative_eq!(cluster.compute(&uniform(3, -1.0)).unwrap(), 2.0, epsilon = 1e-14);
}

#[test]
fn test_four_point_ring() {
    // ring 0-1-2-3 with no diagonal bonds: a single biconnected graph, (1 - 4) * (-1)^4
    let ring = PairTable::from_fn(4, ConfigurationId(3), |i, j| if (i + j) % 2 == 1 { -1.0 } else { 0.0 });
    let mut cluster = WheatleyCluster::new(4, Plain);
    assert!(!cluster.is_screened(&ring));
    assert_relative_eq!(cluster.compute(&ring).unwrap(), -3.0, epsilon = 1e-12);
}

#[test]
fn test_hard_sphere_complete_graph() {
    // 1 graph with six edges, six with five, three rings of four: 1 - 6 + 3
    let mut cluster = WheatleyCluster::new(4, Plain);
    assert_relative_eq!(cluster.compute(&uniform(4, -1.0)).unwrap(), 6.0, epsilon = 1e-12);
}

#[test]
fn test_no_interactions_gives_zero() {
    for n in 2..=8 {
        let mut cluster = WheatleyCluster::new(n, Plain);
        let config = uniform(n, 0.0);
        let value = cluster.compute(&config).unwrap();
        assert_eq!(value, 0.0);
        let value = cluster.compute_unscreened(&config).unwrap();
        assert!(value.is_finite());
        assert_abs_diff_eq!(value, 0.0, epsilon = 1e-14);
    }
}

#[test]
fn test_matches_graph_enumeration() {
    let mut rng = StdRng::seed_from_u64(20);
    for n in 2..=6 {
        let mut cluster = WheatleyCluster::new(n, Plain);
        for _ in 0..25 {
            let table = random_table(n, &mut rng);
            let expected = brute_force(&table);
            let value = cluster.compute(&table).unwrap();
            assert_abs_diff_eq!(value, expected, epsilon = 1e-8);
        }
    }
}

#[test]
fn test_relabelling_points_keeps_value() {
    let mut rng = StdRng::seed_from_u64(7);
    let n = 5;
    let mut cluster = WheatleyCluster::new(n, Plain);
    for _ in 0..4 {
        let table = random_table(n, &mut rng);
        let value = cluster.compute_unscreened(&table).unwrap();
        for perm in (0..n).permutations(n) {
            let relabelled = cluster.compute_unscreened(&table.permuted(&perm)).unwrap();
            assert_abs_diff_eq!(relabelled, value, epsilon = 1e-10);
        }
    }
}

#[test]
fn test_screened_configurations_vanish() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut screened = 0;
    for n in 3..=7 {
        let mut cluster = WheatleyCluster::new(n, Plain);
        for _ in 0..200 {
            let table = random_table(n, &mut rng);
            if cluster.is_screened(&table) {
                screened += 1;
                let value = cluster.compute_unscreened(&table).unwrap();
                assert_abs_diff_eq!(value, 0.0, epsilon = 1e-10);
                assert_eq!(cluster.compute(&table).unwrap(), 0.0);
            }
        }
    }
    assert!(screened > 0);
}

#[test]
fn test_hard_sphere_screening_is_exact() {
    let mut rng = StdRng::seed_from_u64(5);
    for n in 4..=7 {
        let mut cluster = WheatleyCluster::new(n, Plain);
        for _ in 0..200 {
            let table = PairTable::from_fn(n, ConfigurationId(0), |_, _| {
                if rng.gen_bool(0.55) {
                    -1.0
                } else {
                    0.0
                }
            });
            if cluster.is_screened(&table) {
                assert_eq!(cluster.compute_unscreened(&table).unwrap(), 0.0);
            }
        }
    }
}

#[test]
fn test_screening_statistics() {
    let mut cluster = WheatleyCluster::new(4, Plain);
    let chain = PairTable::from_fn(4, ConfigurationId(1), |i, j| if j == i + 1 { -1.0 } else { 0.0 });
    assert_eq!(cluster.compute(&chain).unwrap(), 0.0);
    cluster.compute(&uniform(4, -1.0)).unwrap();
    let stats = *cluster.screen().stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.screened, 1);
    assert_eq!(stats.nonzero, 1);
}

#[test]
fn test_connected_table_holds_pair_functions() {
    let mut cluster = WheatleyCluster::new(3, Plain);
    let table = PairTable::from_fn(3, ConfigurationId(2), |i, j| 0.1 * (i + j) as f64 - 0.2);
    cluster.compute_unscreened(&table).unwrap();
    let workspace = cluster.workspace();
    assert_relative_eq!(workspace.c[0b011], *table.get(0, 1), epsilon = 1e-15);
    assert_relative_eq!(workspace.c[0b110], *table.get(1, 2), epsilon = 1e-15);
    assert_eq!(workspace.c[0b100], 1.0);
}

#[test]
fn test_non_finite_input_is_an_error() {
    let mut cluster = WheatleyCluster::new(3, Plain);
    let result = cluster.compute(&uniform(3, f64::NAN));
    assert!(result.is_err());
}

#[test]
fn test_unit_multibody_factor_changes_nothing() {
    struct Unit;
    impl Multibody for Unit {
        fn factor(&self, _subset: Mask) -> Option<f64> {
            Some(1.0)
        }
    }

    let mut rng = StdRng::seed_from_u64(3);
    let table = random_table(5, &mut rng);
    let mut cluster = WheatleyCluster::new(5, Plain);
    let value = cluster.compute_multibody(&table, &Unit).unwrap();
    assert_abs_diff_eq!(value.nonadditive, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(value.pairwise, brute_force(&table), epsilon = 1e-9);
}

#[test]
fn test_three_body_factor() {
    struct Triplet(f64);
    impl Multibody for Triplet {
        fn factor(&self, subset: Mask) -> Option<f64> {
            (point_count(subset) == 3).then_some(self.0)
        }
    }

    let table = PairTable::from_fn(3, ConfigurationId(4), |i, j| 0.2 * (i + j) as f64 - 0.5);
    let q: f64 = [(0, 1), (0, 2), (1, 2)].iter().map(|&(i, j)| table.get(i, j) + 1.0).product();
    let mut cluster = WheatleyCluster::new(3, Plain);
    let value = cluster.compute_multibody(&table, &Triplet(1.3)).unwrap();
    // only Q of the full set changes, so B moves by Q * (factor - 1)
    assert_relative_eq!(value.nonadditive, -2.0 * q * 0.3, epsilon = 1e-12);
    assert_relative_eq!(value.total, value.pairwise + value.nonadditive, epsilon = 1e-14);
}

#[test]
fn test_precise_agrees_with_plain() {
    let mut rng = StdRng::seed_from_u64(11);
    let n = 5;
    let mut plain = WheatleyCluster::new(n, Plain);
    let mut precise = WheatleyCluster::new(n, Precise::with_digits(40));
    for _ in 0..10 {
        let table = random_table(n, &mut rng);
        let expected = plain.compute(&table).unwrap();
        let value = precise.compute(&table).unwrap();
        let value = precise.arithmetic().to_f64(&value);
        assert_abs_diff_eq!(value, expected, epsilon = 1e-10);
    }
}

#[test]
fn test_channels_evaluate_to_scalar_sum() {
    let mut rng = StdRng::seed_from_u64(17);
    for n in [3, 4, 5] {
        let channels = Channels::for_points(n);
        let mut cluster = WheatleyCluster::new(n, channels);
        for _ in 0..10 {
            let bonds = PairTable::from_fn(n, ConfigurationId(0), |_, _| match rng.gen_range(0..3) {
                0 => ChannelBond::overlap(2),
                1 => ChannelBond::well(2),
                _ => ChannelBond::ideal(2),
            });
            let polynomial = cluster.compute(&bonds).unwrap();
            for y in [0.3, 1.7] {
                let scalar = PairTable::from_fn(n, ConfigurationId(0), |i, j| {
                    Channels::evaluate(bonds.get(i, j).channels(), y) - 1.0
                });
                let expected = WheatleyCluster::new(n, Plain).compute(&scalar).unwrap();
                assert_abs_diff_eq!(Channels::evaluate(&polynomial, y), expected, epsilon = 1e-9);
            }
        }
    }
}

#[test]
fn test_temperature_derivatives() {
    let mut rng = StdRng::seed_from_u64(23);
    let n = 4;
    let energies = PairTable::from_fn(n, ConfigurationId(0), |_, _| rng.gen_range(-1.0..1.0));
    let mayer = |beta: f64| PairTable::from_fn(n, ConfigurationId(0), |i, j| (-beta * energies.get(i, j)).exp() - 1.0);
    let plain_at = |beta: f64| WheatleyCluster::new(n, Plain).compute(&mayer(beta)).unwrap();

    let beta = 0.9;
    let mut cluster = WheatleyCluster::new(n, BetaDerivatives::new(2, beta));
    let derivatives = cluster.compute(&mayer(beta)).unwrap();

    assert_relative_eq!(derivatives[0], plain_at(beta), epsilon = 1e-12);
    let h = 1e-5;
    let first = (plain_at(beta + h) - plain_at(beta - h)) / (2.0 * h);
    assert_abs_diff_eq!(derivatives[1], first, epsilon = 1e-6);
    let h = 1e-3;
    let second = (plain_at(beta + h) - 2.0 * plain_at(beta) + plain_at(beta - h)) / (h * h);
    assert_abs_diff_eq!(derivatives[2], second, epsilon = 1e-4);
}

#[test]
fn test_precise_temperature_derivatives() {
    let mut rng = StdRng::seed_from_u64(29);
    let n = 5;
    let energies = PairTable::from_fn(n, ConfigurationId(0), |_, _| rng.gen_range(-1.0..1.0));
    let mayer = |beta: f64| PairTable::from_fn(n, ConfigurationId(0), |i, j| (-beta * energies.get(i, j)).exp() - 1.0);
    let plain_at = |beta: f64| WheatleyCluster::new(n, Plain).compute(&mayer(beta)).unwrap();

    let beta = 1.3;
    let mut double = WheatleyCluster::new(n, BetaDerivatives::new(2, beta));
    let mut precise = WheatleyCluster::new(n, PreciseDerivatives::with_digits(2, beta, 40));
    let expected = double.compute(&mayer(beta)).unwrap();
    let value = precise.compute(&mayer(beta)).unwrap();
    let value = precise.arithmetic().to_f64(&value);

    for (v, e) in value.iter().zip(&expected) {
        assert_relative_eq!(*v, *e, epsilon = 1e-10, max_relative = 1e-10);
    }
    let h = 1e-5;
    let first = (plain_at(beta + h) - plain_at(beta - h)) / (2.0 * h);
    assert_abs_diff_eq!(value[1], first, epsilon = 1e-6);
    let h = 1e-3;
    let second = (plain_at(beta + h) - 2.0 * plain_at(beta) + plain_at(beta - h)) / (h * h);
    assert_abs_diff_eq!(value[2], second, epsilon = 1e-4);
}

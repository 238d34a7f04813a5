//! Property tests for the cascade engine.
//!
//! Each property is checked over generated inputs with proptest.

#![allow(clippy::unwrap_used, clippy::panic)]

use proptest::prelude::*;
use seisresp_core::{
    AmplitudeScale, Cascade, CascadeOptions, Complex64, Decimation, FrequencyGrid, OutputFormat,
    PhaseUnit, PolesZeros, Response, ResponseError, ResponseList, ResponseListEntry, Stage,
    UnitTable, assemble,
};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn close(a: f64, b: f64, rel: f64) -> bool {
    (a - b).abs() <= rel * a.abs().max(b.abs()).max(1e-300)
}

fn evaluate(response: &Response, grid: &FrequencyGrid) -> Vec<Option<Complex64>> {
    let table = UnitTable::standard();
    Cascade::new(response, &CascadeOptions::default(), &table)
        .unwrap()
        .evaluate(grid)
        .unwrap()
        .points
        .iter()
        .map(|p| p.value())
        .collect()
}

/// Strictly increasing table built from positive increments.
fn response_list_strategy() -> impl Strategy<Value = Vec<ResponseListEntry>> {
    prop::collection::vec((0.01f64..10.0, 0.1f64..100.0, -180.0f64..180.0), 2..12).prop_map(
        |rows| {
            let mut frequency = 0.0;
            rows.into_iter()
                .map(|(step, amplitude, phase)| {
                    frequency += step;
                    ResponseListEntry::new(frequency, amplitude, phase)
                })
                .collect()
        },
    )
}

// =============================================================================
// STAGE PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn prop_identity_poles_zeros_is_flat(
        a0 in 1e-3f64..1e6,
        frequencies in prop::collection::btree_set(1u32..100_000, 1..20),
    ) {
        let response = Response::new(vec![Stage::PolesZeros(PolesZeros::new(vec![], vec![], a0))])
            .unwrap();
        let grid = FrequencyGrid::explicit(
            frequencies.iter().map(|f| f64::from(*f) / 100.0).collect(),
        );
        for value in evaluate(&response, &grid) {
            let value = value.unwrap();
            prop_assert!(close(value.re, a0, 1e-12));
            prop_assert!(value.im.abs() <= 1e-12 * a0);
        }
    }

    #[test]
    fn prop_gain_stages_multiply(gains in prop::collection::vec(0.01f64..100.0, 1..6)) {
        let response = Response::new(gains.iter().map(|g| Stage::gain(*g, 1.0)).collect()).unwrap();
        let expected: f64 = gains.iter().product();
        let values = evaluate(&response, &FrequencyGrid::logarithmic(0.01, 50.0, 9));
        for value in values {
            let value = value.unwrap();
            prop_assert!(close(value.re, expected, 1e-12));
            prop_assert_eq!(value.im, 0.0);
        }
    }

    #[test]
    fn prop_response_list_hits_entries_exactly(entries in response_list_strategy()) {
        let response = Response::new(vec![Stage::ResponseList(ResponseList::new(entries.clone()))])
            .unwrap();
        let grid = FrequencyGrid::explicit(entries.iter().map(|e| e.frequency).collect());
        for (entry, value) in entries.iter().zip(evaluate(&response, &grid)) {
            let (amplitude, phase) = value.unwrap().to_polar();
            prop_assert!(close(amplitude, entry.amplitude, 1e-9));
            let diff = (phase - entry.phase.to_radians()).rem_euclid(std::f64::consts::TAU);
            prop_assert!(diff < 1e-9 || std::f64::consts::TAU - diff < 1e-9);
        }
    }

    #[test]
    fn prop_response_list_rejects_outside_range(
        entries in response_list_strategy(),
        below in 0.0f64..1.0,
        above in 0.001f64..100.0,
    ) {
        let low = entries[0].frequency;
        let high = entries[entries.len() - 1].frequency;
        let response = Response::new(vec![Stage::ResponseList(ResponseList::new(entries))]).unwrap();
        let grid = FrequencyGrid::explicit(vec![low * below * 0.999, high + above]);
        let table = UnitTable::standard();
        let evaluated = Cascade::new(&response, &CascadeOptions::default(), &table)
            .unwrap()
            .evaluate(&grid)
            .unwrap();
        for point in &evaluated.points {
            let failure = point.outcome.as_ref().unwrap_err();
            prop_assert_eq!(failure.stage_index, Some(0));
            prop_assert!(matches!(failure.error, ResponseError::OutOfRange { .. }), "unexpected {:?}", failure.error);
        }
    }

    #[test]
    fn prop_decimation_is_pure_delay(
        rate in 1.0f64..1000.0,
        factor in 1u32..10,
        offset in 0u32..20,
        delay_samples in 0.0f64..40.0,
        fraction in 0.001f64..0.5,
    ) {
        let decimation = Decimation::new(rate, factor)
            .with_offset(offset)
            .with_delay_samples(delay_samples);
        let delay = delay_samples / rate;
        let response = Response::new(vec![Stage::Decimation(decimation)]).unwrap();
        let frequency = fraction * rate;
        let value = evaluate(&response, &FrequencyGrid::explicit(vec![frequency]))[0].unwrap();
        let expected = Complex64::cis(-std::f64::consts::TAU * frequency * delay);
        prop_assert!((value.norm() - 1.0).abs() < 1e-12);
        prop_assert!((value.re - expected.re).abs() < 1e-9);
        prop_assert!((value.im - expected.im).abs() < 1e-9);
    }
}

// =============================================================================
// ASSEMBLY AND GRID PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn prop_real_imaginary_round_trips_to_polar(
        poles in prop::collection::vec((-50.0f64..-0.1, -50.0f64..50.0), 1..4),
        a0 in 0.1f64..1e4,
    ) {
        let poles = poles.into_iter().map(|(re, im)| Complex64::new(re, im)).collect();
        let response = Response::new(vec![Stage::PolesZeros(PolesZeros::new(poles, vec![], a0))])
            .unwrap();
        let table = UnitTable::standard();
        let evaluated = Cascade::new(&response, &CascadeOptions::default(), &table)
            .unwrap()
            .evaluate(&FrequencyGrid::logarithmic(0.01, 100.0, 25))
            .unwrap();

        let rectangular = assemble(&evaluated, OutputFormat::RealImaginary);
        let polar = assemble(
            &evaluated,
            OutputFormat::AmplitudePhase {
                amplitude: AmplitudeScale::Linear,
                phase: PhaseUnit::Radians,
                unwrap: false,
            },
        );
        for (r, p) in rectangular.rows.iter().zip(&polar.rows) {
            let (re, im) = r.values.unwrap();
            let (amplitude, phase) = p.values.unwrap();
            let (m, a) = Complex64::new(re, im).to_polar();
            prop_assert!(close(m, amplitude, 1e-9));
            prop_assert!((a - phase).abs() <= 1e-9);
        }
    }

    #[test]
    fn prop_grid_is_deterministic_and_bounded(
        start in 0.001f64..10.0,
        span in 1.01f64..1000.0,
        points in 2usize..200,
        log in any::<bool>(),
    ) {
        let stop = start * span;
        let grid = if log {
            FrequencyGrid::logarithmic(start, stop, points)
        } else {
            FrequencyGrid::linear(start, stop, points)
        };
        let first = grid.to_vec().unwrap();
        let second = grid.to_vec().unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), points);
        prop_assert_eq!(first[0], start);
        prop_assert_eq!(first[points - 1], stop);
        prop_assert!(first.windows(2).all(|w| w[0] < w[1]));
    }
}

//! What-if policy scenario simulation.
//!
//! A deterministic transform over the current city summary: no persisted
//! state, no randomness. Baselines are valley-wide means of the summary's
//! non-null metrics; nulls propagate through scenario and delta untouched.

use chrono::{DateTime, Utc};

use crate::models::{
    CitySummary, SimulationInputs, SimulationMeta, SimulationMetrics, SimulationPayload,
};

// ---

/// Congestion multiplier applied while odd-even plates are enforced.
const ODD_EVEN_TRAFFIC_FACTOR: f64 = 0.85;
/// AQI multiplier applied while odd-even plates are enforced.
const ODD_EVEN_AQI_FACTOR: f64 = 0.9;
/// Fixed projection horizon reported in the payload metadata.
const HORIZON_HOURS: u32 = 24;

/// Projects the effect of removing `reduction_pct` percent of vehicles,
/// optionally combined with an odd-even plate policy.
///
/// `reduction_pct` is clamped to `[0, 100]`; the clamped value is echoed in
/// the payload's `inputs`.
pub fn run(
    summary: &[CitySummary],
    reduction_pct: f64,
    odd_even_enabled: bool,
    generated_at: DateTime<Utc>,
) -> SimulationPayload {
    // ---
    let reduction_pct = reduction_pct.clamp(0.0, 100.0);

    let baseline_aqi = mean(summary.iter().filter_map(|c| c.aqi));
    let baseline_traffic = mean(summary.iter().filter_map(|c| c.traffic));

    let vehicle_factor = 1.0 - reduction_pct / 100.0;
    let odd_even_traffic_factor = if odd_even_enabled {
        ODD_EVEN_TRAFFIC_FACTOR
    } else {
        1.0
    };
    let scenario_traffic =
        baseline_traffic.map(|t| t * vehicle_factor * odd_even_traffic_factor);

    // AQI responds to traffic reduction at half strength.
    let aqi_factor = 1.0 - (reduction_pct / 100.0) * 0.5;
    let odd_even_aqi_factor = if odd_even_enabled { ODD_EVEN_AQI_FACTOR } else { 1.0 };
    let scenario_aqi = baseline_aqi.map(|a| a * aqi_factor * odd_even_aqi_factor);

    SimulationPayload {
        inputs: SimulationInputs {
            reduction_pct,
            odd_even_enabled,
        },
        baseline: SimulationMetrics {
            aqi: baseline_aqi,
            traffic_congestion_index: baseline_traffic,
        },
        scenario: SimulationMetrics {
            aqi: scenario_aqi,
            traffic_congestion_index: scenario_traffic,
        },
        delta: SimulationMetrics {
            aqi: delta(scenario_aqi, baseline_aqi),
            traffic_congestion_index: delta(scenario_traffic, baseline_traffic),
        },
        meta: SimulationMeta {
            generated_at,
            horizon_hours: HORIZON_HOURS,
        },
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    // ---
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / f64::from(count))
}

fn delta(scenario: Option<f64>, baseline: Option<f64>) -> Option<f64> {
    // ---
    match (scenario, baseline) {
        (Some(s), Some(b)) => Some(s - b),
        _ => None,
    }
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use chrono::TimeZone;

    use super::*;

    fn entry(city: &str, aqi: Option<f64>, traffic: Option<f64>) -> CitySummary {
        CitySummary {
            city: city.to_string(),
            aqi,
            traffic,
            last_update: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn baselines_average_only_non_null_metrics() {
        // ---
        let summary = vec![
            entry("Kathmandu", Some(160.0), Some(0.8)),
            entry("Lalitpur", Some(140.0), None),
            entry("Bhaktapur", None, None),
        ];

        let result = run(&summary, 0.0, false, now());

        assert_eq!(result.baseline.aqi, Some(150.0));
        assert_eq!(result.baseline.traffic_congestion_index, Some(0.8));
        // Zero reduction without odd-even leaves the scenario at baseline.
        assert_eq!(result.scenario.aqi, Some(150.0));
        assert_eq!(result.delta.aqi, Some(0.0));
    }

    #[test]
    fn fifty_percent_reduction_with_odd_even_matches_known_projection() {
        // ---
        let summary = vec![entry("Kathmandu", Some(160.0), Some(0.8))];

        let result = run(&summary, 50.0, true, now());

        // 0.80 * 0.5 * 0.85 = 0.34
        let traffic = result.scenario.traffic_congestion_index.unwrap();
        assert!((traffic - 0.34).abs() < 1e-9);

        // 160 * 0.75 * 0.9 = 108
        let aqi = result.scenario.aqi.unwrap();
        assert!((aqi - 108.0).abs() < 1e-9);

        let traffic_delta = result.delta.traffic_congestion_index.unwrap();
        assert!((traffic_delta - (0.34 - 0.8)).abs() < 1e-9);
    }

    #[test]
    fn reduction_above_hundred_clamps_to_hundred() {
        // ---
        let summary = vec![entry("Kathmandu", Some(160.0), Some(0.8))];

        let clamped = run(&summary, 150.0, false, now());
        let full = run(&summary, 100.0, false, now());

        assert_eq!(clamped, full);
        assert_eq!(clamped.inputs.reduction_pct, 100.0);
        assert_eq!(clamped.scenario.traffic_congestion_index, Some(0.0));
    }

    #[test]
    fn negative_reduction_clamps_to_zero() {
        // ---
        let summary = vec![entry("Kathmandu", Some(160.0), Some(0.8))];

        let result = run(&summary, -25.0, false, now());

        assert_eq!(result.inputs.reduction_pct, 0.0);
        assert_eq!(result.scenario.traffic_congestion_index, Some(0.8));
    }

    #[test]
    fn missing_metric_propagates_null_through_scenario_and_delta() {
        // ---
        let summary = vec![
            entry("Kathmandu", Some(160.0), None),
            entry("Lalitpur", Some(140.0), None),
        ];

        let result = run(&summary, 30.0, true, now());

        assert_eq!(result.baseline.traffic_congestion_index, None);
        assert_eq!(result.scenario.traffic_congestion_index, None);
        assert_eq!(result.delta.traffic_congestion_index, None);
        assert!(result.scenario.aqi.is_some());
    }

    #[test]
    fn payload_echoes_clamped_inputs_and_fixed_horizon() {
        // ---
        let result = run(&[], 120.0, true, now());

        assert_eq!(result.inputs.reduction_pct, 100.0);
        assert!(result.inputs.odd_even_enabled);
        assert_eq!(result.meta.horizon_hours, 24);
        assert_eq!(result.meta.generated_at, now());
        // Empty summary: everything null.
        assert_eq!(result.baseline.aqi, None);
        assert_eq!(result.scenario.aqi, None);
        assert_eq!(result.delta.aqi, None);
    }
}

use std::time::Duration;

use crate::models::dsl_model::Stage;

/// Sum of all stage durations, `None` if it does not fit in a `Duration`.
pub fn total_duration(stages: &[Stage]) -> Option<Duration> {
    stages
        .iter()
        .try_fold(Duration::ZERO, |total, stage| total.checked_add(stage.duration))
}

/// Virtual users wanted at `elapsed`, interpolated linearly between stage
/// targets starting from zero. `None` once every stage has run.
pub fn target_vus(stages: &[Stage], elapsed: Duration) -> Option<u64> {
    let mut stage_start = Duration::ZERO;
    let mut previous = 0u64;

    for stage in stages {
        let stage_end = stage_start.saturating_add(stage.duration);
        if elapsed < stage_end {
            let progress = (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
            let from = previous as f64;
            let to = stage.target as f64;
            return Some((from + (to - from) * progress).floor() as u64);
        }
        stage_start = stage_end;
        previous = stage.target;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dsl_model::default_stages;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn default_profile_ramps_to_five_then_twenty() {
        let stages = default_stages();
        assert_eq!(total_duration(&stages), Some(Duration::from_secs(25)));

        assert_eq!(target_vus(&stages, Duration::ZERO), Some(0));
        assert_eq!(target_vus(&stages, ms(2_000)), Some(1));
        assert_eq!(target_vus(&stages, ms(9_999)), Some(4));
        assert_eq!(target_vus(&stages, ms(10_000)), Some(5));
        assert_eq!(target_vus(&stages, ms(17_500)), Some(12));
        assert_eq!(target_vus(&stages, ms(24_999)), Some(19));
        assert_eq!(target_vus(&stages, ms(25_000)), None);
    }

    #[test]
    fn ramps_down() {
        let stages = vec![Stage::new(ms(1_000), 10), Stage::new(ms(1_000), 0)];
        assert_eq!(target_vus(&stages, ms(1_500)), Some(5));
        assert_eq!(target_vus(&stages, ms(1_750)), Some(2));
    }

    #[test]
    fn zero_length_stage_jumps_to_target() {
        let stages = vec![Stage::new(Duration::ZERO, 4), Stage::new(ms(1_000), 4)];
        assert_eq!(target_vus(&stages, Duration::ZERO), Some(4));
        assert_eq!(target_vus(&stages, ms(999)), Some(4));
    }

    #[test]
    fn no_stages_means_nothing_to_run() {
        assert_eq!(target_vus(&[], Duration::ZERO), None);
    }

    #[test]
    fn huge_stages_do_not_overflow() {
        let huge = Duration::from_secs(u64::MAX);
        let stages = vec![Stage::new(huge, 2), Stage::new(huge, 2)];
        assert_eq!(total_duration(&stages), None);
        assert_eq!(target_vus(&stages, ms(1_000)), Some(0));
        assert_eq!(target_vus(&stages, huge), Some(2));
    }
}

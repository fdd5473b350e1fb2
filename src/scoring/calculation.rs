use tracing::debug;

/// All scoring multipliers, externally configurable. Defaults are the
/// production values; `from_env` lets deployments override any of them.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub base: f64,
    pub time_multiplier: f64,
    pub combo_multiplier: f64,
    pub perfect_bonus: f64,
    pub mistake_penalty: f64,
    pub hint_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base: 1000.0,
            time_multiplier: 5.0,
            combo_multiplier: 50.0,
            perfect_bonus: 500.0,
            mistake_penalty: 100.0,
            hint_penalty: 200.0,
        }
    }
}

impl ScoringConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base: env_f64("SCORING_BASE", defaults.base),
            time_multiplier: env_f64("SCORING_TIME_MULTIPLIER", defaults.time_multiplier),
            combo_multiplier: env_f64("SCORING_COMBO_MULTIPLIER", defaults.combo_multiplier),
            perfect_bonus: env_f64("SCORING_PERFECT_BONUS", defaults.perfect_bonus),
            mistake_penalty: env_f64("SCORING_MISTAKE_PENALTY", defaults.mistake_penalty),
            hint_penalty: env_f64("SCORING_HINT_PENALTY", defaults.hint_penalty),
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

/// Signals of one submitted play attempt.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput {
    pub width: i32,
    pub height: i32,
    pub elapsed_ms: i64,
    pub mistakes: i32,
    pub used_hints: i32,
    pub combo_count: i32,
    pub difficulty_weight: f64,
}

/// Full score breakdown. Identical inputs always produce an identical
/// breakdown; there is no hidden state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub base_score: f64,
    pub target_time_ms: i64,
    pub time_bonus: f64,
    pub combo_bonus: f64,
    pub perfect_bonus: f64,
    pub penalty: f64,
    pub perfect_clear: bool,
    pub final_score: i64,
}

/// Pure scoring function.
///
/// finalScore = max(0, base*difficultyWeight + timeBonus + comboBonus
///                     + perfectBonus - penalty)
/// with a per-cell time budget of one second: targetTime = width*height*1000.
pub fn calculate_score(input: &ScoreInput, config: &ScoringConfig) -> ScoreBreakdown {
    let target_time_ms = input.width as i64 * input.height as i64 * 1000;

    let base_score = config.base * input.difficulty_weight;

    let remaining_s = (target_time_ms - input.elapsed_ms) as f64 / 1000.0;
    let time_bonus = remaining_s.max(0.0) * config.time_multiplier;

    let combo_bonus = input.combo_count as f64 * config.combo_multiplier;

    let perfect_clear = input.mistakes == 0;
    let perfect_bonus = if perfect_clear { config.perfect_bonus } else { 0.0 };

    let penalty = input.mistakes as f64 * config.mistake_penalty
        + input.used_hints as f64 * config.hint_penalty;

    let total = base_score + time_bonus + combo_bonus + perfect_bonus - penalty;
    let final_score = total.max(0.0).round() as i64;

    debug!(
        base_score,
        time_bonus, combo_bonus, perfect_bonus, penalty, final_score, "Score calculated"
    );

    ScoreBreakdown {
        base_score,
        target_time_ms,
        time_bonus,
        combo_bonus,
        perfect_bonus,
        penalty,
        perfect_clear,
        final_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ScoreInput {
        ScoreInput {
            width: 10,
            height: 10,
            elapsed_ms: 60_000,
            mistakes: 0,
            used_hints: 0,
            combo_count: 0,
            difficulty_weight: 1.0,
        }
    }

    #[test]
    fn identical_inputs_identical_breakdown() {
        let config = ScoringConfig::default();
        let a = calculate_score(&input(), &config);
        let b = calculate_score(&input(), &config);
        assert_eq!(a, b);
    }

    #[test]
    fn never_negative() {
        let config = ScoringConfig::default();
        let result = calculate_score(
            &ScoreInput {
                elapsed_ms: 10_000_000,
                mistakes: 50,
                used_hints: 50,
                difficulty_weight: 0.5,
                combo_count: 0,
                ..input()
            },
            &config,
        );
        assert_eq!(result.final_score, 0);
    }

    #[test]
    fn overtime_play_with_combo_and_perfect_clear() {
        // 10x10 -> targetTime = 100000ms; elapsed 500000ms -> timeBonus 0.
        let config = ScoringConfig::default();
        let result = calculate_score(
            &ScoreInput {
                elapsed_ms: 500_000,
                combo_count: 3,
                difficulty_weight: 2.0,
                ..input()
            },
            &config,
        );
        assert_eq!(result.time_bonus, 0.0);
        assert!(result.perfect_clear);
        let expected = config.base * 2.0 + 3.0 * config.combo_multiplier + config.perfect_bonus;
        assert_eq!(result.final_score, expected.round() as i64);
    }

    #[test]
    fn time_bonus_scales_with_remaining_budget() {
        let config = ScoringConfig::default();
        // 40 seconds under the 100-second budget.
        let result = calculate_score(&input(), &config);
        assert_eq!(result.target_time_ms, 100_000);
        assert_eq!(result.time_bonus, 40.0 * config.time_multiplier);
    }

    #[test]
    fn mistakes_forfeit_perfect_bonus_and_add_penalty() {
        let config = ScoringConfig::default();
        let clean = calculate_score(&input(), &config);
        let flawed = calculate_score(&ScoreInput { mistakes: 2, ..input() }, &config);
        assert!(!flawed.perfect_clear);
        assert_eq!(flawed.perfect_bonus, 0.0);
        let expected_drop = config.perfect_bonus + 2.0 * config.mistake_penalty;
        assert_eq!(clean.final_score - flawed.final_score, expected_drop as i64);
    }

    #[test]
    fn hints_are_penalized() {
        let config = ScoringConfig::default();
        let clean = calculate_score(&input(), &config);
        let hinted = calculate_score(&ScoreInput { used_hints: 1, ..input() }, &config);
        assert_eq!(
            clean.final_score - hinted.final_score,
            config.hint_penalty as i64
        );
    }
}

//! Threshold sets shared by unit tests.
use crate::core::thresholds::{ThresholdSet, THRESHOLDS_PER_CHANNEL};

pub const SCENARIO_INPUTS: [f32; 24] = [
    0.5527185, 0.39846906, -0.11766014, 0.19299345, -0.38549745, 0.08441927, 0.26880047, 0.42681944,
    -0.10539523, -0.02164167, 0.41527015, -0.09802981, -0.07409753, -0.41598308, 0.09711669,
    -0.11594991, -0.4557323, 0.27337435, -0.11517189, 0.37859723, -0.15901394, 0.29185423, -0.344608,
    0.08293352,
];

pub const SCENARIO_CODES: [i8; 24] = [
    23, 17, -5, 8, -16, 4, 11, 18, -4, -1, 17, -4, -3, -17, 4, -5, -19, 11, -5, 16, -7, 12, -14, 3,
];

/// 24 channels whose thresholds put each scenario input exactly
/// `code + 128` thresholds above the bottom of its channel.
pub fn scenario_thresholds() -> ThresholdSet {
    let mut values = Vec::with_capacity(24 * THRESHOLDS_PER_CHANNEL);
    for (&input, &code) in SCENARIO_INPUTS.iter().zip(SCENARIO_CODES.iter()) {
        let below = (code as i32 + 128) as usize;
        for i in 0..THRESHOLDS_PER_CHANNEL {
            let offset = i as f32 - below as f32;
            // Thresholds below the input end at -1e-3, the rest start at +1e-3.
            let t = if i < below {
                input + offset * 1e-3
            } else {
                input + (offset + 1.0) * 1e-3
            };
            values.push(t);
        }
    }
    ThresholdSet::new(values, 24).unwrap()
}

/// Channels with irregular, partially repeated spacing.
pub fn irregular_thresholds(channels: usize, seed: u64) -> ThresholdSet {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut values = Vec::with_capacity(channels * THRESHOLDS_PER_CHANNEL);
    for _ in 0..channels {
        let mut t = rng.gen_range(-3.0f32..0.0);
        for _ in 0..THRESHOLDS_PER_CHANNEL {
            values.push(t);
            // Some steps are zero to exercise ties.
            if rng.gen_bool(0.9) {
                t += rng.gen_range(0.001f32..0.05);
            }
        }
    }
    ThresholdSet::new(values, channels).unwrap()
}

pub fn random_inputs(len: usize, seed: u64) -> Vec<f32> {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-4.0f32..8.0)).collect()
}

/// Channels with irregular but strictly increasing spacing of at least
/// 0.002, so every threshold owns a slot at 3 or more digits.
pub fn spread_thresholds(channels: usize, seed: u64) -> ThresholdSet {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut values = Vec::with_capacity(channels * THRESHOLDS_PER_CHANNEL);
    for _ in 0..channels {
        let mut t = rng.gen_range(-3.0f32..0.0);
        for _ in 0..THRESHOLDS_PER_CHANNEL {
            values.push(t);
            t += rng.gen_range(0.002f32..0.05);
        }
    }
    ThresholdSet::new(values, channels).unwrap()
}

//! Gain tables of the standard 9/7 and 5/3 kernels, indexed by decomposition
//! level (0..=33).
//!
//! The square-root energy gains size irreversible quantization step sizes;
//! the BIBO gains bound the dynamic range growth used to size guard bits for
//! reversible coding.

const NUM_LEVELS: usize = 34;

const SQRT_ENERGY_9X7_L: [f32; NUM_LEVELS] = [
    1.0000e+00, 1.4021e+00, 2.0304e+00, 2.9012e+00, 4.1153e+00, 5.8245e+00, 8.2388e+00,
    1.1652e+01, 1.6479e+01, 2.3304e+01, 3.2957e+01, 4.6609e+01, 6.5915e+01, 9.3217e+01,
    1.3183e+02, 1.8643e+02, 2.6366e+02, 3.7287e+02, 5.2732e+02, 7.4574e+02, 1.0546e+03,
    1.4915e+03, 2.1093e+03, 2.9830e+03, 4.2185e+03, 5.9659e+03, 8.4371e+03, 1.1932e+04,
    1.6874e+04, 2.3864e+04, 3.3748e+04, 4.7727e+04, 6.7496e+04, 9.5454e+04,
];

const SQRT_ENERGY_9X7_H: [f32; NUM_LEVELS] = [
    1.4425e+00, 1.9669e+00, 2.8839e+00, 4.1475e+00, 5.8946e+00, 8.3472e+00, 1.1809e+01,
    1.6701e+01, 2.3620e+01, 3.3403e+01, 4.7240e+01, 6.6807e+01, 9.4479e+01, 1.3361e+02,
    1.8896e+02, 2.6723e+02, 3.7792e+02, 5.3446e+02, 7.5583e+02, 1.0689e+03, 1.5117e+03,
    2.1378e+03, 3.0233e+03, 4.2756e+03, 6.0467e+03, 8.5513e+03, 1.2093e+04, 1.7103e+04,
    2.4187e+04, 3.4205e+04, 4.8373e+04, 6.8410e+04, 9.6747e+04, 1.3682e+05,
];

const SQRT_ENERGY_5X3_L: [f32; NUM_LEVELS] = [
    1.0000e+00, 1.2247e+00, 1.3229e+00, 1.5411e+00, 1.7139e+00, 1.9605e+00, 2.2044e+00,
    2.5047e+00, 2.8277e+00, 3.2049e+00, 3.6238e+00, 4.1033e+00, 4.6423e+00, 5.2548e+00,
    5.9462e+00, 6.7299e+00, 7.6159e+00, 8.6193e+00, 9.7544e+00, 1.1039e+01, 1.2493e+01,
    1.4139e+01, 1.6001e+01, 1.8108e+01, 2.0493e+01, 2.3192e+01, 2.6246e+01, 2.9702e+01,
    3.3614e+01, 3.8041e+01, 4.3051e+01, 4.8721e+01, 5.5138e+01, 6.2399e+01,
];

const SQRT_ENERGY_5X3_H: [f32; NUM_LEVELS] = [
    1.0458e+00, 1.3975e+00, 1.4389e+00, 1.7287e+00, 1.8880e+00, 2.1841e+00, 2.4392e+00,
    2.7830e+00, 3.1341e+00, 3.5576e+00, 4.0188e+00, 4.5532e+00, 5.1494e+00, 5.8301e+00,
    6.5963e+00, 7.4663e+00, 8.4489e+00, 9.5623e+00, 1.0821e+01, 1.2247e+01, 1.3860e+01,
    1.5685e+01, 1.7751e+01, 2.0089e+01, 2.2735e+01, 2.5729e+01, 2.9117e+01, 3.2952e+01,
    3.7292e+01, 4.2203e+01, 4.7761e+01, 5.4051e+01, 6.1170e+01, 6.9226e+01,
];

const BIBO_9X7_L: [f32; NUM_LEVELS] = [
    1.0000e+00, 1.3803e+00, 1.3328e+00, 1.3067e+00, 1.3028e+00, 1.3001e+00, 1.2993e+00,
    1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00,
    1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00,
    1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00,
    1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00, 1.2992e+00,
];

const BIBO_9X7_H: [f32; NUM_LEVELS] = [
    1.2976e+00, 1.3126e+00, 1.2757e+00, 1.2352e+00, 1.2312e+00, 1.2285e+00, 1.2280e+00,
    1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00,
    1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00,
    1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00,
    1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00, 1.2278e+00,
];

const BIBO_5X3_L: [f32; NUM_LEVELS] = [
    1.0000e+00, 1.5000e+00, 1.6250e+00, 1.6875e+00, 1.6963e+00, 1.7067e+00, 1.7116e+00,
    1.7129e+00, 1.7141e+00, 1.7145e+00, 1.7151e+00, 1.7152e+00, 1.7155e+00, 1.7155e+00,
    1.7156e+00, 1.7156e+00, 1.7156e+00, 1.7156e+00, 1.7156e+00, 1.7156e+00, 1.7156e+00,
    1.7156e+00, 1.7156e+00, 1.7156e+00, 1.7156e+00, 1.7156e+00, 1.7156e+00, 1.7156e+00,
    1.7156e+00, 1.7156e+00, 1.7156e+00, 1.7156e+00, 1.7156e+00, 1.7156e+00,
];

const BIBO_5X3_H: [f32; NUM_LEVELS] = [
    2.0000e+00, 2.5000e+00, 2.7500e+00, 2.8047e+00, 2.8198e+00, 2.8410e+00, 2.8558e+00,
    2.8601e+00, 2.8628e+00, 2.8656e+00, 2.8662e+00, 2.8667e+00, 2.8669e+00, 2.8670e+00,
    2.8671e+00, 2.8671e+00, 2.8671e+00, 2.8671e+00, 2.8671e+00, 2.8671e+00, 2.8671e+00,
    2.8671e+00, 2.8671e+00, 2.8671e+00, 2.8671e+00, 2.8671e+00, 2.8671e+00, 2.8671e+00,
    2.8671e+00, 2.8671e+00, 2.8671e+00, 2.8671e+00, 2.8671e+00, 2.8671e+00,
];

fn lookup(table: &[f32; NUM_LEVELS], level: u32) -> f32 {
    table[(level as usize).min(NUM_LEVELS - 1)]
}

pub fn sqrt_energy_gain_l(level: u32, reversible: bool) -> f32 {
    lookup(
        if reversible { &SQRT_ENERGY_5X3_L } else { &SQRT_ENERGY_9X7_L },
        level,
    )
}

pub fn sqrt_energy_gain_h(level: u32, reversible: bool) -> f32 {
    lookup(
        if reversible { &SQRT_ENERGY_5X3_H } else { &SQRT_ENERGY_9X7_H },
        level,
    )
}

pub fn bibo_gain_l(level: u32, reversible: bool) -> f32 {
    lookup(if reversible { &BIBO_5X3_L } else { &BIBO_9X7_L }, level)
}

pub fn bibo_gain_h(level: u32, reversible: bool) -> f32 {
    lookup(if reversible { &BIBO_5X3_H } else { &BIBO_9X7_H }, level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_monotone_where_expected() {
        for level in 1..NUM_LEVELS as u32 {
            assert!(sqrt_energy_gain_l(level, false) > sqrt_energy_gain_l(level - 1, false));
            assert!(sqrt_energy_gain_l(level, true) > sqrt_energy_gain_l(level - 1, true));
            assert!(bibo_gain_l(level, true) >= bibo_gain_l(level - 1, true));
        }
    }

    #[test]
    fn test_lookup_clamps_level() {
        assert_eq!(bibo_gain_h(40, true), 2.8671);
        assert_eq!(sqrt_energy_gain_h(0, false), 1.4425);
    }
}

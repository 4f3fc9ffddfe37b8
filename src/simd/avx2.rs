#[cfg(target_arch = "x86")]
use std::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
use super::{scalar, IndexParams, LANES};

/// Packed table-slot computation (AVX2 + FMA)
/// Logic:
/// 1. _mm256_fmadd_ps (value * scale + shift, single rounding like f32::mul_add)
/// 2. _mm256_floor_ps
/// 3. _mm256_max_ps against zero (NaN lanes take the second operand, 0)
/// 4. _mm256_min_ps against `last`, then truncating convert to i32
/// A tail shorter than 8 lanes goes through the scalar path.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[target_feature(enable = "avx2", enable = "fma")]
pub unsafe fn fill_indices_avx2(params: &IndexParams, inputs: &[f32], out: &mut [u32]) {
    let n = inputs.len().min(out.len());
    let scale = _mm256_set1_ps(params.scale);
    let shift = _mm256_set1_ps(params.shift);
    let zero = _mm256_setzero_ps();
    let last = _mm256_set1_ps(params.last as f32);

    let mut i = 0;
    while i + LANES <= n {
        let v = _mm256_loadu_ps(inputs.as_ptr().add(i));
        let pos = _mm256_floor_ps(_mm256_fmadd_ps(v, scale, shift));
        let clamped = _mm256_min_ps(_mm256_max_ps(pos, zero), last);
        let idx = _mm256_cvttps_epi32(clamped);
        _mm256_storeu_si256(out.as_mut_ptr().add(i) as *mut __m256i, idx);
        i += LANES;
    }

    scalar::fill_indices(params, &inputs[i..n], &mut out[i..n]);
}

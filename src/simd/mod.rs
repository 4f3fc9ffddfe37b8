pub mod avx2;
pub mod scalar;

use crate::core::hardware::CpuFeatures;

/// Values handled per step by the vectorized lookup.
pub const LANES: usize = 8;

/// Affine map from a value to a table slot: `floor(value * scale + shift)`,
/// clamped to `[0, last]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexParams {
    pub scale: f32,
    pub shift: f32,
    pub last: u32,
}

pub type IndexFunc = unsafe fn(&IndexParams, &[f32], &mut [u32]);

/// Batch index computation strategy. Every kernel produces the same indices
/// for the same inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKernel {
    Scalar,
    /// 8 lanes of packed FMA + floor. Requires AVX2 and FMA.
    Avx2,
}

impl IndexKernel {
    pub fn detect() -> Self {
        if CpuFeatures::detect().vector_lookup() {
            IndexKernel::Avx2
        } else {
            IndexKernel::Scalar
        }
    }

    /// Batch lengths this kernel accepts must be a multiple of this.
    pub fn lanes(self) -> usize {
        match self {
            IndexKernel::Scalar => 1,
            IndexKernel::Avx2 => LANES,
        }
    }

    pub fn func(self) -> IndexFunc {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            if self == IndexKernel::Avx2
                && is_x86_feature_detected!("avx2")
                && is_x86_feature_detected!("fma")
            {
                return avx2::fill_indices_avx2;
            }
        }

        // Fallback
        wrapper_scalar
    }

    /// Writes one index per input into `out[..inputs.len()]`.
    pub fn fill_indices(self, params: &IndexParams, inputs: &[f32], out: &mut [u32]) {
        assert!(out.len() >= inputs.len());
        let func = self.func();
        // SAFETY: `func` only returns the AVX2 kernel after runtime detection.
        unsafe { func(params, inputs, out) }
    }
}

unsafe fn wrapper_scalar(params: &IndexParams, inputs: &[f32], out: &mut [u32]) {
    scalar::fill_indices(params, inputs, out)
}

/// Hardware Detection Module
/// Queries CPU features at runtime.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuFeatures {
    pub avx2: bool,
    pub fma: bool,
    pub logical_cores: usize,
}

impl CpuFeatures {
    pub fn detect() -> Self {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        let (avx2, fma) = (
            is_x86_feature_detected!("avx2"),
            is_x86_feature_detected!("fma"),
        );
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        let (avx2, fma) = (false, false);

        let logical_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            avx2,
            fma,
            logical_cores,
        }
    }

    /// The 8-lane lookup kernel needs packed FMA and floor.
    pub fn vector_lookup(&self) -> bool {
        self.avx2 && self.fma
    }
}

use super::IndexParams;

/// Table slot for `value`.
///
/// Uses a fused multiply-add so the packed kernel rounds identically. The
/// position is clamped before the cast; `max` maps NaN to slot 0.
#[inline(always)]
pub fn lookup_index(params: &IndexParams, value: f32) -> usize {
    let pos = value.mul_add(params.scale, params.shift).floor();
    pos.max(0.0).min(params.last as f32) as usize
}

pub fn fill_indices(params: &IndexParams, inputs: &[f32], out: &mut [u32]) {
    for (slot, &value) in out.iter_mut().zip(inputs) {
        *slot = lookup_index(params, value) as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_index_guards_cast() {
        let params = IndexParams {
            scale: 10.0,
            shift: 5.0,
            last: 15,
        };
        assert_eq!(lookup_index(&params, -0.5), 0);
        assert_eq!(lookup_index(&params, 0.0), 5);
        assert_eq!(lookup_index(&params, 0.25), 7);
        assert_eq!(lookup_index(&params, 1.0), 15);
        assert_eq!(lookup_index(&params, -100.0), 0);
        assert_eq!(lookup_index(&params, 100.0), 15);
        assert_eq!(lookup_index(&params, f32::NAN), 0);
        assert_eq!(lookup_index(&params, f32::INFINITY), 15);
        assert_eq!(lookup_index(&params, f32::NEG_INFINITY), 0);
    }
}

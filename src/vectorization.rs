/*
    weighted blend kernels used by the orchestrator.

    each public entry point picks a simd path at runtime (avx on x86-64, neon
    on aarch64) and falls back to scalar code everywhere else. the vector
    paths only use separate multiplies and adds, no fused multiply-add, so for
    finite inputs every path returns bit-identical results to the scalar one.
*/

use crate::pool::ThreadPool;

// samples per pool task for the parallel wrappers
const BLEND_CHUNK: usize = 16 * 1024;

#[inline]
fn clamp01(value: f32) -> f32 {
    // max/min rather than clamp, NaN collapses to 0 like the vector max does
    value.max(0.0).min(1.0)
}

// --- scalar fallbacks ---

fn blend2_scalar(dst: &mut [f32], a: &[f32], b: &[f32], wa: f32, wb: f32) {
    for ((d, &x), &y) in dst.iter_mut().zip(a).zip(b) {
        *d = clamp01(wa * x + wb * y);
    }
}

#[allow(clippy::too_many_arguments)]
fn blend3_scalar(dst: &mut [f32], a: &[f32], b: &[f32], c: &[f32], wa: f32, wb: f32, wc: f32) {
    for (((d, &x), &y), &z) in dst.iter_mut().zip(a).zip(b).zip(c) {
        *d = clamp01(wa * x + wb * y + wc * z);
    }
}

// --- common interface ---

/// `dst[i] = clamp(wa * a[i] + wb * b[i], 0, 1)`.
///
/// # Panics
///
/// If the slices differ in length.
pub fn blend2_clamped(dst: &mut [f32], a: &[f32], b: &[f32], wa: f32, wb: f32) {
    assert_eq!(dst.len(), a.len(), "blend inputs differ in length");
    assert_eq!(dst.len(), b.len(), "blend inputs differ in length");

    #[cfg(target_arch = "x86_64")]
    {
        if crate::cpu_caps::has_avx2() {
            // SAFETY: avx support was detected at runtime, lengths checked above
            unsafe { x86_64_simd::blend2_avx(dst, a, b, wa, wb) };
            return;
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        if crate::cpu_caps::has_neon() {
            // SAFETY: neon support was detected at runtime, lengths checked above
            unsafe { aarch64_neon::blend2_neon(dst, a, b, wa, wb) };
            return;
        }
    }

    blend2_scalar(dst, a, b, wa, wb);
}

/// `dst[i] = clamp(wa * a[i] + wb * b[i] + wc * c[i], 0, 1)`.
///
/// # Panics
///
/// If the slices differ in length.
#[allow(clippy::too_many_arguments)]
pub fn blend3_clamped(dst: &mut [f32], a: &[f32], b: &[f32], c: &[f32], wa: f32, wb: f32, wc: f32) {
    assert_eq!(dst.len(), a.len(), "blend inputs differ in length");
    assert_eq!(dst.len(), b.len(), "blend inputs differ in length");
    assert_eq!(dst.len(), c.len(), "blend inputs differ in length");

    #[cfg(target_arch = "x86_64")]
    {
        if crate::cpu_caps::has_avx2() {
            // SAFETY: avx support was detected at runtime, lengths checked above
            unsafe { x86_64_simd::blend3_avx(dst, a, b, c, wa, wb, wc) };
            return;
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        if crate::cpu_caps::has_neon() {
            // SAFETY: neon support was detected at runtime, lengths checked above
            unsafe { aarch64_neon::blend3_neon(dst, a, b, c, wa, wb, wc) };
            return;
        }
    }

    blend3_scalar(dst, a, b, c, wa, wb, wc);
}

/// [`blend2_clamped`] split across the pool.
pub fn par_blend2_clamped(pool: &ThreadPool, dst: &mut [f32], a: &[f32], b: &[f32], wa: f32, wb: f32) {
    assert_eq!(dst.len(), a.len(), "blend inputs differ in length");
    assert_eq!(dst.len(), b.len(), "blend inputs differ in length");

    pool.parallel_chunks_mut(dst, BLEND_CHUNK, |index, out| {
        let start = index * BLEND_CHUNK;
        let end = start + out.len();
        blend2_clamped(out, &a[start..end], &b[start..end], wa, wb);
    });
}

/// [`blend3_clamped`] split across the pool.
#[allow(clippy::too_many_arguments)]
pub fn par_blend3_clamped(
    pool: &ThreadPool,
    dst: &mut [f32],
    a: &[f32],
    b: &[f32],
    c: &[f32],
    wa: f32,
    wb: f32,
    wc: f32,
) {
    assert_eq!(dst.len(), a.len(), "blend inputs differ in length");
    assert_eq!(dst.len(), b.len(), "blend inputs differ in length");
    assert_eq!(dst.len(), c.len(), "blend inputs differ in length");

    pool.parallel_chunks_mut(dst, BLEND_CHUNK, |index, out| {
        let start = index * BLEND_CHUNK;
        let end = start + out.len();
        blend3_clamped(out, &a[start..end], &b[start..end], &c[start..end], wa, wb, wc);
    });
}

#[cfg(target_arch = "x86_64")]
pub mod x86_64_simd {
    use std::arch::x86_64::*;

    const LANES: usize = 8;

    /// # Safety
    ///
    /// The CPU must support AVX and all slices must have the same length.
    #[target_feature(enable = "avx")]
    pub unsafe fn blend2_avx(dst: &mut [f32], a: &[f32], b: &[f32], wa: f32, wb: f32) {
        let len = dst.len();
        let body = len - len % LANES;
        let (vwa, vwb) = (_mm256_set1_ps(wa), _mm256_set1_ps(wb));
        let (zero, one) = (_mm256_setzero_ps(), _mm256_set1_ps(1.0));

        let mut i = 0;
        while i < body {
            let x = _mm256_loadu_ps(a.as_ptr().add(i));
            let y = _mm256_loadu_ps(b.as_ptr().add(i));
            let sum = _mm256_add_ps(_mm256_mul_ps(vwa, x), _mm256_mul_ps(vwb, y));
            let clamped = _mm256_min_ps(_mm256_max_ps(sum, zero), one);
            _mm256_storeu_ps(dst.as_mut_ptr().add(i), clamped);
            i += LANES;
        }
        super::blend2_scalar(&mut dst[body..], &a[body..], &b[body..], wa, wb);
    }

    /// # Safety
    ///
    /// The CPU must support AVX and all slices must have the same length.
    #[target_feature(enable = "avx")]
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn blend3_avx(
        dst: &mut [f32],
        a: &[f32],
        b: &[f32],
        c: &[f32],
        wa: f32,
        wb: f32,
        wc: f32,
    ) {
        let len = dst.len();
        let body = len - len % LANES;
        let (vwa, vwb, vwc) = (_mm256_set1_ps(wa), _mm256_set1_ps(wb), _mm256_set1_ps(wc));
        let (zero, one) = (_mm256_setzero_ps(), _mm256_set1_ps(1.0));

        let mut i = 0;
        while i < body {
            let x = _mm256_loadu_ps(a.as_ptr().add(i));
            let y = _mm256_loadu_ps(b.as_ptr().add(i));
            let z = _mm256_loadu_ps(c.as_ptr().add(i));
            let sum = _mm256_add_ps(_mm256_mul_ps(vwa, x), _mm256_mul_ps(vwb, y));
            let sum = _mm256_add_ps(sum, _mm256_mul_ps(vwc, z));
            let clamped = _mm256_min_ps(_mm256_max_ps(sum, zero), one);
            _mm256_storeu_ps(dst.as_mut_ptr().add(i), clamped);
            i += LANES;
        }
        super::blend3_scalar(&mut dst[body..], &a[body..], &b[body..], &c[body..], wa, wb, wc);
    }
}

#[cfg(target_arch = "aarch64")]
pub mod aarch64_neon {
    use std::arch::aarch64::*;

    const LANES: usize = 4;

    /// # Safety
    ///
    /// The CPU must support NEON and all slices must have the same length.
    #[target_feature(enable = "neon")]
    pub unsafe fn blend2_neon(dst: &mut [f32], a: &[f32], b: &[f32], wa: f32, wb: f32) {
        let len = dst.len();
        let body = len - len % LANES;
        let (vwa, vwb) = (vdupq_n_f32(wa), vdupq_n_f32(wb));
        let (zero, one) = (vdupq_n_f32(0.0), vdupq_n_f32(1.0));

        let mut i = 0;
        while i < body {
            let x = vld1q_f32(a.as_ptr().add(i));
            let y = vld1q_f32(b.as_ptr().add(i));
            let sum = vaddq_f32(vmulq_f32(vwa, x), vmulq_f32(vwb, y));
            vst1q_f32(dst.as_mut_ptr().add(i), vminq_f32(vmaxq_f32(sum, zero), one));
            i += LANES;
        }
        super::blend2_scalar(&mut dst[body..], &a[body..], &b[body..], wa, wb);
    }

    /// # Safety
    ///
    /// The CPU must support NEON and all slices must have the same length.
    #[target_feature(enable = "neon")]
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn blend3_neon(
        dst: &mut [f32],
        a: &[f32],
        b: &[f32],
        c: &[f32],
        wa: f32,
        wb: f32,
        wc: f32,
    ) {
        let len = dst.len();
        let body = len - len % LANES;
        let (vwa, vwb, vwc) = (vdupq_n_f32(wa), vdupq_n_f32(wb), vdupq_n_f32(wc));
        let (zero, one) = (vdupq_n_f32(0.0), vdupq_n_f32(1.0));

        let mut i = 0;
        while i < body {
            let x = vld1q_f32(a.as_ptr().add(i));
            let y = vld1q_f32(b.as_ptr().add(i));
            let z = vld1q_f32(c.as_ptr().add(i));
            let sum = vaddq_f32(vmulq_f32(vwa, x), vmulq_f32(vwb, y));
            let sum = vaddq_f32(sum, vmulq_f32(vwc, z));
            vst1q_f32(dst.as_mut_ptr().add(i), vminq_f32(vmaxq_f32(sum, zero), one));
            i += LANES;
        }
        super::blend3_scalar(&mut dst[body..], &a[body..], &b[body..], &c[body..], wa, wb, wc);
    }
}

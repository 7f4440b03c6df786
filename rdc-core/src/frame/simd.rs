//! Vectorized row comparison for the block differ.
//!
//! One primitive: do two equal-length byte slices differ? The scalar
//! path is the reference; the SSE2/AVX2/NEON paths are required to
//! return the exact same boolean for any input, so fast-path selection
//! is a host-capability concern that never changes detector output.
//!
//! The active implementation is resolved once per process and cached.

use std::sync::OnceLock;

/// Comparison function selected at runtime.
pub type RowCompareFn = fn(&[u8], &[u8]) -> bool;

/// Returns the fastest comparison routine the host supports.
pub fn resolve_row_compare() -> RowCompareFn {
    static RESOLVED: OnceLock<RowCompareFn> = OnceLock::new();
    *RESOLVED.get_or_init(|| {
        #[cfg(target_arch = "x86_64")]
        {
            if std::arch::is_x86_feature_detected!("avx2") {
                return rows_differ_avx2;
            }
            if std::arch::is_x86_feature_detected!("sse2") {
                return rows_differ_sse2;
            }
        }
        #[cfg(target_arch = "aarch64")]
        {
            if std::arch::is_aarch64_feature_detected!("neon") {
                return rows_differ_neon;
            }
        }
        rows_differ_scalar
    })
}

/// Portable reference implementation.
pub fn rows_differ_scalar(cur: &[u8], prev: &[u8]) -> bool {
    cur != prev
}

// ── x86_64 ───────────────────────────────────────────────────────

#[cfg(target_arch = "x86_64")]
fn rows_differ_sse2(cur: &[u8], prev: &[u8]) -> bool {
    debug_assert_eq!(cur.len(), prev.len());
    // SSE2 is part of the x86_64 baseline.
    unsafe { rows_differ_sse2_impl(cur, prev) }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn rows_differ_sse2_impl(cur: &[u8], prev: &[u8]) -> bool {
    use std::arch::x86_64::{__m128i, _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8};

    let len = cur.len();
    let mut offset = 0usize;
    while offset + 16 <= len {
        let a = unsafe { _mm_loadu_si128(cur.as_ptr().add(offset).cast::<__m128i>()) };
        let b = unsafe { _mm_loadu_si128(prev.as_ptr().add(offset).cast::<__m128i>()) };
        let equals = unsafe { _mm_cmpeq_epi8(a, b) };
        if unsafe { _mm_movemask_epi8(equals) } != 0xFFFF {
            return true;
        }
        offset += 16;
    }
    cur[offset..] != prev[offset..]
}

#[cfg(target_arch = "x86_64")]
fn rows_differ_avx2(cur: &[u8], prev: &[u8]) -> bool {
    debug_assert_eq!(cur.len(), prev.len());
    // Caller guarantees avx2 via resolve_row_compare.
    unsafe { rows_differ_avx2_impl(cur, prev) }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn rows_differ_avx2_impl(cur: &[u8], prev: &[u8]) -> bool {
    use std::arch::x86_64::{__m256i, _mm256_loadu_si256, _mm256_testz_si256, _mm256_xor_si256};

    let len = cur.len();
    let mut offset = 0usize;
    while offset + 32 <= len {
        let a = unsafe { _mm256_loadu_si256(cur.as_ptr().add(offset).cast::<__m256i>()) };
        let b = unsafe { _mm256_loadu_si256(prev.as_ptr().add(offset).cast::<__m256i>()) };
        let diff = unsafe { _mm256_xor_si256(a, b) };
        if unsafe { _mm256_testz_si256(diff, diff) } == 0 {
            return true;
        }
        offset += 32;
    }
    cur[offset..] != prev[offset..]
}

// ── aarch64 ──────────────────────────────────────────────────────

#[cfg(target_arch = "aarch64")]
fn rows_differ_neon(cur: &[u8], prev: &[u8]) -> bool {
    debug_assert_eq!(cur.len(), prev.len());
    // NEON is part of the aarch64 baseline.
    unsafe { rows_differ_neon_impl(cur, prev) }
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn rows_differ_neon_impl(cur: &[u8], prev: &[u8]) -> bool {
    use std::arch::aarch64::{veorq_u8, vld1q_u8, vmaxvq_u8};

    let len = cur.len();
    let mut offset = 0usize;
    while offset + 16 <= len {
        let a = unsafe { vld1q_u8(cur.as_ptr().add(offset)) };
        let b = unsafe { vld1q_u8(prev.as_ptr().add(offset)) };
        let diff = unsafe { veorq_u8(a, b) };
        if unsafe { vmaxvq_u8(diff) } != 0 {
            return true;
        }
        offset += 16;
    }
    cur[offset..] != prev[offset..]
}

// ── Tests ────────────────────────────────────────────────────────

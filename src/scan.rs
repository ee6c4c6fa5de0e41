//! SIMD-accelerated search for the `lea r??, [rip+disp32]; mov [r??], r??` instruction pair that
//! marks a constructor writing its vtable pointer into `this`.
//!
//! The 16-byte windowed compare with a wildcard mask is a performance detail; [`scan_scalar`] is
//! the reference behavior and [`scan_simd`] (on `x86_64`) must agree with it byte-for-byte. What
//! IS correctness, per the specification, are the two fixed opcode bytes the coarse scan matches
//! on and the four register/ModRM-encoding checks [`consistency_check`] performs on every hit.

/// The only two bytes the scan itself requires fixed: the `lea` and `mov` opcodes. Everything
/// else — REX prefixes, ModR/M bytes, `disp32` — is don't-care at this stage and re-checked
/// precisely (down to individual bits) by [`consistency_check`] once a candidate window is found.
///
/// Behind the `macros` feature this pair is produced by [`unihook_macros::pattern!`] from the
/// literal `?? 8D ?? ?? ?? ?? ?? ?? 89 ??` instead of being transcribed by hand; both forms are
/// byte-for-byte identical.
#[cfg(feature = "macros")]
const PATTERN_AND_MASK: (&[u8; 10], &[u8; 10]) =
    unihook_macros::pattern!(?? 8D ?? ?? ?? ?? ?? ?? 89 ??);

#[cfg(not(feature = "macros"))]
const PATTERN_AND_MASK: (&[u8; 10], &[u8; 10]) = (
    &[0x00, 0x8D, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x89, 0x00],
    &[0x00, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00],
);

const PATTERN: &[u8; 10] = PATTERN_AND_MASK.0;
const MASK: &[u8; 10] = PATTERN_AND_MASK.1;

/// A confirmed constructor-vtable-store site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtorPatternMatch {
    /// Offset of the first byte of the `lea` instruction within the scanned buffer.
    pub offset: usize,
    /// The `lea`'s `disp32`, i.e. the RIP-relative displacement to the vtable.
    pub disp32: i32,
}

/// Scans `text` for the full 10-byte pattern and returns every confirmed match, scanning with
/// SIMD on `x86_64` and falling back to the scalar path elsewhere (e.g. when running this crate's
/// test suite on a non-x86_64 development machine).
#[must_use]
pub fn scan_ctor_pattern(text: &[u8]) -> Vec<CtorPatternMatch> {
    #[cfg(target_arch = "x86_64")]
    {
        scan_simd(text)
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        scan_scalar(text)
    }
}

/// Byte-by-byte reference implementation: the single source of truth for match positions.
#[must_use]
pub fn scan_scalar(text: &[u8]) -> Vec<CtorPatternMatch> {
    let mut matches = Vec::new();
    if text.len() < PATTERN.len() {
        return matches;
    }

    let mut i = 0;
    while i + PATTERN.len() <= text.len() {
        let window = &text[i..i + PATTERN.len()];
        let bitwise_match = window
            .iter()
            .zip(PATTERN.iter().zip(MASK.iter()))
            .all(|(&w, (&p, &m))| (w & m) == (p & m));

        if bitwise_match {
            if let Some(disp32) = consistency_check(window) {
                matches.push(CtorPatternMatch { offset: i, disp32 });
            }
        }
        i += 1;
    }
    matches
}

/// `x86_64`-only SIMD search over 16-byte windows.
#[cfg(target_arch = "x86_64")]
#[must_use]
pub fn scan_simd(text: &[u8]) -> Vec<CtorPatternMatch> {
    use std::arch::x86_64::{
        __m128i, _mm_and_si128, _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_set_epi8,
    };

    let mut matches = Vec::new();
    if text.len() < PATTERN.len() {
        return matches;
    }

    // Pad the 10-byte pattern/mask to 16 bytes; the trailing 6 bytes are don't-care in both
    // pattern and mask, so `window & 0 == pattern_byte & 0` trivially holds and never suppresses
    // a genuine match.
    let mut pattern16 = [0u8; 16];
    let mut mask16 = [0u8; 16];
    pattern16[..10].copy_from_slice(PATTERN);
    mask16[..10].copy_from_slice(MASK);

    // SAFETY: `_mm_set_epi8` takes its 16 byte arguments by value; no memory access occurs.
    let pattern_vec: __m128i = unsafe {
        _mm_set_epi8(
            pattern16[15] as i8,
            pattern16[14] as i8,
            pattern16[13] as i8,
            pattern16[12] as i8,
            pattern16[11] as i8,
            pattern16[10] as i8,
            pattern16[9] as i8,
            pattern16[8] as i8,
            pattern16[7] as i8,
            pattern16[6] as i8,
            pattern16[5] as i8,
            pattern16[4] as i8,
            pattern16[3] as i8,
            pattern16[2] as i8,
            pattern16[1] as i8,
            pattern16[0] as i8,
        )
    };
    // SAFETY: same as above.
    let mask_vec: __m128i = unsafe {
        _mm_set_epi8(
            mask16[15] as i8,
            mask16[14] as i8,
            mask16[13] as i8,
            mask16[12] as i8,
            mask16[11] as i8,
            mask16[10] as i8,
            mask16[9] as i8,
            mask16[8] as i8,
            mask16[7] as i8,
            mask16[6] as i8,
            mask16[5] as i8,
            mask16[4] as i8,
            mask16[3] as i8,
            mask16[2] as i8,
            mask16[1] as i8,
            mask16[0] as i8,
        )
    };

    let last_full_window = text.len().saturating_sub(16);
    let mut i = 0;
    while i + PATTERN.len() <= text.len() {
        let bitwise_match = if i <= last_full_window {
            // SAFETY: `i + 16 <= text.len()` holds by the `last_full_window` bound, so the load
            // reads entirely within `text`.
            let window = unsafe { _mm_loadu_si128(text.as_ptr().add(i) as *const __m128i) };
            // SAFETY: pure SIMD arithmetic on already-loaded registers, no memory access.
            let cmp = unsafe {
                let masked = _mm_and_si128(window, mask_vec);
                _mm_cmpeq_epi8(masked, pattern_vec)
            };
            // SAFETY: pure register-to-integer extraction.
            let bitmap = unsafe { _mm_movemask_epi8(cmp) } as u16;
            bitmap == 0xFFFF
        } else {
            // Tail shorter than 16 bytes: fall back to a scalar compare of just the 10
            // meaningful bytes so we don't read past the end of `text`.
            let window = &text[i..i + PATTERN.len()];
            window
                .iter()
                .zip(PATTERN.iter().zip(MASK.iter()))
                .all(|(&w, (&p, &m))| (w & m) == (p & m))
        };

        if bitwise_match {
            let window = &text[i..i + PATTERN.len()];
            if let Some(disp32) = consistency_check(window) {
                matches.push(CtorPatternMatch { offset: i, disp32 });
            }
        }
        i += 1;
    }

    matches
}

/// Applies the full set of register/encoding-consistency checks to a 10-byte window that has
/// already passed the coarse opcode-byte compare, returning the parsed `disp32` if the window is
/// a genuine `lea`/`mov` pair. Since [`PATTERN`]/[`MASK`] now only fix the two opcode bytes, the
/// REX-prefix and ModR/M bit-level constraints the old byte-level mask used to pre-filter on are
/// re-derived here instead, so the net set of accepted windows is unchanged.
fn consistency_check(window: &[u8]) -> Option<i32> {
    debug_assert!(window.len() >= PATTERN.len());

    let lea_rex = window[0];
    let lea_modrm = window[2];
    let mov_rex = window[7];
    let mov_modrm = window[9];

    // `lea`'s REX must be a plain REX.W prefix (top nibble 0100, W=1, X=0, B=0; rip-relative
    // addressing has no SIB byte and no base register, so X/B are meaningless and fixed at 0).
    // R (bit 2) is ignored: it selects the destination register, checked for agreement below.
    if lea_rex & 0xFB != 0x48 {
        return None;
    }
    // `lea`'s ModR/M must be the pure rip-relative form: mod=00, rm=101. reg (bits 5:3, the
    // destination) is ignored here and checked for agreement below.
    if lea_modrm & 0xC7 != 0x05 {
        return None;
    }
    // `mov`'s REX must likewise be REX.W with X=0; B may vary since the store's rm register can
    // be r8-r15. R is ignored, checked for agreement below.
    if mov_rex & 0xFA != 0x48 {
        return None;
    }
    // `mov`'s ModR/M must have mod=00 (register-indirect, no displacement): a pointer store
    // through `[reg]`. Degenerate mod=00 encodings are rejected separately below.
    if mov_modrm & 0xC0 != 0x00 {
        return None;
    }

    // `mov` ModR/M must not degenerate to a RIP-relative form (mod=00, rm=101) or to an SIB byte
    // when rm=100. Both degenerate forms change the instruction's meaning entirely.
    let mov_rm = mov_modrm & 0b111;
    if mov_rm == 0b101 || mov_rm == 0b100 {
        return None;
    }

    // REX.R must agree between `lea` and `mov` (same destination register class: both reference
    // the register `lea` just computed into).
    let lea_rex_r = (lea_rex >> 2) & 1;
    let mov_rex_r = (mov_rex >> 2) & 1;
    if lea_rex_r != mov_rex_r {
        return None;
    }

    // The reg field (bits 5:3) of both ModR/M bytes must name the same register number.
    let lea_reg = (lea_modrm >> 3) & 0b111;
    let mov_reg = (mov_modrm >> 3) & 0b111;
    if lea_reg != mov_reg {
        return None;
    }

    let disp32 = i32::from_le_bytes([window[3], window[4], window[5], window[6]]);
    Some(disp32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(reg: u8, disp32: i32) -> Vec<u8> {
        let mut v = vec![0x48, 0x8D, 0x05 | (reg << 3)];
        v.extend_from_slice(&disp32.to_le_bytes());
        v.push(0x48);
        v.push(0x89);
        v.push(reg << 3);
        v
    }

    #[test]
    fn scalar_and_simd_agree_on_match() {
        let mut text = vec![0x90; 20];
        let pat = encode(0, 0x1234_5678);
        text[5..5 + pat.len()].copy_from_slice(&pat);

        let scalar = scan_scalar(&text);
        assert_eq!(scalar.len(), 1);
        assert_eq!(scalar[0].offset, 5);
        assert_eq!(scalar[0].disp32, 0x1234_5678);

        #[cfg(target_arch = "x86_64")]
        {
            let simd = scan_simd(&text);
            assert_eq!(simd, scalar);
        }
    }

    #[test]
    fn rejects_mismatched_reg_fields() {
        let mut pat = encode(0, 0x10);
        // Corrupt the mov's reg field so it no longer matches the lea's.
        pat[9] = 0b0001_1000; // reg=3, rm=0
        let matches = scan_scalar(&pat);
        assert!(matches.is_empty());
    }

    #[test]
    fn rejects_rip_relative_mov_degenerate_form() {
        let mut pat = encode(0, 0x10);
        pat[9] = 0b0000_0101; // mod=00 rm=101: RIP-relative, degenerate
        let matches = scan_scalar(&pat);
        assert!(matches.is_empty());
    }

    #[test]
    fn rejects_rex_r_mismatch() {
        let mut pat = encode(0, 0x10);
        pat[7] = 0x4C; // flips mov's REX.R bit relative to lea's
        let matches = scan_scalar(&pat);
        assert!(matches.is_empty());
    }

    #[test]
    fn finds_multiple_non_overlapping_matches() {
        let mut text = vec![0x90; 40];
        let pat_a = encode(1, 0x100);
        let pat_b = encode(2, -0x40);
        text[0..10].copy_from_slice(&pat_a);
        text[20..30].copy_from_slice(&pat_b);

        let matches = scan_scalar(&text);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].offset, 0);
        assert_eq!(matches[1].offset, 20);
    }
}

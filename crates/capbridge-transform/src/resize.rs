//! Bilinear resampling of RGBA frames.
//!
//! Pixel centres are mapped between grids (`(x + 0.5) * src / dst - 0.5`),
//! so the result is symmetric and commutes with a horizontal mirror.

use half::f16;

const CHANNELS: usize = 4;

// ── Sample types ──────────────────────────────────────────────────────────────

/// One colour channel value as stored in frame memory.
pub(crate) trait Sample {
    const SIZE: usize;
    fn read(bytes: &[u8]) -> f32;
    fn write(value: f32, out: &mut [u8]);
}

/// 8-bit unorm channel (RGBA8).
pub(crate) struct Unorm8;

impl Sample for Unorm8 {
    const SIZE: usize = 1;

    fn read(bytes: &[u8]) -> f32 {
        bytes[0] as f32
    }

    fn write(value: f32, out: &mut [u8]) {
        out[0] = value.round().clamp(0.0, 255.0) as u8;
    }
}

/// Little-endian half float channel (RGBA16F).
pub(crate) struct Half;

impl Sample for Half {
    const SIZE: usize = 2;

    fn read(bytes: &[u8]) -> f32 {
        f16::from_le_bytes([bytes[0], bytes[1]]).to_f32()
    }

    fn write(value: f32, out: &mut [u8]) {
        out[..2].copy_from_slice(&f16::from_f32(value).to_le_bytes());
    }
}

// ── Resampling ────────────────────────────────────────────────────────────────

/// Source coordinate pair and blend weight for one destination column/row.
#[derive(Debug, Clone, Copy)]
struct Tap {
    lo: usize,
    hi: usize,
    t: f32,
}

fn taps(src_len: u32, dst_len: u32) -> Vec<Tap> {
    let scale = src_len as f32 / dst_len as f32;
    let last = src_len as usize - 1;
    (0..dst_len)
        .map(|d| {
            let pos = ((d as f32 + 0.5) * scale - 0.5).clamp(0.0, last as f32);
            let lo = pos.floor() as usize;
            Tap { lo, hi: (lo + 1).min(last), t: pos - lo as f32 }
        })
        .collect()
}

/// Resample `src` (rows `row_pitch` bytes apart) to `dst_w × dst_h`.
///
/// Returns a tightly packed buffer. Callers guarantee non-zero dimensions and
/// that `src` holds `src_h` rows.
pub(crate) fn bilinear<S: Sample>(
    src: &[u8],
    src_w: u32,
    src_h: u32,
    row_pitch: usize,
    dst_w: u32,
    dst_h: u32,
) -> Vec<u8> {
    let px = CHANNELS * S::SIZE;
    let dst_row = dst_w as usize * px;
    let mut out = vec![0u8; dst_row * dst_h as usize];

    let xs = taps(src_w, dst_w);
    let ys = taps(src_h, dst_h);

    let at = |x: usize, y: usize, c: usize| -> f32 {
        let offset = y * row_pitch + x * px + c * S::SIZE;
        S::read(&src[offset..offset + S::SIZE])
    };

    for (dy, ty) in ys.iter().enumerate() {
        let row = &mut out[dy * dst_row..(dy + 1) * dst_row];
        for (dx, tx) in xs.iter().enumerate() {
            for c in 0..CHANNELS {
                let top = lerp(at(tx.lo, ty.lo, c), at(tx.hi, ty.lo, c), tx.t);
                let bottom = lerp(at(tx.lo, ty.hi, c), at(tx.hi, ty.hi, c), tx.t);
                let offset = dx * px + c * S::SIZE;
                S::write(lerp(top, bottom, ty.t), &mut row[offset..offset + S::SIZE]);
            }
        }
    }

    out
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

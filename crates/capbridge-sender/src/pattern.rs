//! Moving test pattern used as the "rendered" frame.

use capbridge_core::Resolution;

/// RGBA8 frame buffer redrawn in place every tick.
pub struct TestPattern {
    resolution: Resolution,
    pixels: Vec<u8>,
}

impl TestPattern {
    pub fn new(resolution: Resolution) -> Self {
        let len = resolution.total_pixels() as usize * 4;
        Self { resolution, pixels: vec![0; len] }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn pixels(&self) -> &Vec<u8> {
        &self.pixels
    }

    /// Horizontal gradient with a white bar sweeping left to right.
    pub fn draw(&mut self, tick: u64) {
        let width = self.resolution.width.max(1) as usize;
        let bar = (tick as usize * 4) % width;
        for (i, px) in self.pixels.chunks_exact_mut(4).enumerate() {
            let x = i % width;
            let y = i / width;
            if x.abs_diff(bar) < 4 {
                px.copy_from_slice(&[255, 255, 255, 255]);
            } else {
                px.copy_from_slice(&[(x * 255 / width) as u8, (y % 256) as u8, (tick % 256) as u8, 255]);
            }
        }
    }
}

//! Frame sink: turns the TIA's color index stream into RGB frames
//!
//! Pixels arrive only for drawn clocks (outside HBLANK and VBLANK), so the
//! first pixel after a vertical sync is the top-left corner of the picture.
//! Each field is collected into a 160-wide buffer and published on `sync`.

use emu_core::types::Frame;

use crate::io::Output;

pub const FRAME_WIDTH: usize = 160;

/// NTSC palette, indexed by `color >> 1` (D0 of a color register is unused)
pub const NTSC_PALETTE: [u32; 128] = [
    0x000000, 0x4A4A4A, 0x6F6F6F, 0x8E8E8E, 0xAAAAAA, 0xC0C0C0, 0xD6D6D6, 0xECECEC,
    0x484800, 0x69690F, 0x86861D, 0xA2A22A, 0xBBBB35, 0xD2D240, 0xE8E84A, 0xFCFC54,
    0x7C2C00, 0x904811, 0xA26221, 0xB47A30, 0xC3903D, 0xD2A44A, 0xDFB755, 0xECC860,
    0x901C00, 0xA33915, 0xB55328, 0xC66C3A, 0xD5824A, 0xE39759, 0xF0AA67, 0xFCBC74,
    0x940000, 0xA71A1A, 0xB83232, 0xC84848, 0xD65C5C, 0xE46F6F, 0xF08080, 0xFC9090,
    0x840064, 0x97197A, 0xA8308F, 0xB846A2, 0xC659B3, 0xD46CC3, 0xE07CD2, 0xEC8CE0,
    0x500084, 0x68199A, 0x7D30AD, 0x9246C0, 0xA459D0, 0xB56CE0, 0xC57CEE, 0xD48CFC,
    0x140090, 0x331AA3, 0x4E32B5, 0x6848C6, 0x7F5CD5, 0x956FE3, 0xA980F0, 0xBC90FC,
    0x000094, 0x181AA7, 0x2D32B8, 0x4248C8, 0x545CD6, 0x656FE4, 0x7580F0, 0x8490FC,
    0x001C88, 0x183B9D, 0x2D57B0, 0x4272C2, 0x548AD2, 0x65A0E1, 0x75B5EF, 0x84C8FC,
    0x003064, 0x185080, 0x2D6D98, 0x4288B0, 0x54A0C5, 0x65B7D9, 0x75CCEB, 0x84E0FC,
    0x004030, 0x18624E, 0x2D8169, 0x429E82, 0x54B899, 0x65D1AE, 0x75E7C2, 0x84FCD4,
    0x004400, 0x1A661A, 0x328432, 0x48A048, 0x5CBA5C, 0x6FD26F, 0x80E880, 0x90FC90,
    0x143C00, 0x355F18, 0x527E2D, 0x6E9C42, 0x87B754, 0x9ED065, 0xB4E775, 0xC8FC84,
    0x303800, 0x505916, 0x6D762B, 0x88923E, 0xA0AB4F, 0xB7C25F, 0xCCD86E, 0xE0EC7C,
    0x482C00, 0x694D14, 0x866A26, 0xA28638, 0xBB9F47, 0xD2B656, 0xE8CC63, 0xFCE070,
];

/// Opaque ARGB for a TIA color index
#[inline]
pub fn ntsc_to_argb(color: u8) -> u32 {
    0xFF00_0000 | NTSC_PALETTE[(color >> 1) as usize]
}

/// Collects one field at a time
#[derive(Debug)]
pub struct FrameOutput {
    current: Frame,
    position: usize,
    last: Frame,
    fields: u64,
}

impl FrameOutput {
    pub fn new(visible_lines: usize) -> Self {
        let frame = Frame::new(FRAME_WIDTH as u32, visible_lines as u32);
        Self {
            current: frame.clone(),
            position: 0,
            last: frame,
            fields: 0,
        }
    }

    /// Last completed field
    pub fn frame(&self) -> &Frame {
        &self.last
    }

    /// Fields completed since construction
    pub fn fields(&self) -> u64 {
        self.fields
    }

    /// Pixels received since the last sync, including ones past the buffer
    pub fn pixels_in_field(&self) -> usize {
        self.position
    }

    /// Copy of the field being drawn, for callers that cannot wait for a sync
    pub fn partial_frame(&self) -> Frame {
        self.current.clone()
    }

    /// Drop the field in progress without publishing it
    pub fn restart_field(&mut self) {
        self.current.pixels.fill(0xFF00_0000);
        self.position = 0;
    }
}

impl Default for FrameOutput {
    fn default() -> Self {
        Self::new(192)
    }
}

impl Output for FrameOutput {
    fn sync(&mut self) {
        std::mem::swap(&mut self.last, &mut self.current);
        self.current.pixels.fill(0xFF00_0000);
        self.position = 0;
        self.fields += 1;
    }

    fn write(&mut self, color: u8) {
        if let Some(pixel) = self.current.pixels.get_mut(self.position) {
            *pixel = ntsc_to_argb(color);
        }
        self.position += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_palette_ignores_low_bit() {
        assert_eq!(ntsc_to_argb(0x00), 0xFF000000);
        assert_eq!(ntsc_to_argb(0x01), 0xFF000000);
        assert_eq!(ntsc_to_argb(0x0E), 0xFFECECEC);
        assert_eq!(ntsc_to_argb(0x44), 0xFFB83232);
    }

    #[test]
    fn test_video_sync_publishes_field() {
        let mut out = FrameOutput::new(2);
        for _ in 0..FRAME_WIDTH {
            out.write(0x0E);
        }
        out.write(0x44);
        assert_eq!(out.fields(), 0);
        assert_eq!(out.frame().pixels[0], 0);

        out.sync();
        assert_eq!(out.fields(), 1);
        assert_eq!(out.frame().width, 160);
        assert_eq!(out.frame().height, 2);
        assert_eq!(out.frame().pixels[0], 0xFFECECEC);
        assert_eq!(out.frame().pixels[FRAME_WIDTH], 0xFFB83232);
        assert_eq!(out.pixels_in_field(), 0);
    }

    #[test]
    fn test_video_extra_lines_are_dropped() {
        let mut out = FrameOutput::new(1);
        for _ in 0..3 * FRAME_WIDTH {
            out.write(0x0E);
        }
        assert_eq!(out.pixels_in_field(), 3 * FRAME_WIDTH);
        out.sync();
        assert_eq!(out.frame().pixels.len(), FRAME_WIDTH);
    }

    #[test]
    fn test_video_restart_field_keeps_published_frame() {
        let mut out = FrameOutput::new(1);
        out.write(0x0E);
        out.sync();
        out.write(0x44);
        out.restart_field();
        assert_eq!(out.pixels_in_field(), 0);
        assert_eq!(out.partial_frame().pixels[0], 0xFF000000);
        assert_eq!(out.frame().pixels[0], 0xFFECECEC);
        assert_eq!(out.fields(), 1);
    }
}

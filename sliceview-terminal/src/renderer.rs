/// ASCII output of rendered frames for the terminal
use crossterm::{
    cursor,
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use image::RgbaImage;
use std::io::Write;

/// Character luminosity ramp for shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Converts RGBA frames into colored terminal characters.
///
/// Each cell covers two vertically stacked pixel rows, which roughly
/// matches the aspect ratio of a terminal character.
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    char_buffer: Vec<char>,
    color_buffer: Vec<Color>,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            char_buffer: vec![' '; size],
            color_buffer: vec![Color::Reset; size],
        }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if (width, height) != (self.width, self.height) {
            *self = Self::new(width, height);
        }
    }

    /// Frame size in pixels that maps one-to-one onto the cells
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32 * 2)
    }

    pub fn clear(&mut self) {
        self.char_buffer.fill(' ');
        self.color_buffer.fill(Color::Reset);
    }

    /// Sample `frame` into the cell buffers. Cells showing only
    /// `background` stay blank.
    pub fn render_frame(&mut self, frame: &RgbaImage, background: [u8; 3]) {
        self.clear();
        let (frame_width, frame_height) = frame.dimensions();
        if frame_width == 0 || frame_height == 0 {
            return;
        }

        let rows = self.height * 2;
        for y in 0..self.height {
            for x in 0..self.width {
                let px = (x * frame_width as usize / self.width) as u32;
                let top = (2 * y * frame_height as usize / rows) as u32;
                let bottom = ((2 * y + 1) * frame_height as usize / rows) as u32;

                let [r0, g0, b0, _] = frame.get_pixel(px, top).0;
                let [r1, g1, b1, _] = frame.get_pixel(px, bottom).0;
                if [r0, g0, b0] == background && [r1, g1, b1] == background {
                    continue;
                }

                let average = |a: u8, b: u8| ((a as u16 + b as u16) / 2) as u8;
                let (r, g, b) = (average(r0, r1), average(g0, g1), average(b0, b1));

                let idx = y * self.width + x;
                self.char_buffer[idx] = shade_char(r, g, b);
                self.color_buffer[idx] = Color::Rgb { r, g, b };
            }
        }
    }

    pub fn char_at(&self, x: usize, y: usize) -> char {
        self.char_buffer[y * self.width + x]
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for y in 0..self.height {
            writer.queue(cursor::MoveTo(0, y as u16))?;
            for x in 0..self.width {
                let idx = y * self.width + x;
                writer.queue(SetForegroundColor(self.color_buffer[idx]))?;
                writer.queue(Print(self.char_buffer[idx]))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

/// Map a color's luminance onto the ramp, never blank
fn shade_char(r: u8, g: u8, b: u8) -> char {
    let luminance = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) / 255.0;
    let char_index = 1 + (luminance * (LUMINOSITY_RAMP.len() - 2) as f32).round() as usize;
    LUMINOSITY_RAMP[char_index.min(LUMINOSITY_RAMP.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_background_stays_blank() {
        let mut renderer = AsciiRenderer::new(4, 2);
        let frame = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        renderer.render_frame(&frame, [0, 0, 0]);
        assert!((0..2).all(|y| (0..4).all(|x| renderer.char_at(x, y) == ' ')));
    }

    #[test]
    fn test_bright_pixels_use_dense_chars() {
        let mut renderer = AsciiRenderer::new(2, 1);
        let mut frame = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        frame.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        frame.put_pixel(0, 1, Rgba([255, 255, 255, 255]));
        renderer.render_frame(&frame, [0, 0, 0]);
        assert_eq!(renderer.char_at(0, 0), '@');
        assert_eq!(renderer.char_at(1, 0), ' ');
    }

    #[test]
    fn test_scales_larger_frames() {
        let mut renderer = AsciiRenderer::new(3, 3);
        let frame = RgbaImage::from_pixel(100, 60, Rgba([20, 20, 20, 255]));
        renderer.render_frame(&frame, [0, 0, 0]);
        assert_eq!(renderer.char_at(2, 2), '.');
        assert_eq!(renderer.pixel_size(), (3, 6));
    }

    #[test]
    fn test_draw_writes_every_cell() {
        let mut renderer = AsciiRenderer::new(2, 2);
        let frame = RgbaImage::from_pixel(2, 4, Rgba([255, 255, 255, 255]));
        renderer.render_frame(&frame, [0, 0, 0]);
        let mut out = Vec::new();
        renderer.draw(&mut out).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert_eq!(text.matches('@').count(), 4);
    }
}

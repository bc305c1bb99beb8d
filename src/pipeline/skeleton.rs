use crate::types::{HandOverlay, Keypoint};

/// Bone pairs of the 21-point hand model.
pub const CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (5, 9),
    (9, 13),
    (13, 17),
];

const STABLE_LINE_COLOR: [u8; 4] = [56, 189, 248, 255];
const PENDING_LINE_COLOR: [u8; 4] = [148, 163, 184, 255];
const POINT_COLOR: [u8; 4] = [248, 113, 113, 255];

/// A mutable view over a tightly packed RGBA buffer.
pub struct Canvas<'a> {
    buffer: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(buffer: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            buffer,
            width,
            height,
        }
    }

    /// Line thickness that stays readable from thumbnails to full HD.
    fn stroke(&self) -> i32 {
        (self.width.min(self.height) / 160).clamp(1, 8) as i32
    }

    fn to_pixel(&self, point: &Keypoint) -> (i32, i32) {
        (
            (point.x * self.width as f32).round() as i32,
            (point.y * self.height as f32).round() as i32,
        )
    }

    /// Draws one hand; bones are highlighted once the hand has a stable label.
    pub fn draw_hand(&mut self, hand: &HandOverlay) {
        if hand.keypoints.len() < 2 {
            return;
        }
        let stroke = self.stroke();
        let line_color = if hand.stable.is_some() {
            STABLE_LINE_COLOR
        } else {
            PENDING_LINE_COLOR
        };

        for &(a, b) in CONNECTIONS {
            if let (Some(pa), Some(pb)) = (hand.keypoints.get(a), hand.keypoints.get(b)) {
                let (p0, p1) = (self.to_pixel(pa), self.to_pixel(pb));
                self.line(p0, p1, line_color, stroke);
            }
        }

        let radius = stroke + 2;
        for point in &hand.keypoints {
            let center = self.to_pixel(point);
            self.disc(center, radius, POINT_COLOR);
        }
    }

    fn line(&mut self, from: (i32, i32), to: (i32, i32), color: [u8; 4], thickness: i32) {
        let (mut x0, mut y0) = from;
        let (x1, y1) = to;
        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let radius = (thickness.max(1) - 1) / 2;

        loop {
            for ox in -radius..=radius {
                for oy in -radius..=radius {
                    if ox.abs() + oy.abs() <= radius {
                        self.put(x0 + ox, y0 + oy, color);
                    }
                }
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn disc(&mut self, (cx, cy): (i32, i32), radius: i32, color: [u8; 4]) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn put(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        if let Some(pixel) = self.buffer.get_mut(idx..idx + 4) {
            pixel.copy_from_slice(&color);
        }
    }
}

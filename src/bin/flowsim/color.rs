// color.rs - Depth colormap
//
// Brown for dry ground, jumping to light blue as soon as a cell is wet and
// deepening to navy at the top of the range.

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgb(self) -> [u8; 3] {
        [
            (self.r * 255.0).round().clamp(0.0, 255.0) as u8,
            (self.g * 255.0).round().clamp(0.0, 255.0) as u8,
            (self.b * 255.0).round().clamp(0.0, 255.0) as u8,
        ]
    }

    fn lerp(self, other: Color, t: f32) -> Color {
        self * (1.0 - t) + other * t
    }
}

impl std::ops::Add for Color {
    type Output = Self;
    fn add(self, o: Self) -> Self {
        Self { r: self.r + o.r, g: self.g + o.g, b: self.b + o.b }
    }
}

impl std::ops::Mul<f32> for Color {
    type Output = Self;
    fn mul(self, s: f32) -> Self {
        Self { r: self.r * s, g: self.g * s, b: self.b * s }
    }
}

/// (position, color) stops over the normalized range [0, 1]
const STOPS: [(f32, Color); 3] = [
    (0.0, Color::new(0.6, 0.3, 0.0)),
    (0.001, Color::new(0.7, 0.85, 1.0)),
    (1.0, Color::new(0.0, 0.0, 0.5)),
];

/// Map `value / vmax` onto the brown-to-blue ramp, clamping outside [0, 1].
pub fn depth_color(value: f32, vmax: f32) -> Color {
    let t = if vmax > 0.0 { (value / vmax).clamp(0.0, 1.0) } else { 0.0 };
    for pair in STOPS.windows(2) {
        let ((t0, c0), (t1, c1)) = (pair[0], pair[1]);
        if t <= t1 {
            return c0.lerp(c1, (t - t0) / (t1 - t0));
        }
    }
    STOPS[STOPS.len() - 1].1
}

use image::Rgb;
use once_cell::sync::Lazy;

// Palette used when a monochrome sensor has to be shown in colour.
static IRONBOW: Lazy<Palette> = Lazy::new(|| {
    Palette::new(
        "Ironbow".to_string(),
        vec![
            PaletteStop::from_rgbv(0, 0, 0, 0.0),
            PaletteStop::from_rgbv(32, 0, 140, 0.2),
            PaletteStop::from_rgbv(190, 0, 150, 0.4),
            PaletteStop::from_rgbv(255, 100, 0, 0.65),
            PaletteStop::from_rgbv(255, 210, 0, 0.85),
            PaletteStop::from_rgbv(255, 255, 255, 1.0),
        ],
    )
});

pub fn default_palette() -> &'static Palette {
    &IRONBOW
}

#[derive(Clone, Debug)]
pub struct PaletteStop {
    color: Rgb<u8>,
    pos: f32,
}

impl PaletteStop {
    pub fn from_rgbv(r: u8, g: u8, b: u8, pos: f32) -> Self {
        Self {
            color: Rgb([r, g, b]),
            pos,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Palette {
    pub name: String,
    pub stops: Vec<PaletteStop>,
    // 256 precomputed colours, indexed by 8 bit intensity
    lut: Vec<Rgb<u8>>,
}

impl Palette {
    pub fn new(name: String, mut stops: Vec<PaletteStop>) -> Self {
        stops.sort_by(|a, b| a.pos.total_cmp(&b.pos));
        let mut me = Self {
            name,
            stops,
            lut: Vec::new(),
        };
        me.lut = (0..=255u8)
            .map(|v| me.sample(v as f32 / 255.0))
            .collect();
        me
    }

    //
    // Sample the gradient at a given position.
    // The position is normalized to the range [0, 1].
    //
    pub fn sample(&self, pos: f32) -> Rgb<u8> {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Rgb([0, 0, 0]),
        };
        if pos <= first.pos {
            return first.color;
        }
        if pos >= last.pos {
            return last.color;
        }
        for pair in self.stops.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if pos >= a.pos && pos <= b.pos {
                let t = (pos - a.pos) / (b.pos - a.pos);
                let mix = |i: usize| (a.color[i] as f32 * (1.0 - t) + b.color[i] as f32 * t) as u8;
                return Rgb([mix(0), mix(1), mix(2)]);
            }
        }
        last.color
    }

    #[inline(always)]
    pub fn map_intensity(&self, value: u8) -> Rgb<u8> {
        self.lut[value as usize]
    }

    ///
    /// Maps a packed 8 bit monochrome buffer to packed RGB.
    ///
    pub fn colorize(&self, mono: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(mono.len() * 3);
        for &v in mono {
            out.extend_from_slice(&self.map_intensity(v).0);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_clamped() {
        let p = default_palette();
        assert_eq!(p.sample(-1.0), Rgb([0, 0, 0]));
        assert_eq!(p.sample(2.0), Rgb([255, 255, 255]));
        assert_eq!(p.map_intensity(0), Rgb([0, 0, 0]));
        assert_eq!(p.map_intensity(255), Rgb([255, 255, 255]));
    }

    #[test]
    fn interpolates_between_stops() {
        let p = Palette::new(
            "grey".to_string(),
            vec![
                PaletteStop::from_rgbv(255, 255, 255, 1.0),
                PaletteStop::from_rgbv(0, 0, 0, 0.0),
            ],
        );
        let mid = p.sample(0.5);
        assert!((127..=128).contains(&mid[0]));
        assert_eq!(p.colorize(&[0, 255]), vec![0, 0, 0, 255, 255, 255]);
    }
}

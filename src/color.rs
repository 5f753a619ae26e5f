use palette::Srgb;

// ---------------------------------------------------------------------------
// Base palette
// ---------------------------------------------------------------------------

/// Matplotlib single-letter base colours `b g r c m`, in that order.
pub const BASE_COLORS: [Srgb<u8>; 5] = [
    Srgb::new(0, 0, 255),
    Srgb::new(0, 128, 0),
    Srgb::new(255, 0, 0),
    Srgb::new(0, 191, 191),
    Srgb::new(191, 0, 191),
];

/// Colour for points whose label is not in the map.
pub const UNMAPPED: Srgb<u8> = Srgb::new(128, 128, 128);

/// `n` colours from [`BASE_COLORS`], cycling when `n` exceeds the palette.
pub fn generate_palette(n: usize) -> Vec<Srgb<u8>> {
    BASE_COLORS.iter().copied().cycle().take(n).collect()
}

// ---------------------------------------------------------------------------
// Color mapping: species label → colour
// ---------------------------------------------------------------------------

/// Maps species labels to colours in the order the caller lists them.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMap {
    mapping: Vec<(String, Srgb<u8>)>,
}

impl ColorMap {
    pub fn new(species: &[impl AsRef<str>]) -> Self {
        let palette = generate_palette(species.len());
        let mapping = species
            .iter()
            .zip(palette)
            .map(|(s, c)| (s.as_ref().to_string(), c))
            .collect();
        ColorMap { mapping }
    }

    pub fn color_for(&self, label: &str) -> Srgb<u8> {
        self.mapping
            .iter()
            .find(|(l, _)| l == label)
            .map_or(UNMAPPED, |(_, c)| *c)
    }

    /// One `(label, colour)` per species, in map order.
    pub fn legend_entries(&self) -> &[(String, Srgb<u8>)] {
        &self.mapping
    }
}

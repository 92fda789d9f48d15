//! Highlight colour classification.
//!
//! Every colour goes through [`ColorPolicy::classify`]: discriminative rules
//! first, in the fixed order GREEN, YELLOW, PURPLE, then a per-channel match
//! against reference colours. The raw rules overlap (e.g. RGB(220, 230, 50)
//! passes both the green and the yellow rule), so each rule only applies when
//! no earlier one did.

use crate::model::ColorCategory;

/// An 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert raw annotation colour components (each 0.0..=1.0).
    ///
    /// Three components are RGB, four are CMYK. Anything else, including no
    /// colour at all, has no RGB value.
    pub fn from_components(components: &[f32]) -> Option<Self> {
        match *components {
            [r, g, b] => Some(Self::new(to_byte(r), to_byte(g), to_byte(b))),
            [c, m, y, k] => {
                let k = 1.0 - k.clamp(0.0, 1.0);
                Some(Self::new(
                    to_byte((1.0 - c.clamp(0.0, 1.0)) * k),
                    to_byte((1.0 - m.clamp(0.0, 1.0)) * k),
                    to_byte((1.0 - y.clamp(0.0, 1.0)) * k),
                ))
            }
            _ => None,
        }
    }
}

fn to_byte(component: f32) -> u8 {
    if component.is_nan() {
        return 0;
    }
    (component.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Reference colour for the nearest-match fallback.
pub fn reference(category: ColorCategory) -> Rgb {
    match category {
        ColorCategory::Green => Rgb::new(0, 255, 0),
        ColorCategory::Yellow => Rgb::new(255, 255, 0),
        ColorCategory::Purple => Rgb::new(128, 0, 128),
    }
}

/// Tunable thresholds. The defaults were tuned against real reader output
/// such as light green RGB(197, 251, 114), orange-yellow RGB(255, 193, 0)
/// and violet RGB(150, 67, 252).
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPolicy {
    /// GREEN: `g > green_min` and green is the dominant channel.
    pub green_min: u8,
    /// YELLOW: `r > yellow_min_red && g > yellow_min_green && b < yellow_max_blue`.
    pub yellow_min_red: u8,
    pub yellow_min_green: u8,
    pub yellow_max_blue: u8,
    /// PURPLE: `b > purple_min_blue && r > purple_min_red && g < purple_max_green`.
    pub purple_min_blue: u8,
    pub purple_min_red: u8,
    pub purple_max_green: u8,
    /// Largest per-channel distance to a reference colour that still matches.
    /// Values of 128 or more let the references overlap.
    pub reference_tolerance: u8,
}

impl Default for ColorPolicy {
    fn default() -> Self {
        Self {
            green_min: 200,
            yellow_min_red: 200,
            yellow_min_green: 150,
            yellow_max_blue: 100,
            purple_min_blue: 200,
            purple_min_red: 100,
            purple_max_green: 150,
            reference_tolerance: 80,
        }
    }
}

impl ColorPolicy {
    pub fn with_reference_tolerance(mut self, tolerance: u8) -> Self {
        self.reference_tolerance = tolerance;
        self
    }

    /// Classify an RGB colour, or `None` when it is not a highlight of interest.
    pub fn classify(&self, rgb: Rgb) -> Option<ColorCategory> {
        ColorCategory::ALL
            .into_iter()
            .find(|&category| self.raw_rule(category, rgb))
            .or_else(|| self.nearest_reference(rgb))
    }

    /// Classify raw annotation colour components.
    pub fn classify_components(&self, components: Option<&[f32]>) -> Option<ColorCategory> {
        components
            .and_then(Rgb::from_components)
            .and_then(|rgb| self.classify(rgb))
    }

    /// The discriminative rule for `category` as it applies after ordering:
    /// true only if this rule matches and no earlier category's rule does.
    pub fn rule_matches(&self, category: ColorCategory, rgb: Rgb) -> bool {
        ColorCategory::ALL
            .into_iter()
            .take_while(|&earlier| earlier != category)
            .all(|earlier| !self.raw_rule(earlier, rgb))
            && self.raw_rule(category, rgb)
    }

    fn raw_rule(&self, category: ColorCategory, Rgb { r, g, b }: Rgb) -> bool {
        match category {
            ColorCategory::Green => g > self.green_min && g > r && g > b,
            ColorCategory::Yellow => {
                r > self.yellow_min_red && g > self.yellow_min_green && b < self.yellow_max_blue
            }
            ColorCategory::Purple => {
                b > self.purple_min_blue && r > self.purple_min_red && g < self.purple_max_green
            }
        }
    }

    fn nearest_reference(&self, rgb: Rgb) -> Option<ColorCategory> {
        ColorCategory::ALL
            .into_iter()
            .find(|&category| self.near(rgb, reference(category)))
    }

    fn near(&self, a: Rgb, b: Rgb) -> bool {
        let tolerance = self.reference_tolerance;
        a.r.abs_diff(b.r) <= tolerance
            && a.g.abs_diff(b.g) <= tolerance
            && a.b.abs_diff(b.b) <= tolerance
    }
}

/// Classify with the default policy.
pub fn classify(r: u8, g: u8, b: u8) -> Option<ColorCategory> {
    ColorPolicy::default().classify(Rgb::new(r, g, b))
}

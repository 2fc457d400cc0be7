//! HSL->RGB conversion and the color-role table (spec.md §4.6).
//!
//! Grounded in `dmx_interface.py`'s `_hsl_to_rgb` / `_color_role_to_value`
//! (`examples/original_source/backend/dmx_interface.py`): float arithmetic
//! throughout, truncating (not rounding) to `u8` at the end, matching the
//! source exactly so the S6 scenario in spec.md §8 holds bit-for-bit.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    /// 0..=360
    pub h: f32,
    /// 0..=100
    pub s: f32,
    /// 0..=100
    pub l: f32,
}

impl Default for Hsl {
    fn default() -> Self {
        Self {
            h: 0.0,
            s: 0.0,
            l: 100.0,
        }
    }
}

/// Standard HSL->RGB with the saturation-zero (achromatic) shortcut.
pub fn hsl_to_rgb(hsl: Hsl) -> (u8, u8, u8) {
    let s = hsl.s / 100.0;
    let l = hsl.l / 100.0;

    if s == 0.0 {
        let v = (l * 255.0) as u8;
        return (v, v, v);
    }

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((hsl.h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = if hsl.h < 60.0 {
        (c, x, 0.0)
    } else if hsl.h < 120.0 {
        (x, c, 0.0)
    } else if hsl.h < 180.0 {
        (0.0, c, x)
    } else if hsl.h < 240.0 {
        (0.0, x, c)
    } else if hsl.h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    (
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorRole {
    Red,
    Green,
    Blue,
    White,
    WarmWhite,
    CoolWhite,
    Amber,
    Uv,
    Lime,
    Cyan,
    Magenta,
    Yellow,
    Orange,
}

/// Map a color role to an output value given the group's computed RGB (spec.md
/// §4.6 role table).
pub fn color_role_to_value(role: ColorRole, r: u8, g: u8, b: u8) -> u8 {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    match role {
        ColorRole::Red => r as u8,
        ColorRole::Green => g as u8,
        ColorRole::Blue => b as u8,
        ColorRole::Yellow => r.min(g) as u8,
        ColorRole::Cyan => g.min(b) as u8,
        ColorRole::Magenta => r.min(b) as u8,
        ColorRole::White | ColorRole::WarmWhite | ColorRole::CoolWhite => r.min(g).min(b) as u8,
        ColorRole::Orange => {
            if r > g && b < r.min(g) {
                r.min(g * 2) as u8
            } else {
                0
            }
        }
        ColorRole::Amber => {
            if r > 0 && g > 0 && b < r.min(g) {
                r.min(g) as u8
            } else {
                0
            }
        }
        ColorRole::Lime => {
            if g > r && b < r.min(g) {
                g.min(r * 2) as u8
            } else {
                0
            }
        }
        ColorRole::Uv => b as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_white_hsl() {
        assert_eq!(hsl_to_rgb(Hsl { h: 0.0, s: 0.0, l: 100.0 }), (255, 255, 255));
    }

    #[test]
    fn pure_red_hsl() {
        assert_eq!(hsl_to_rgb(Hsl { h: 0.0, s: 100.0, l: 50.0 }), (255, 0, 0));
    }

    #[test]
    fn white_role_is_min_of_channels() {
        assert_eq!(color_role_to_value(ColorRole::White, 200, 100, 50), 50);
    }

    #[test]
    fn orange_requires_dominant_red_and_low_blue() {
        assert_eq!(color_role_to_value(ColorRole::Orange, 200, 100, 10), 100);
        assert_eq!(color_role_to_value(ColorRole::Orange, 100, 200, 10), 0);
    }
}

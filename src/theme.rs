//! Terminal colours, optionally read from a kitty.conf-style colour file
//! (`colorN #rrggbb`, `foreground #rrggbb`, ...).

use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub accent: Color,      // Focused borders, key hints
    pub danger: Color,      // Error region
    pub success: Color,     // Filled slots, results header
    pub warning: Color,     // Status line
    pub text: Color,
    pub text_dim: Color,
    pub bg_selected: Color,
    pub inactive: Color,    // Unfocused borders, disabled trigger
    pub header: Color,      // Table headers
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Rgb(137, 180, 250),
            danger: Color::Rgb(243, 139, 168),
            success: Color::Rgb(166, 218, 149),
            warning: Color::Rgb(250, 179, 135),
            text: Color::Rgb(205, 214, 244),
            text_dim: Color::Rgb(147, 153, 178),
            bg_selected: Color::Rgb(69, 71, 90),
            inactive: Color::Rgb(88, 91, 112),
            header: Color::Rgb(245, 194, 231),
        }
    }
}

impl Theme {
    /// Colours from `path`, falling back to defaults for anything missing
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_kitty_conf(&content),
            Err(e) => {
                tracing::warn!("Could not read theme {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_kitty_conf(content: &str) -> Self {
        let colors = parse_kitty_conf(content);
        let base = Self::default();
        let pick = |keys: &[&str], fallback: Color| {
            keys.iter()
                .find_map(|k| colors.get(*k).copied())
                .unwrap_or(fallback)
        };

        Self {
            accent: pick(&["color4", "color12"], base.accent),
            danger: pick(&["color1", "color9"], base.danger),
            success: pick(&["color2", "color10"], base.success),
            warning: pick(&["color3", "color11"], base.warning),
            text: pick(&["foreground"], base.text),
            text_dim: pick(&["color8"], base.text_dim),
            bg_selected: pick(&["selection_background", "color0"], base.bg_selected),
            inactive: pick(&["inactive_border_color", "color8"], base.inactive),
            header: pick(&["color5", "color13"], base.header),
        }
    }
}

fn parse_kitty_conf(content: &str) -> HashMap<String, Color> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once(char::is_whitespace)?;
            Some((key.to_string(), parse_hex_color(value)?))
        })
        .collect()
}

/// `#RRGGBB` or `#RGB`
fn parse_hex_color(s: &str) -> Option<Color> {
    let s = s.trim().strip_prefix('#')?;
    let channel = |hex: &str| u8::from_str_radix(hex, 16).ok();
    match s.len() {
        6 => Some(Color::Rgb(channel(&s[0..2])?, channel(&s[2..4])?, channel(&s[4..6])?)),
        3 => Some(Color::Rgb(
            channel(&s[0..1])? * 17,
            channel(&s[1..2])? * 17,
            channel(&s[2..3])? * 17,
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FFC107"), Some(Color::Rgb(255, 193, 7)));
        assert_eq!(parse_hex_color("#fff"), Some(Color::Rgb(255, 255, 255)));
        assert_eq!(parse_hex_color("FFC107"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }

    #[test]
    fn test_kitty_conf_overrides_known_keys() {
        let theme = Theme::from_kitty_conf(
            "# comment\nforeground #bebebe\ncolor1     #D35F5F\nfont_family Mono\n",
        );
        assert_eq!(theme.text, Color::Rgb(190, 190, 190));
        assert_eq!(theme.danger, Color::Rgb(211, 95, 95));
        assert_eq!(theme.accent, Theme::default().accent);
    }
}

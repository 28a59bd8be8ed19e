use chrono::{DateTime, Utc};

/// Black or white text, whichever reads better on a `#rrggbb` background.
pub fn pick_text_color(rgb_color: &str) -> &'static str {
    let hex = rgb_color.strip_prefix('#').unwrap_or(rgb_color);
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
            .map(f64::from)
            .unwrap_or(0.0)
    };
    let (r, g, b) = (channel(0..2), channel(2..4), channel(4..6));

    if r * 0.299 + g * 0.587 + b * 0.114 > 186.0 {
        "#000"
    } else {
        "#FFF"
    }
}

pub fn hsla(hue: f64, saturation: u8, lightness: u8, alpha: u8) -> String {
    format!("hsla({}, {}%, {}%, {}%)", hue, saturation, lightness, alpha)
}

/// Line opacity in percent given the currently highlighted player, if any.
pub fn line_alpha(player_id: &str, highlighted: Option<&str>) -> u8 {
    match highlighted {
        None => 90,
        Some(id) if id == player_id => 100,
        Some(_) => 10,
    }
}

/// Axis tick label, "dd/mm".
pub fn day_month_label(date: DateTime<Utc>) -> String {
    date.format("%d/%m").to_string()
}

/// Split a comma separated id list from a query string, dropping blanks.
pub fn split_ids(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

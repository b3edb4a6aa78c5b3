//! A 3x5 bitmap font for titles and colorbar ticks.
//!
//! Each glyph is five rows of three bits, most significant bit on the left.
//! Lowercase letters are drawn as uppercase; unknown characters as a space.

/// Glyph width in font pixels.
pub const GLYPH_WIDTH: u32 = 3;
/// Glyph height in font pixels.
pub const GLYPH_HEIGHT: u32 = 5;
/// Horizontal advance, including one column of spacing.
pub const ADVANCE: u32 = GLYPH_WIDTH + 1;

#[rustfmt::skip]
const GLYPHS: &[(char, [u8; 5])] = &[
    ('0', [0b111, 0b101, 0b101, 0b101, 0b111]),
    ('1', [0b010, 0b110, 0b010, 0b010, 0b111]),
    ('2', [0b111, 0b001, 0b111, 0b100, 0b111]),
    ('3', [0b111, 0b001, 0b111, 0b001, 0b111]),
    ('4', [0b101, 0b101, 0b111, 0b001, 0b001]),
    ('5', [0b111, 0b100, 0b111, 0b001, 0b111]),
    ('6', [0b111, 0b100, 0b111, 0b101, 0b111]),
    ('7', [0b111, 0b001, 0b001, 0b001, 0b001]),
    ('8', [0b111, 0b101, 0b111, 0b101, 0b111]),
    ('9', [0b111, 0b101, 0b111, 0b001, 0b111]),
    ('A', [0b010, 0b101, 0b111, 0b101, 0b101]),
    ('B', [0b110, 0b101, 0b110, 0b101, 0b110]),
    ('C', [0b011, 0b100, 0b100, 0b100, 0b011]),
    ('D', [0b110, 0b101, 0b101, 0b101, 0b110]),
    ('E', [0b111, 0b100, 0b110, 0b100, 0b111]),
    ('F', [0b111, 0b100, 0b110, 0b100, 0b100]),
    ('G', [0b011, 0b100, 0b101, 0b101, 0b011]),
    ('H', [0b101, 0b101, 0b111, 0b101, 0b101]),
    ('I', [0b111, 0b010, 0b010, 0b010, 0b111]),
    ('J', [0b001, 0b001, 0b001, 0b101, 0b010]),
    ('K', [0b101, 0b101, 0b110, 0b101, 0b101]),
    ('L', [0b100, 0b100, 0b100, 0b100, 0b111]),
    ('M', [0b101, 0b111, 0b111, 0b101, 0b101]),
    ('N', [0b110, 0b101, 0b101, 0b101, 0b101]),
    ('O', [0b010, 0b101, 0b101, 0b101, 0b010]),
    ('P', [0b110, 0b101, 0b110, 0b100, 0b100]),
    ('Q', [0b010, 0b101, 0b101, 0b110, 0b011]),
    ('R', [0b110, 0b101, 0b110, 0b101, 0b101]),
    ('S', [0b011, 0b100, 0b010, 0b001, 0b110]),
    ('T', [0b111, 0b010, 0b010, 0b010, 0b010]),
    ('U', [0b101, 0b101, 0b101, 0b101, 0b111]),
    ('V', [0b101, 0b101, 0b101, 0b101, 0b010]),
    ('W', [0b101, 0b101, 0b111, 0b111, 0b101]),
    ('X', [0b101, 0b101, 0b010, 0b101, 0b101]),
    ('Y', [0b101, 0b101, 0b010, 0b010, 0b010]),
    ('Z', [0b111, 0b001, 0b010, 0b100, 0b111]),
    ('-', [0b000, 0b000, 0b111, 0b000, 0b000]),
    ('+', [0b000, 0b010, 0b111, 0b010, 0b000]),
    ('.', [0b000, 0b000, 0b000, 0b000, 0b010]),
    (',', [0b000, 0b000, 0b000, 0b010, 0b100]),
    (':', [0b000, 0b010, 0b000, 0b010, 0b000]),
    ('_', [0b000, 0b000, 0b000, 0b000, 0b111]),
    ('/', [0b001, 0b001, 0b010, 0b100, 0b100]),
    ('(', [0b001, 0b010, 0b010, 0b010, 0b001]),
    (')', [0b100, 0b010, 0b010, 0b010, 0b100]),
    ('%', [0b101, 0b001, 0b010, 0b100, 0b101]),
];

/// Rows of the glyph for `c`, `None` for blanks.
pub fn glyph(c: char) -> Option<[u8; 5]> {
    let c = c.to_ascii_uppercase();
    GLYPHS.iter().find(|(g, _)| *g == c).map(|(_, rows)| *rows)
}

/// Width in font pixels of `text` (without trailing spacing).
#[allow(clippy::cast_possible_truncation)]
pub fn text_width(text: &str) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        0
    } else {
        n * ADVANCE - 1
    }
}

/// Calls `f(x, y)` for every lit font pixel of `text`, origin top-left.
pub fn for_each_pixel(text: &str, mut f: impl FnMut(u32, u32)) {
    let mut pen = 0;
    for c in text.chars() {
        if let Some(rows) = glyph(c) {
            for (y, row) in (0_u32..).zip(rows) {
                for x in 0..GLYPH_WIDTH {
                    if row & (0b100 >> x) != 0 {
                        f(pen + x, y);
                    }
                }
            }
        }
        pen += ADVANCE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_lookup() {
        assert!(glyph('a').is_some());
        assert_eq!(glyph('a'), glyph('A'));
        assert!(glyph(' ').is_none());
        assert_eq!(text_width("AB"), 7);
        assert_eq!(text_width(""), 0);
    }

    #[test]
    fn test_pixels_of_one() {
        let mut lit = Vec::new();
        for_each_pixel("1", |x, y| lit.push((x, y)));
        assert_eq!(lit.len(), 8);
        assert!(lit.contains(&(1, 0)));
    }
}

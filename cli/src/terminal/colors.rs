use colored::Color;

pub const PRIMARY: Color = Color::TrueColor {
    r: 129,
    g: 161,
    b: 193,
};
pub const ACCENT: Color = Color::TrueColor {
    r: 235,
    g: 203,
    b: 139,
};
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::TrueColor {
    r: 216,
    g: 222,
    b: 233,
};
pub const IPV4_ADDR: Color = Color::TrueColor {
    r: 136,
    g: 192,
    b: 208,
};
pub const IPV6_ADDR: Color = Color::TrueColor {
    r: 180,
    g: 142,
    b: 173,
};
pub const SPEED: Color = Color::TrueColor {
    r: 163,
    g: 190,
    b: 140,
};
pub const LOSS: Color = Color::TrueColor {
    r: 191,
    g: 97,
    b: 106,
};

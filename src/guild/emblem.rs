//! Guild tabard emblem.

/// Visual tabard settings, stored on the guild row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmblemInfo {
    pub style: u8,
    pub color: u8,
    pub border_style: u8,
    pub border_color: u8,
    pub background_color: u8,
}

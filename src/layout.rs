//! How the bottom row is divided between the header and the bar.

use std::num::NonZeroU64;

/// The three header shapes, chosen by terminal width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tier {
    /// `[100%]`
    Narrow,
    /// `[100%] []`
    Medium,
    /// `Progress: [100%] []`
    Wide,
}

impl Tier {
    pub(crate) fn for_columns(columns: u16) -> Tier {
        match columns {
            0..=9 => Tier::Narrow,
            10..=20 => Tier::Medium,
            _ => Tier::Wide,
        }
    }

    /// Cells taken by everything but the bar glyphs themselves.
    pub(crate) fn header_width(self) -> u16 {
        match self {
            Tier::Narrow => 6,
            Tier::Medium => 9,
            Tier::Wide => 19,
        }
    }
}

/// A consistent snapshot of one resize event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    pub(crate) columns: u16,
    pub(crate) rows: u16,
    pub(crate) tier: Tier,
}

impl Layout {
    /// `None` for a zero-sized window, which is treated as no terminal at all.
    pub(crate) fn new(columns: u16, rows: u16) -> Option<Layout> {
        if columns == 0 || rows == 0 {
            return None;
        }

        Some(Layout {
            columns,
            rows,
            tier: Tier::for_columns(columns),
        })
    }

    pub(crate) fn header_width(&self) -> u16 {
        self.tier.header_width()
    }

    /// The absolute difference keeps very narrow terminals from producing a
    /// negative width.
    pub(crate) fn bar_width(&self) -> u64 {
        u64::from(self.columns.abs_diff(self.header_width()))
    }
}

/// How many cells of a `width`-wide bar are complete.
pub(crate) fn bar_done(width: u64, count: u64, total: NonZeroU64) -> u64 {
    let count = count.min(total.get());
    (u128::from(width) * u128::from(count) / u128::from(total.get())) as u64
}

/// Truncated, never rounded.
pub(crate) fn percent(count: u64, total: NonZeroU64) -> u64 {
    let count = count.min(total.get());
    (u128::from(count) * 100 / u128::from(total.get())) as u64
}

/// Fill symbols for the bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Glyphs {
    pub(crate) done: String,
    pub(crate) pending: String,
}

/// The visible contents of the bottom row, colour codes included.
pub(crate) fn line(layout: &Layout, glyphs: &Glyphs, count: u64, total: NonZeroU64) -> String {
    let pct = percent(count, total);
    let head = format!("[\x1B[33m{:3}%\x1B[0m]", pct);

    match layout.tier {
        Tier::Narrow => head,
        Tier::Medium => format!("{} {}", head, bar(layout, glyphs, count, total)),
        Tier::Wide => format!("Progress: {} {}", head, bar(layout, glyphs, count, total)),
    }
}

fn bar(layout: &Layout, glyphs: &Glyphs, count: u64, total: NonZeroU64) -> String {
    let width = layout.bar_width();
    let done = bar_done(width, count, total);
    let todo = width - done;

    let mut s = String::with_capacity(
        2 + glyphs.done.len() * done as usize + glyphs.pending.len() * todo as usize,
    );
    s.push('[');
    (0..done).for_each(|_| s.push_str(&glyphs.done));
    (0..todo).for_each(|_| s.push_str(&glyphs.pending));
    s.push(']');
    s
}

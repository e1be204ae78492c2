//! Grow/shrink font size along the standard size ladder.

use super::attribs::{AttribId, AttribValue, ItemSet};

/// Standard font sizes in tenths of a point.
pub const STANDARD_SIZES: [i64; 31] = [
    60, 70, 80, 90, 100, 105, 110, 120, 130, 140, 150, 160, 180, 200, 210, 220, 240, 260, 280, 320,
    360, 400, 440, 480, 540, 600, 660, 720, 800, 880, 960,
];

/// Largest height reachable, in tenths of a point.
pub const MAX_HEIGHT: i64 = 9999;
/// Smallest height reachable, in tenths of a point.
pub const MIN_HEIGHT: i64 = 2;

/// The size ladder offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontList {
    sizes: Vec<i64>,
}

impl Default for FontList {
    fn default() -> Self {
        Self {
            sizes: STANDARD_SIZES.to_vec(),
        }
    }
}

impl FontList {
    /// A ladder of ascending sizes in tenths of a point.
    pub fn new(mut sizes: Vec<i64>) -> Self {
        sizes.sort_unstable();
        sizes.dedup();
        Self { sizes }
    }

    pub fn sizes(&self) -> &[i64] {
        &self.sizes
    }

    /// Next height up or down, in tenths of a point.
    ///
    /// Growing takes the first ladder size above `height`, past the ladder
    /// it adds a tenth (capped). Shrinking takes the size below the first
    /// ladder entry at or above `height`; outside the ladder it subtracts a
    /// tenth (floored).
    pub fn step(&self, grow: bool, height: i64) -> i64 {
        let ary = &self.sizes;
        let mut h = height;
        if grow {
            match ary.iter().find(|&&s| s > h) {
                Some(&s) => h = s,
                None => {
                    h += (h + 5) / 10;
                    h = h.min(MAX_HEIGHT);
                }
            }
        } else if !ary.is_empty() {
            let mut found = false;
            if ary[0] < h {
                if let Some(i) = (1..ary.len()).find(|&i| ary[i] >= h) {
                    h = ary[i - 1];
                    found = true;
                }
            }
            if !found {
                h -= (h + 5) / 10;
                h = h.max(MIN_HEIGHT);
            }
        }
        h
    }
}

/// Steps the three font heights of `set`. Returns true if any changed.
///
/// Heights missing from the set are left alone; without a font list nothing
/// changes.
pub fn change_font_size_in_set(grow: bool, set: &mut ItemSet, font_list: Option<&FontList>) -> bool {
    let Some(font_list) = font_list else {
        return false;
    };
    let unit = set.metric();
    let mut changed = false;
    for which in AttribId::FONT_HEIGHTS {
        let Some(old) = set.height(which) else {
            continue;
        };
        let tenths = unit.to_tenth_points(i64::from(old));
        let stepped = font_list.step(grow, tenths);
        if (MIN_HEIGHT..=MAX_HEIGHT).contains(&stepped) {
            let new = unit.from_tenth_points(stepped);
            if new != i64::from(old) {
                if let Ok(h) = u32::try_from(new) {
                    set.put(which, AttribValue::Height(h));
                    changed = true;
                }
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::attribs::MapUnit;

    #[test]
    fn test_grow_steps_ladder() {
        let list = FontList::default();
        assert_eq!(list.step(true, 120), 130);
        assert_eq!(list.step(true, 125), 130);
        assert_eq!(list.step(true, 10), 60);
        assert_eq!(list.step(true, 960), 1056);
        assert_eq!(list.step(true, 9990), 9999);
    }

    #[test]
    fn test_shrink_steps_ladder() {
        let list = FontList::default();
        assert_eq!(list.step(false, 130), 120);
        assert_eq!(list.step(false, 125), 120);
        assert_eq!(list.step(false, 60), 54);
        assert_eq!(list.step(false, 2000), 1800);
        assert_eq!(list.step(false, 2), 2);
    }

    #[test]
    fn test_shrink_then_grow_returns() {
        let list = FontList::default();
        for &size in list.sizes() {
            assert_eq!(list.step(true, list.step(false, size)), size, "size {size}");
        }
    }

    #[test]
    fn test_change_in_set() {
        let mut set = ItemSet::with_metric(MapUnit::Twip);
        set.put(AttribId::CharFontHeight, AttribValue::Height(240));
        set.put(AttribId::CharFontHeightCjk, AttribValue::Height(240));
        let list = FontList::default();
        assert!(change_font_size_in_set(true, &mut set, Some(&list)));
        assert_eq!(set.height(AttribId::CharFontHeight), Some(260));
        assert_eq!(set.height(AttribId::CharFontHeightCjk), Some(260));
        assert_eq!(set.height(AttribId::CharFontHeightCtl), None);
        assert!(!change_font_size_in_set(true, &mut set, None));
    }

    #[test]
    fn test_saturated_height_unchanged() {
        let mut set = ItemSet::with_metric(MapUnit::TenthPoint);
        set.put(AttribId::CharFontHeight, AttribValue::Height(9999));
        assert!(!change_font_size_in_set(true, &mut set, Some(&FontList::default())));
        set.put(AttribId::CharFontHeight, AttribValue::Height(2));
        assert!(!change_font_size_in_set(false, &mut set, Some(&FontList::default())));
    }
}

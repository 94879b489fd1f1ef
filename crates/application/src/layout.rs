//! Grouping of raw page images into navigable pages.

use pagewise_core::{Page, PageRef, RawPage, ReadingDirection};

use crate::direction::option_for_direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLayoutMode {
    Single,
    Double,
}

/// An image whose height is smaller than its width shows two physical pages.
pub fn is_spread_page(width: u32, height: u32) -> bool {
    width > 0 && f64::from(height) / f64::from(width) < 1.0
}

pub fn page_urls(raw_pages: &[RawPage]) -> Vec<String> {
    let mut raw_pages = raw_pages.to_vec();
    raw_pages.sort_by_key(|page| page.index);
    raw_pages.into_iter().map(|page| page.url).collect()
}

/// Builds the ordered page sequence of a chapter.
///
/// In double mode every image gets a layout slot, spreads take two. An image
/// on an even slot pairs with the following image, one on an odd slot with the
/// preceding one; `offset_double_spreads` swaps that so the first image stands
/// alone. Spreads are never paired and a page past the chapter end is never a
/// partner.
pub fn compute_pages(
    urls: &[String],
    spread_flags: &[bool],
    mode: PageLayoutMode,
    offset_double_spreads: bool,
    direction: ReadingDirection,
) -> Vec<Page> {
    let is_spread = |index: usize| spread_flags.get(index).copied().unwrap_or(false);
    let mut pages: Vec<Page> = Vec::with_capacity(urls.len());

    if mode == PageLayoutMode::Single {
        for (index, url) in urls.iter().enumerate() {
            pages.push(single_page(index, url, direction));
        }
        return pages;
    }

    let mut preceding_spreads = 0;
    let mut open_pair: Option<usize> = None;
    for (index, url) in urls.iter().enumerate() {
        let spread = is_spread(index);
        let normalized = index + preceding_spreads;
        if spread {
            preceding_spreads += 1;
        }

        let mut offset: isize = if normalized % 2 == 0 { 1 } else { -1 };
        if offset_double_spreads {
            offset = -offset;
        }
        let partner = index.checked_add_signed(offset);

        if offset < 0
            && !spread
            && let (Some(partner), Some(last)) = (partner, pages.last_mut())
            && open_pair == Some(partner)
        {
            last.secondary = Some(page_ref(index, url));
            last.name = page_label(partner, Some(index), direction);
            open_pair = None;
            continue;
        }

        pages.push(single_page(index, url, direction));
        open_pair = match partner {
            Some(partner) if offset > 0 && partner < urls.len() && !spread && !is_spread(partner) => {
                Some(index)
            }
            _ => None,
        };
    }
    pages
}

/// `"3"` or `"3-4"`; segments are reversed under RTL so the first visual number leads.
pub fn page_label(primary: usize, secondary: Option<usize>, direction: ReadingDirection) -> String {
    match secondary {
        None => format!("{}", primary + 1),
        Some(secondary) => option_for_direction(
            format!("{}-{}", primary + 1, secondary + 1),
            format!("{}-{}", secondary + 1, primary + 1),
            direction,
        ),
    }
}

/// Position within `pages` of the page showing `raw_index`.
pub fn page_position(pages: &[Page], raw_index: usize) -> Option<usize> {
    pages.iter().position(|page| page.contains(raw_index))
}

pub fn raw_page_count(pages: &[Page]) -> usize {
    pages.last().map_or(0, |page| page.last_index() + 1)
}

fn single_page(index: usize, url: &str, direction: ReadingDirection) -> Page {
    Page {
        name: page_label(index, None, direction),
        primary: page_ref(index, url),
        secondary: None,
    }
}

fn page_ref(index: usize, url: &str) -> PageRef {
    PageRef {
        index,
        alt: format!("Page {}", index + 1),
        url: url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    fn urls(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("https://img.test/{i}.jpg")).collect()
    }

    fn double(count: usize, spreads: &[usize], offset: bool, direction: ReadingDirection) -> Vec<Page> {
        let flags: Vec<bool> = (0..count).map(|i| spreads.contains(&i)).collect();
        compute_pages(&urls(count), &flags, PageLayoutMode::Double, offset, direction)
    }

    fn names(pages: &[Page]) -> Vec<&str> {
        pages.iter().map(|page| page.name.as_str()).collect()
    }

    #[test]
    fn pairs_consecutive_pages_and_leaves_last_alone() {
        let pages = double(5, &[], false, ReadingDirection::Ltr);
        assert_eq!(names(&pages), vec!["1-2", "3-4", "5"]);
        assert_eq!(pages[0].primary.index, 0);
        assert_eq!(pages[0].secondary.as_ref().map(|s| s.index), Some(1));
        assert!(pages[2].secondary.is_none());
    }

    #[test]
    fn offset_renders_first_page_alone() {
        let pages = double(5, &[], true, ReadingDirection::Ltr);
        assert_eq!(names(&pages), vec!["1", "2-3", "4-5"]);
    }

    #[test]
    fn spread_page_stands_alone() {
        let pages = double(5, &[2], false, ReadingDirection::Ltr);
        assert_eq!(names(&pages), vec!["1-2", "3", "4-5"]);
    }

    #[test]
    fn rtl_reverses_pair_labels() {
        let pages = double(2, &[], false, ReadingDirection::Rtl);
        assert_eq!(names(&pages), vec!["2-1"]);
        assert_eq!(pages[0].primary.index, 0);
    }

    #[test]
    fn rtl_reverses_segments_not_digits() {
        assert_eq!(page_label(11, Some(12), ReadingDirection::Rtl), "13-12");
        assert_eq!(page_label(11, None, ReadingDirection::Rtl), "12");
    }

    #[test]
    fn spread_at_chapter_start() {
        let pages = double(5, &[0], false, ReadingDirection::Ltr);
        assert_eq!(names(&pages), vec!["1", "2-3", "4-5"]);
    }

    #[test]
    fn spread_as_last_page() {
        let pages = double(5, &[4], false, ReadingDirection::Ltr);
        assert_eq!(names(&pages), vec!["1-2", "3-4", "5"]);
        let pages = double(4, &[3], true, ReadingDirection::Ltr);
        assert_eq!(names(&pages), vec!["1", "2-3", "4"]);
    }

    #[test]
    fn spread_after_primary_leaves_both_neighbours_alone() {
        let pages = double(4, &[1], false, ReadingDirection::Ltr);
        assert_eq!(names(&pages), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn all_spreads_stand_alone() {
        let pages = double(3, &[0, 1, 2], false, ReadingDirection::Ltr);
        assert_eq!(names(&pages), vec!["1", "2", "3"]);
        let pages = double(3, &[0, 1, 2], true, ReadingDirection::Ltr);
        assert_eq!(names(&pages), vec!["1", "2", "3"]);
    }

    #[test]
    fn single_page_chapter() {
        assert_eq!(names(&double(1, &[], false, ReadingDirection::Ltr)), vec!["1"]);
        assert_eq!(names(&double(1, &[], true, ReadingDirection::Ltr)), vec!["1"]);
        assert!(double(0, &[], false, ReadingDirection::Ltr).is_empty());
    }

    #[test]
    fn single_mode_is_identity() {
        let pages = compute_pages(
            &urls(3),
            &[true, false, false],
            PageLayoutMode::Single,
            true,
            ReadingDirection::Rtl,
        );
        assert_eq!(names(&pages), vec!["1", "2", "3"]);
        assert!(pages.iter().all(|page| page.secondary.is_none()));
        assert_eq!(pages[1].primary.alt, "Page 2");
    }

    #[test]
    fn missing_spread_flags_count_as_narrow() {
        let pages = compute_pages(&urls(4), &[], PageLayoutMode::Double, false, ReadingDirection::Ltr);
        assert_eq!(names(&pages), vec!["1-2", "3-4"]);
    }

    #[test]
    fn spread_detection_uses_aspect_ratio() {
        assert!(is_spread_page(2000, 1400));
        assert!(!is_spread_page(1000, 1400));
        assert!(!is_spread_page(1000, 1000));
        assert!(!is_spread_page(0, 1000));
    }

    #[test]
    fn urls_are_ordered_by_raw_index() {
        let raw = vec![
            RawPage { url: "b".to_string(), index: 1 },
            RawPage { url: "a".to_string(), index: 0 },
        ];
        assert_eq!(page_urls(&raw), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn page_position_finds_secondary_members() {
        let pages = double(5, &[], false, ReadingDirection::Ltr);
        assert_eq!(page_position(&pages, 3), Some(1));
        assert_eq!(page_position(&pages, 4), Some(2));
        assert_eq!(page_position(&pages, 5), None);
        assert_eq!(raw_page_count(&pages), 5);
    }

    fn flags_strategy() -> impl Strategy<Value = Vec<bool>> {
        prop::collection::vec(prop::bool::weighted(0.2), 0..40)
    }

    proptest! {
        #[test]
        fn every_raw_page_is_shown_exactly_once(flags in flags_strategy(), offset in any::<bool>()) {
            let pages = compute_pages(
                &urls(flags.len()),
                &flags,
                PageLayoutMode::Double,
                offset,
                ReadingDirection::Ltr,
            );
            let mut seen = HashSet::new();
            let mut order = Vec::new();
            for page in &pages {
                prop_assert!(seen.insert(page.primary.index));
                order.push(page.primary.index);
                if let Some(secondary) = &page.secondary {
                    prop_assert!(!flags[secondary.index]);
                    prop_assert!(!flags[page.primary.index]);
                    prop_assert_eq!(secondary.index, page.primary.index + 1);
                    prop_assert!(seen.insert(secondary.index));
                    order.push(secondary.index);
                }
            }
            prop_assert_eq!(order, (0..flags.len()).collect::<Vec<_>>());
        }

        #[test]
        fn rtl_labels_reverse_ltr_segments(flags in flags_strategy(), offset in any::<bool>()) {
            let urls = urls(flags.len());
            let ltr = compute_pages(&urls, &flags, PageLayoutMode::Double, offset, ReadingDirection::Ltr);
            let rtl = compute_pages(&urls, &flags, PageLayoutMode::Double, offset, ReadingDirection::Rtl);
            prop_assert_eq!(ltr.len(), rtl.len());
            for (l, r) in ltr.iter().zip(&rtl) {
                let reversed: Vec<&str> = l.name.split('-').rev().collect();
                prop_assert_eq!(r.name.clone(), reversed.join("-"));
            }
        }

        #[test]
        fn offset_shifts_pair_boundaries_by_one(count in 2usize..40) {
            let urls = urls(count);
            let flags = vec![false; count];
            let plain = compute_pages(&urls, &flags, PageLayoutMode::Double, false, ReadingDirection::Ltr);
            let shifted = compute_pages(&urls, &flags, PageLayoutMode::Double, true, ReadingDirection::Ltr);
            let starts = |pages: &[Page]| pages.iter().map(|p| p.primary.index).collect::<Vec<_>>();
            let expected: Vec<usize> = std::iter::once(0)
                .chain(starts(&plain).into_iter().skip(1).map(|s| s - 1))
                .chain((count % 2 == 0).then_some(count - 1))
                .collect();
            prop_assert_eq!(starts(&shifted), expected);
        }
    }
}

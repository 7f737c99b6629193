// Pagination
// Splits an ordered listing into fixed-size pages

use std::num::IntErrorKind;

use serde::Deserialize;

/// `?page=` query parameter, kept raw so that garbage falls back to page 1.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: usize,
}

/// Resolved page number plus the offset/limit to fetch it with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: usize,
    pub num_pages: usize,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

/// One page of items together with navigation metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub total: usize,
    per_page: usize,
}

impl Paginator {
    /// Panics on a zero page size; configuration rejects that before start-up.
    pub fn new(per_page: usize) -> Self {
        assert!(per_page > 0, "page size must be positive");
        Paginator { per_page }
    }

    /// Always at least one page, even for an empty listing.
    pub fn num_pages(&self, total: usize) -> usize {
        total.div_ceil(self.per_page).max(1)
    }

    /// Missing or non-numeric pages resolve to the first page; anything below
    /// one or past the end resolves to the last page.
    pub fn locate(&self, total: usize, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages(total);

        let number = match requested.map(str::trim) {
            None | Some("") => 1,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n >= 1 && (n as u64) <= num_pages as u64 => n as usize,
                Ok(_) => num_pages,
                Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => num_pages,
                Err(_) => 1,
            },
        };

        let offset = (number - 1) * self.per_page;
        PageWindow {
            number,
            num_pages,
            total,
            offset,
            limit: self.per_page,
        }
    }

    /// Wraps items fetched for `window`.
    pub fn page<T>(&self, window: PageWindow, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total: window.total,
            per_page: self.per_page,
        }
    }
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_previous() || self.has_next()
    }

    pub fn previous_page_number(&self) -> usize {
        self.number.saturating_sub(1).max(1)
    }

    pub fn next_page_number(&self) -> usize {
        (self.number + 1).min(self.num_pages)
    }

    /// 1-based index of the first item on this page, 0 when empty.
    pub fn start_index(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            (self.number - 1) * self.per_page + 1
        }
    }

    /// 1-based index of the last item on this page, 0 when empty.
    pub fn end_index(&self) -> usize {
        if self.items.is_empty() {
            self.start_index().saturating_sub(1)
        } else {
            self.start_index() + self.items.len() - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paginate<T: Clone>(paginator: &Paginator, items: &[T], requested: Option<&str>) -> Page<T> {
        let window = paginator.locate(items.len(), requested);
        let end = (window.offset + window.limit).min(items.len());
        paginator.page(window, items[window.offset..end].to_vec())
    }

    #[test]
    fn test_last_page_holds_the_remainder() {
        let paginator = Paginator::new(10);

        for total in [1usize, 9, 10, 11, 13, 20, 25, 99] {
            let items: Vec<usize> = (0..total).collect();
            let last = paginator.num_pages(total);
            assert_eq!(last, total.div_ceil(10));

            let page = paginate(&paginator, &items, Some(&last.to_string()));
            let expected = if total % 10 == 0 { 10 } else { total % 10 };
            assert_eq!(page.len(), expected, "total = {}", total);
            assert!(!page.has_next());
        }
    }

    #[test]
    fn test_first_page_is_full() {
        let paginator = Paginator::new(10);
        let items: Vec<usize> = (0..13).collect();

        let page = paginate(&paginator, &items, None);
        assert_eq!(page.number, 1);
        assert_eq!(page.len(), 10);
        assert_eq!(page.items[0], 0);
        assert!(page.has_next());
        assert!(!page.has_previous());
        assert_eq!(page.next_page_number(), 2);
        assert_eq!(page.start_index(), 1);
        assert_eq!(page.end_index(), 10);
    }

    #[test]
    fn test_item_range_of_last_page() {
        let paginator = Paginator::new(10);
        let items: Vec<usize> = (0..13).collect();

        let page = paginate(&paginator, &items, Some("2"));
        assert_eq!(page.start_index(), 11);
        assert_eq!(page.end_index(), 13);
        assert_eq!(page.total, 13);
    }

    #[test]
    fn test_out_of_range_pages_clamp_to_last() {
        let paginator = Paginator::new(10);

        assert_eq!(paginator.locate(13, Some("99")).number, 2);
        assert_eq!(paginator.locate(13, Some("0")).number, 2);
        assert_eq!(paginator.locate(13, Some("-4")).number, 2);
        assert_eq!(paginator.locate(13, Some("99999999999999999999")).number, 2);
    }

    #[test]
    fn test_garbage_page_falls_back_to_first() {
        let paginator = Paginator::new(10);

        assert_eq!(paginator.locate(13, Some("two")).number, 1);
        assert_eq!(paginator.locate(13, Some("")).number, 1);
        assert_eq!(paginator.locate(13, Some(" 2 ")).number, 2);
    }

    #[test]
    fn test_empty_listing_has_one_empty_page() {
        let paginator = Paginator::new(10);
        let items: Vec<usize> = Vec::new();

        let page = paginate(&paginator, &items, Some("3"));
        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 1);
        assert!(page.is_empty());
        assert_eq!(page.start_index(), 0);
        assert_eq!(page.end_index(), 0);
        assert!(!page.has_other_pages());
    }

    #[test]
    fn test_window_offsets() {
        let paginator = Paginator::new(4);
        let window = paginator.locate(10, Some("3"));

        assert_eq!(window.offset, 8);
        assert_eq!(window.limit, 4);
        assert_eq!(window.num_pages, 3);
    }
}

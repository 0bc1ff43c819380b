// Page arithmetic shared by every feed: fixed page size, clamped page numbers

use serde::{Deserialize, Serialize};

/// Every feed is served ten posts at a time.
pub const FEED_PAGE_SIZE: u64 = 10;

/// A requested page, as it arrives from the `page` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    number: Option<i64>,
    per_page: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

impl PageRequest {
    pub fn first() -> Self {
        Self {
            number: None,
            per_page: FEED_PAGE_SIZE,
        }
    }

    pub fn number(number: i64) -> Self {
        Self {
            number: Some(number),
            per_page: FEED_PAGE_SIZE,
        }
    }

    /// Missing or non-numeric input selects the first page. Digit strings
    /// too large for `i64` still mean "past the end".
    pub fn parse(raw: Option<&str>) -> Self {
        let number = raw.map(str::trim).and_then(|s| {
            s.parse::<i64>().ok().or_else(|| {
                (!s.is_empty() && s.chars().all(|c| c.is_ascii_digit())).then_some(i64::MAX)
            })
        });
        Self {
            number,
            per_page: FEED_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, per_page: u64) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }
}

/// The concrete slice a request resolves to once the total is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub total_pages: u64,
    pub total_count: u64,
    pub per_page: u64,
}

impl PageWindow {
    /// Out-of-range page numbers clamp to the nearest valid page. An empty
    /// result still has one (empty) page.
    pub fn resolve(request: PageRequest, total_count: u64) -> Self {
        let per_page = request.per_page.max(1);
        let total_pages = total_count.div_ceil(per_page).max(1);
        let number = match request.number {
            None => 1,
            Some(n) if n < 1 => 1,
            Some(n) => (n as u64).min(total_pages),
        };
        Self {
            number,
            total_pages,
            total_count,
            per_page,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> u64 {
        self.per_page
    }

    pub fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number: self.number,
            total_pages: self.total_pages,
            total_count: self.total_count,
            per_page: self.per_page,
            has_next: self.number < self.total_pages,
            has_previous: self.number > 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub total_pages: u64,
    pub total_count: u64,
    pub per_page: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_falls_back_to_first_page() {
        assert_eq!(PageRequest::parse(None), PageRequest::first());
        assert_eq!(PageRequest::parse(Some("abc")), PageRequest::first());
        assert_eq!(PageRequest::parse(Some("")), PageRequest::first());
        assert_eq!(PageRequest::parse(Some(" 3 ")), PageRequest::number(3));
        assert_eq!(
            PageRequest::parse(Some("99999999999999999999999")),
            PageRequest::number(i64::MAX)
        );
    }

    #[test]
    fn out_of_range_pages_clamp() {
        let window = PageWindow::resolve(PageRequest::number(999), 3);
        assert_eq!(window.number, 1);
        assert_eq!(window.total_pages, 1);
        assert_eq!(window.offset(), 0);

        let window = PageWindow::resolve(PageRequest::number(0), 25);
        assert_eq!(window.number, 1);

        let window = PageWindow::resolve(PageRequest::number(-4), 25);
        assert_eq!(window.number, 1);

        let window = PageWindow::resolve(PageRequest::number(i64::MAX), 25);
        assert_eq!(window.number, 3);
        assert_eq!(window.offset(), 20);
    }

    #[test]
    fn empty_result_has_one_page() {
        let page = PageWindow::resolve(PageRequest::first(), 0).into_page(Vec::<u8>::new());
        assert_eq!(page.number, 1);
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_next);
        assert!(!page.has_previous);
        assert!(page.is_empty());
    }

    #[test]
    fn navigation_flags() {
        let middle = PageWindow::resolve(PageRequest::number(2), 30).into_page(vec![0u8; 10]);
        assert!(middle.has_next);
        assert!(middle.has_previous);

        let last = PageWindow::resolve(PageRequest::number(3), 30).into_page(vec![0u8; 10]);
        assert!(!last.has_next);
        assert!(last.has_previous);

        let exact = PageWindow::resolve(PageRequest::first(), 10);
        assert_eq!(exact.total_pages, 1);
    }

    #[test]
    fn custom_page_size() {
        let window = PageWindow::resolve(PageRequest::number(2).with_page_size(3), 7);
        assert_eq!(window.total_pages, 3);
        assert_eq!(window.offset(), 3);
        assert_eq!(window.limit(), 3);
    }
}

use anyhow::{anyhow, Result};

/// A closed span of physical pages such as `5-8`, `12` or `3-end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSpan {
    pub start: PageRef,
    pub end: Option<PageRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRef {
    Number(u32),
    End,
}

impl PageSpan {
    /// Parse a span like "5-8", "12" or "3-end"
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow!("Empty page range"));
        }

        if let Some(dash_pos) = s.find('-') {
            // "-5" is not a span
            if dash_pos == 0 {
                return Err(anyhow!("Invalid page range: {}", s));
            }

            let start = parse_page_ref(&s[..dash_pos])?;
            let end = parse_page_ref(&s[dash_pos + 1..])?;
            Ok(PageSpan {
                start,
                end: Some(end),
            })
        } else {
            Ok(PageSpan {
                start: parse_page_ref(s)?,
                end: None,
            })
        }
    }

    /// Resolve to 1-based `(first, last)` pages within a document of `total_pages`
    pub fn resolve(&self, total_pages: u32) -> Result<(u32, u32)> {
        let start = match &self.start {
            PageRef::Number(n) => *n,
            PageRef::End => total_pages,
        };

        let end = match &self.end {
            Some(PageRef::Number(n)) => *n,
            Some(PageRef::End) => total_pages,
            None => start,
        };

        if start == 0 || end == 0 {
            return Err(anyhow!("Page numbers must be >= 1"));
        }

        if end > total_pages {
            return Err(anyhow!(
                "End page {} exceeds total pages {}",
                end,
                total_pages
            ));
        }

        if start > end {
            return Err(anyhow!("Start page {} is after end page {}", start, end));
        }

        Ok((start, end))
    }
}

fn parse_page_ref(s: &str) -> Result<PageRef> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("end") {
        Ok(PageRef::End)
    } else {
        s.parse::<u32>()
            .map(PageRef::Number)
            .map_err(|_| anyhow!("Invalid page number: {}", s))
    }
}

/// Parse and resolve a span string in one step
pub fn resolve_span(s: &str, total_pages: u32) -> Result<(u32, u32)> {
    PageSpan::parse(s)?.resolve(total_pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_page() {
        let span = PageSpan::parse("5").unwrap();
        assert_eq!(span.start, PageRef::Number(5));
        assert_eq!(span.end, None);
        assert_eq!(span.resolve(10).unwrap(), (5, 5));
    }

    #[test]
    fn test_span() {
        assert_eq!(resolve_span("5-8", 300).unwrap(), (5, 8));
        assert_eq!(resolve_span(" 5 - 8 ", 300).unwrap(), (5, 8));
    }

    #[test]
    fn test_end_keyword() {
        assert_eq!(resolve_span("5-end", 10).unwrap(), (5, 10));
        assert_eq!(resolve_span("END", 10).unwrap(), (10, 10));
    }

    #[test]
    fn test_reverse_span_rejected() {
        assert!(resolve_span("8-5", 10).is_err());
    }

    #[test]
    fn test_invalid_page_zero() {
        assert!(resolve_span("0", 10).is_err());
        assert!(resolve_span("-3", 10).is_err());
    }

    #[test]
    fn test_page_exceeds_total() {
        assert!(resolve_span("15", 10).is_err());
        assert!(resolve_span("3-15", 10).is_err());
    }
}

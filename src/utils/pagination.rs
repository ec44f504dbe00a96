/// Resolved page window for list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
    pub offset: u64,
}

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// 1-based pages; `per_page` is clamped to `1..=MAX_PER_PAGE`
pub fn paginate(page: Option<u32>, per_page: Option<u32>) -> Page {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    Page {
        page,
        per_page,
        offset: (page as u64 - 1) * per_page as u64,
    }
}

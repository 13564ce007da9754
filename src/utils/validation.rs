use validator::Validate;

use crate::error::Result;

pub fn validate<T: Validate>(val: &T) -> Result<()> {
    val.validate()?;
    Ok(())
}

/// Clamps paging parameters to `1..` and `1..=max_per_page`.
pub fn page_params(page: Option<i64>, per_page: Option<i64>, max_per_page: i64) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, max_per_page);
    (page, per_page)
}

pub fn total_pages(total: i64, per_page: i64) -> i64 {
    if per_page <= 0 {
        return 0;
    }
    (total + per_page - 1) / per_page
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_defaults_and_clamps() {
        assert_eq!(page_params(None, None, 100), (1, 20));
        assert_eq!(page_params(Some(0), Some(1000), 100), (1, 100));
        assert_eq!(page_params(Some(3), Some(0), 100), (3, 1));
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(41, 20), 3);
        assert_eq!(total_pages(40, 20), 2);
    }
}

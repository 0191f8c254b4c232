//! Transaction pager - one-based pagination over cached transactions

use serde::Serialize;

use crate::domain::{Error, Result, Transaction};

/// Paginate transactions into one-based pages
///
/// Transactions are ordered newest date first; within a date, the input
/// order is preserved, so callers pass transactions in insertion order
/// to get a deterministic sequence across repeated calls.
///
/// A page past the last one is an empty page, not an error. Page numbers
/// below one are treated as the first page.
pub fn paginate(
    mut transactions: Vec<Transaction>,
    page: i64,
    page_size: i64,
) -> Result<TransactionPage> {
    if page_size <= 0 {
        return Err(Error::InvalidPageRequest(format!(
            "page size must be positive, got {}",
            page_size
        )));
    }

    let page = page.max(1);

    // Stable sort: ties on date keep their insertion order.
    transactions.sort_by(|a, b| b.date.cmp(&a.date));

    let total_transactions = transactions.len() as i64;
    let total_pages = if total_transactions == 0 {
        0
    } else {
        (total_transactions + page_size - 1) / page_size
    };

    let start = (page - 1).saturating_mul(page_size);
    let transactions = if start >= total_transactions {
        Vec::new()
    } else {
        transactions
            .into_iter()
            .skip(start as usize)
            .take(page_size as usize)
            .collect()
    };

    Ok(TransactionPage {
        transactions,
        page,
        page_size,
        total_transactions,
        total_pages,
    })
}

/// One page of transactions in canonical display order
#[derive(Debug, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub page: i64,
    pub page_size: i64,
    pub total_transactions: i64,
    pub total_pages: i64,
}

//! Shared record sink for concurrent tasks.
//!
//! Each task appends its whole batch under one lock. Batches remember the
//! cache key, category and query of the task that produced them so the
//! flattened result is independent of task completion order. Two rows for
//! the same query share a cache key; category breaks the tie.

use std::sync::{Mutex, PoisonError};

use koopi_offer_models::{FetchTask, Offer};

#[derive(Debug)]
struct Batch {
    /// `(cache_key, category, query)` of the producing task.
    order: (String, String, String),
    offers: Vec<Offer>,
}

/// Append-only collection of per-task offer batches.
#[derive(Debug, Default)]
pub struct Accumulator {
    batches: Mutex<Vec<Batch>>,
}

impl Accumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one task's offers and returns the running record total.
    pub fn append(&self, task: &FetchTask, offers: Vec<Offer>) -> usize {
        let mut batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
        if !offers.is_empty() {
            batches.push(Batch {
                order: (
                    task.cache_key.clone(),
                    task.category.clone(),
                    task.query.clone(),
                ),
                offers,
            });
        }
        batches.iter().map(|b| b.offers.len()).sum()
    }

    /// Total number of records appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|b| b.offers.len())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains every record, ordered by the producing task's cache key, then
    /// category, then query.
    #[must_use]
    pub fn take(&self) -> Vec<Offer> {
        let mut batches =
            std::mem::take(&mut *self.batches.lock().unwrap_or_else(PoisonError::into_inner));
        batches.sort_by(|a, b| a.order.cmp(&b.order));
        batches.into_iter().flat_map(|b| b.offers).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn task(query: &str, category: &str, page: u32) -> FetchTask {
        FetchTask {
            url: format!("https://www.kupi.cz/hledej?f={query}&page={page}"),
            cache_key: format!("{query}-{page}.html"),
            category: category.to_owned(),
            query: query.to_owned(),
        }
    }

    fn offer(name: &str, market: &str) -> Offer {
        Offer {
            name: name.to_owned(),
            market: market.to_owned(),
            ..Offer::default()
        }
    }

    #[test]
    fn append_reports_running_total() {
        let acc = Accumulator::new();
        assert_eq!(acc.append(&task("a", "X", 1), vec![offer("A", "Lidl")]), 1);
        assert_eq!(acc.append(&task("b", "X", 1), vec![]), 1);
        assert_eq!(
            acc.append(&task("c", "X", 1), vec![offer("C", "Lidl"), offer("C", "Billa")]),
            3
        );
        assert_eq!(acc.len(), 3);
    }

    #[test]
    fn take_orders_by_cache_key_not_arrival() {
        let acc = Accumulator::new();
        acc.append(&task("pivo", "Alkohol", 1), vec![offer("Pivo", "Tesco")]);
        acc.append(&task("jogurt", "Mléčné", 2), vec![offer("Jogurt 2", "Lidl")]);
        acc.append(&task("jogurt", "Mléčné", 1), vec![offer("Jogurt 1", "Albert")]);

        let names: Vec<_> = acc.take().into_iter().map(|o| o.name).collect();
        assert_eq!(names, ["Jogurt 1", "Jogurt 2", "Pivo"]);
        assert!(acc.is_empty());
    }

    #[test]
    fn same_cache_key_batches_order_by_category() {
        let drained = |first: (&str, &str), second: (&str, &str)| {
            let acc = Accumulator::new();
            for (category, market) in [first, second] {
                let mut pivo = offer("Pivo", market);
                pivo.category = category.to_owned();
                acc.append(&task("pivo", category, 1), vec![pivo]);
            }
            acc.take()
                .into_iter()
                .map(|o| o.category)
                .collect::<Vec<_>>()
        };

        let forward = drained(("Alkohol", "Tesco"), ("Nápoje", "Lidl"));
        let backward = drained(("Nápoje", "Lidl"), ("Alkohol", "Tesco"));
        assert_eq!(forward, ["Alkohol", "Nápoje"]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn concurrent_appends_lose_nothing() {
        let acc = Arc::new(Accumulator::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let acc = Arc::clone(&acc);
                std::thread::spawn(move || {
                    acc.append(&task(&format!("q{i}"), "X", 1), vec![offer("X", "Lidl"); 10]);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(acc.take().len(), 80);
    }
}

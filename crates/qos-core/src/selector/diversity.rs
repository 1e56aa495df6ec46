use super::tld::extract_tld;
use crate::types::EndpointAddr;
use rand::Rng;
use std::collections::HashSet;

/// Result of a diversity-aware multi-selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DiverseSelection {
    pub endpoints: Vec<EndpointAddr>,
    /// Distinct domains among the selected endpoints.
    pub distinct_domains: usize,
}

impl DiverseSelection {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn diversity_percent(&self) -> f64 {
        if self.endpoints.is_empty() {
            return 0.0;
        }
        self.distinct_domains as f64 / self.endpoints.len() as f64 * 100.0
    }
}

/// Picks up to `n` endpoints, preferring ones whose domain is not yet used.
///
/// The first pick is uniform. Each later pick is uniform among remaining
/// endpoints with an unused or unknown domain, or among all remaining ones
/// when every domain is taken.
pub(crate) fn select_diverse<R: Rng>(
    available: &[EndpointAddr],
    n: usize,
    rng: &mut R,
) -> DiverseSelection {
    let mut remaining: Vec<(EndpointAddr, Option<String>)> =
        available.iter().map(|addr| (addr.clone(), extract_tld(addr.as_str()))).collect();
    let mut used: HashSet<String> = HashSet::new();
    let mut endpoints = Vec::with_capacity(n.min(remaining.len()));

    while endpoints.len() < n && !remaining.is_empty() {
        let fresh: Vec<usize> = if used.is_empty() {
            Vec::new()
        } else {
            remaining
                .iter()
                .enumerate()
                .filter(|(_, (_, tld))| tld.as_ref().is_none_or(|t| !used.contains(t)))
                .map(|(idx, _)| idx)
                .collect()
        };

        let idx = if fresh.is_empty() {
            rng.random_range(0..remaining.len())
        } else {
            fresh[rng.random_range(0..fresh.len())]
        };

        let (endpoint, tld) = remaining.swap_remove(idx);
        if let Some(tld) = tld {
            used.insert(tld);
        }
        endpoints.push(endpoint);
    }

    DiverseSelection { endpoints, distinct_domains: used.len() }
}

/// Uniformly picks `min(n, candidates.len())` distinct entries.
pub(crate) fn select_random<R: Rng>(
    candidates: &[EndpointAddr],
    n: usize,
    rng: &mut R,
) -> Vec<EndpointAddr> {
    let mut pool = candidates.to_vec();
    let n = n.min(pool.len());

    // Partial Fisher-Yates: the first `n` slots end up a uniform sample.
    for i in 0..n {
        let j = rng.random_range(i..pool.len());
        pool.swap(i, j);
    }

    pool.truncate(n);
    pool
}

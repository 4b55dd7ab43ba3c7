//! Proportional sampler. Bounds the candidate pool while keeping every section
//! represented in proportion to its size.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::models::article::Article;

/// Sorts most recent first. Missing or unparseable dates sort last; ties keep
/// their original order.
pub fn sort_by_recency(articles: &mut [Article]) {
    articles.sort_by_cached_key(|a| Reverse(a.published_at()));
}

/// Draws at most `cap` articles from the pools named in `sections`.
///
/// Algorithm:
/// 1. Sort every pool by recency
/// 2. If the pools together fit under `cap`, return all of them in section order
/// 3. Otherwise give each section `round(cap * size / total)` slots, never more
///    than its size, and take its most recent articles
/// 4. Concatenate in section order and truncate the tail to `cap`
///
/// Rounding can overshoot `cap` by a few articles; truncating from the tail means
/// sections later in `sections` absorb the loss. Sections with no pool are empty.
pub fn sample(
    pools: &HashMap<String, Vec<Article>>,
    sections: &[String],
    cap: usize,
) -> Vec<Article> {
    let mut seen = HashSet::new();
    let sorted: Vec<(&str, Vec<Article>)> = sections
        .iter()
        .filter(|s| seen.insert(s.as_str()))
        .map(|section| {
            let mut pool = pools.get(section).cloned().unwrap_or_default();
            sort_by_recency(&mut pool);
            (section.as_str(), pool)
        })
        .collect();

    let total: usize = sorted.iter().map(|(_, pool)| pool.len()).sum();

    if total <= cap {
        debug!("Sampler: {total} articles fit under cap {cap}, no sampling needed");
        return sorted.into_iter().flat_map(|(_, pool)| pool).collect();
    }

    let mut selected = Vec::with_capacity(cap + sorted.len());
    for (section, pool) in sorted {
        let quota = quota_for(pool.len(), total, cap);
        let take = quota.min(pool.len());
        debug!(
            "Sampler: section '{section}' pool={} quota={quota} taking={take}",
            pool.len()
        );
        selected.extend(pool.into_iter().take(take));
    }

    if selected.len() > cap {
        debug!(
            "Sampler: rounding overshoot of {} articles trimmed from the tail",
            selected.len() - cap
        );
        selected.truncate(cap);
    }

    info!("Sampled {} of {total} articles (cap {cap})", selected.len());
    selected
}

fn quota_for(pool_size: usize, total: usize, cap: usize) -> usize {
    if total == 0 {
        return 0;
    }
    (cap as f64 * pool_size as f64 / total as f64).round() as usize
}

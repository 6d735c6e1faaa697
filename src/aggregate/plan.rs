//! Task planning: claims + categories → ordered, de-duplicated fetch tasks.
//!
//! Submission order is the order tasks appear in the returned Vec: claim
//! tasks in claim order (entities in claim order within a claim), then one
//! general task per requested claim-independent category.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::model::{Category, Claim};

/// One unit of fan-out work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    /// Key in the merged table.
    pub key: String,
    pub category: Category,
    /// What the provider is asked to resolve.
    pub target: String,
    pub symbol: Option<String>,
}

impl FetchTask {
    pub fn new(key: impl Into<String>, category: Category, target: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            category,
            target: target.into(),
            symbol: None,
        }
    }

    /// Quotes are keyed by bare symbol; everything else per symbol is
    /// `{symbol}:{category}`.
    pub fn for_symbol(category: Category, symbol: &str) -> Self {
        let key = match category {
            Category::StockData => symbol.to_string(),
            other => format!("{symbol}:{other}"),
        };
        Self {
            key,
            category,
            target: symbol.to_string(),
            symbol: Some(symbol.to_string()),
        }
    }

    pub fn general(category: Category) -> Self {
        Self::new(category.as_str(), category, category.as_str())
    }

    pub fn cache_key(&self, now: DateTime<Utc>) -> String {
        cache_key(self.category, &self.target, now)
    }
}

/// Coarse time bucket: hourly for volatile categories, daily otherwise.
pub fn time_bucket(category: Category, now: DateTime<Utc>) -> String {
    if category.hourly_bucket() {
        now.format("%Y-%m-%dT%H").to_string()
    } else {
        now.format("%Y-%m-%d").to_string()
    }
}

/// `{category}:{target}:{bucket}`.
pub fn cache_key(category: Category, target: &str, now: DateTime<Utc>) -> String {
    format!("{category}:{target}:{}", time_bucket(category, now))
}

/// Build the task list for one aggregation call.
///
/// A claim contributes one task per entity for every category its type maps
/// to that is also in `categories`. General categories in `categories` add
/// one claim-independent task each. A (category, target) pair is planned at
/// its first position only.
pub fn plan(claims: &[Claim], categories: &[Category]) -> Vec<FetchTask> {
    let mut seen: HashSet<(Category, String)> = HashSet::new();
    let mut tasks = Vec::new();

    let mut push = |task: FetchTask, tasks: &mut Vec<FetchTask>| {
        if seen.insert((task.category, task.target.clone())) {
            tasks.push(task);
        }
    };

    for claim in claims {
        let wanted = claim.claim_type.categories(!claim.entities.is_empty());
        for category in wanted.into_iter().filter(|c| categories.contains(c)) {
            for entity in &claim.entities {
                push(FetchTask::for_symbol(category, entity), &mut tasks);
            }
        }
    }

    for category in categories.iter().copied().filter(|c| c.is_general()) {
        push(FetchTask::general(category), &mut tasks);
    }

    tasks
}

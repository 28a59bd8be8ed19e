use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::types::{Match, Rating, Who};

/// Running totals of the ratings given for one match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingTotals {
    pub average_sum: f64,
    pub average_quantity: u32,
}

impl RatingTotals {
    pub fn add(&mut self, quantity: f64) {
        self.average_sum += quantity;
        self.average_quantity += 1;
    }

    /// `None` when nobody rated, which is not the same as a zero rating.
    pub fn average(&self) -> Option<f64> {
        if self.average_quantity == 0 {
            None
        } else {
            Some(self.average_sum / f64::from(self.average_quantity))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchAverage {
    pub match_id: String,
    #[serde(flatten)]
    pub totals: RatingTotals,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub matches: Vec<MatchAverage>,
    pub global_average: Option<f64>,
}

impl RatingSummary {
    pub fn get(&self, match_id: &str) -> Option<&MatchAverage> {
        self.matches.iter().find(|m| m.match_id == match_id)
    }

    pub fn rated_matches(&self) -> usize {
        self.matches.iter().filter(|m| m.average.is_some()).count()
    }

    pub fn has_data(&self) -> bool {
        self.global_average.is_some()
    }
}

/// Keep the ratings that count for `who`. In user mode only the viewer's own
/// ratings remain, so an anonymous viewer gets none.
pub fn ratings_for<'a>(ratings: &'a [Rating], who: Who, viewer_id: Option<&str>) -> Vec<&'a Rating> {
    match who {
        Who::Community => ratings.iter().collect(),
        Who::User => match viewer_id {
            Some(viewer) => ratings
                .iter()
                .filter(|r| r.user_id.as_deref() == Some(viewer))
                .collect(),
            None => Vec::new(),
        },
    }
}

/// Group ratings per match over the filtered match subset.
///
/// One entry per match in `matches`, in the same order. The global average is
/// the mean of the per-match averages of the matches somebody rated.
pub fn aggregate_ratings(
    ratings: &[Rating],
    matches: &[&Match],
    who: Who,
    viewer_id: Option<&str>,
) -> RatingSummary {
    let mut totals: HashMap<&str, RatingTotals> =
        matches.iter().map(|m| (m.id.as_str(), RatingTotals::default())).collect();

    let included = ratings_for(ratings, who, viewer_id);
    let mut skipped = 0usize;
    for rating in included {
        match totals.get_mut(rating.match_id.as_str()) {
            Some(entry) => entry.add(rating.quantity),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!("Ignored {} ratings outside the selected matches", skipped);
    }

    let per_match: Vec<MatchAverage> = matches
        .iter()
        .map(|m| {
            let t = totals.get(m.id.as_str()).copied().unwrap_or_default();
            MatchAverage {
                match_id: m.id.clone(),
                totals: t,
                average: t.average(),
            }
        })
        .collect();

    RatingSummary {
        global_average: mean(per_match.iter().filter_map(|m| m.average)),
        matches: per_match,
    }
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0u32), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / f64::from(count))
    }
}

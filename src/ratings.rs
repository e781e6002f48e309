// src/ratings.rs
//! Satisfaction indices derived from 0–10 ratings: NPS (promoter/detractor
//! balance) and CSI (composite 0–100 score), plus CSI quality banding.
//!
//! Both indices are computed from a `RatingTally`, a commutative summary
//! that chunks can build independently and the aggregator can merge in any
//! order.

use serde::{Deserialize, Serialize};

/// NPS band for a single rating on the 0–10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingBand {
    Promoter,
    Passive,
    Detractor,
}

/// Band a rating: promoter ≥ 9, passive 7–8, detractor ≤ 6. Fractional
/// ratings fall into the band their value reaches (8.5 is passive).
pub fn band(rating: f64) -> RatingBand {
    if rating >= 9.0 {
        RatingBand::Promoter
    } else if rating >= 7.0 {
        RatingBand::Passive
    } else {
        RatingBand::Detractor
    }
}

/// CSI quality band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CsiBand {
    Critical,
    Low,
    Regular,
    Good,
    Excellent,
}

impl CsiBand {
    /// Critical <50, Low 50–60, Regular 60–70, Good 70–80, Excellent ≥80.
    pub fn from_score(csi: f64) -> Self {
        if csi < 50.0 {
            CsiBand::Critical
        } else if csi < 60.0 {
            CsiBand::Low
        } else if csi < 70.0 {
            CsiBand::Regular
        } else if csi < 80.0 {
            CsiBand::Good
        } else {
            CsiBand::Excellent
        }
    }
}

/// Commutative rating summary. `merge` is associative and commutative, so
/// per-chunk tallies can be reduced in any completion order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RatingTally {
    pub count: usize,
    pub sum: f64,
    pub promoters: usize,
    pub passives: usize,
    pub detractors: usize,
    /// Ratings ≥ 8.
    pub high: usize,
    /// Ratings ≤ 4.
    pub low: usize,
}

impl RatingTally {
    pub fn add(&mut self, rating: f64) {
        self.count += 1;
        self.sum += rating;
        match band(rating) {
            RatingBand::Promoter => self.promoters += 1,
            RatingBand::Passive => self.passives += 1,
            RatingBand::Detractor => self.detractors += 1,
        }
        if rating >= 8.0 {
            self.high += 1;
        }
        if rating <= 4.0 {
            self.low += 1;
        }
    }

    pub fn merge(&mut self, other: &RatingTally) {
        self.count += other.count;
        self.sum += other.sum;
        self.promoters += other.promoters;
        self.passives += other.passives;
        self.detractors += other.detractors;
        self.high += other.high;
        self.low += other.low;
    }

    pub fn from_ratings(ratings: &[f64]) -> Self {
        let mut t = Self::default();
        for &r in ratings {
            t.add(r);
        }
        t
    }
}

/// Net Promoter Score: `100 · (promoters − detractors) / total`, in
/// [-100, 100]. Zero when there are no ratings.
pub fn nps(tally: &RatingTally) -> f64 {
    if tally.count == 0 {
        return 0.0;
    }
    100.0 * (tally.promoters as f64 - tally.detractors as f64) / tally.count as f64
}

/// Customer Satisfaction Index on a 0–100 scale:
/// `40% · normalized mean + 30% · high-rating ratio + 30% · (1 − low-rating
/// ratio)`, clamped to [0, 100]. Zero when there are no ratings.
pub fn csi(tally: &RatingTally) -> f64 {
    if tally.count == 0 {
        return 0.0;
    }
    let n = tally.count as f64;
    let normalized_mean = tally.sum / n / 10.0 * 100.0;
    let high_ratio = tally.high as f64 / n;
    let low_ratio = tally.low as f64 / n;
    let score = 0.4 * normalized_mean + 0.3 * (high_ratio * 100.0) + 0.3 * ((1.0 - low_ratio) * 100.0);
    score.clamp(0.0, 100.0)
}

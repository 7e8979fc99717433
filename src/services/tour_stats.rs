// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Aggregates over tours, computed in process from a collection scan.

use crate::models::Tour;
use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;

/// Tours rated below this are left out of [`tour_stats`].
pub const MIN_RATING_FOR_STATS: f64 = 4.5;
const MAX_MONTHS: usize = 12;

/// Per-difficulty summary of highly rated tours.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    /// Upper-cased difficulty
    pub difficulty: String,
    pub num_tours: u32,
    pub num_ratings: u64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Tour starts in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthPlan {
    /// 1 = January
    pub month: u32,
    pub num_tour_starts: u32,
    pub tours: Vec<String>,
}

/// Summary per difficulty of tours rated at least 4.5, cheapest average first.
pub fn tour_stats(tours: &[Tour]) -> Vec<DifficultyStats> {
    let mut groups: BTreeMap<String, Vec<&Tour>> = BTreeMap::new();
    for tour in tours
        .iter()
        .filter(|t| t.ratings_average >= MIN_RATING_FOR_STATS)
    {
        let key = tour.difficulty.as_deref().unwrap_or_default().to_uppercase();
        groups.entry(key).or_default().push(tour);
    }

    let mut stats: Vec<DifficultyStats> = groups
        .into_iter()
        .map(|(difficulty, tours)| {
            let count = tours.len() as f64;
            let prices: Vec<f64> = tours.iter().map(|t| t.price.unwrap_or_default()).collect();
            DifficultyStats {
                difficulty,
                num_tours: tours.len() as u32,
                num_ratings: tours.iter().map(|t| u64::from(t.ratings_quantity)).sum(),
                avg_rating: tours.iter().map(|t| t.ratings_average).sum::<f64>() / count,
                avg_price: prices.iter().sum::<f64>() / count,
                min_price: prices.iter().copied().fold(f64::INFINITY, f64::min),
                max_price: prices.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            }
        })
        .collect();

    stats.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));
    stats
}

/// Tour starts per month of `year`, busiest month first.
pub fn busy_month(tours: &[Tour], year: i32) -> Vec<MonthPlan> {
    let mut months: BTreeMap<u32, MonthPlan> = BTreeMap::new();
    for tour in tours {
        for start in tour.start_dates.iter().filter(|d| d.year() == year) {
            let plan = months.entry(start.month()).or_insert_with(|| MonthPlan {
                month: start.month(),
                num_tour_starts: 0,
                tours: Vec::new(),
            });
            plan.num_tour_starts += 1;
            plan.tours.push(tour.name.clone().unwrap_or_default());
        }
    }

    let mut plans: Vec<MonthPlan> = months.into_values().collect();
    // Stable sort keeps ties in calendar order.
    plans.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts));
    plans.truncate(MAX_MONTHS);
    plans
}

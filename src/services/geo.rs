// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Great-circle queries on tour start locations.

use crate::error::{AppError, Result};
use crate::models::Tour;
use geo::{Distance, Haversine, Point};
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Miles,
    Kilometers,
}

impl Unit {
    /// Conversion factor from meters.
    pub fn per_meter(&self) -> f64 {
        match self {
            Unit::Miles => 0.000621371,
            Unit::Kilometers => 0.001,
        }
    }
}

impl FromStr for Unit {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mi" => Ok(Unit::Miles),
            "km" => Ok(Unit::Kilometers),
            _ => Err(AppError::BadRequest(
                "Please provide the unit as mi or km.".to_string(),
            )),
        }
    }
}

/// Parse `lat,lng` into a point (x = longitude, y = latitude).
pub fn parse_lat_lng(raw: &str) -> Result<Point<f64>> {
    let bad = || {
        AppError::BadRequest("Please provide latitude and longitude in the format lat,lng.".into())
    };
    let (lat, lng) = raw.split_once(',').ok_or_else(bad)?;
    let lat: f64 = lat.trim().parse().map_err(|_| bad())?;
    let lng: f64 = lng.trim().parse().map_err(|_| bad())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(bad());
    }
    Ok(Point::new(lng, lat))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourDistance {
    pub id: String,
    pub name: String,
    pub distance: f64,
}

fn start_point(tour: &Tour) -> Option<Point<f64>> {
    let (lng, lat) = tour.start_location.as_ref()?.lng_lat()?;
    Some(Point::new(lng, lat))
}

/// Distance from `center` to every tour start, nearest first.
pub fn distances(tours: &[Tour], center: Point<f64>, unit: Unit) -> Vec<TourDistance> {
    let mut result: Vec<TourDistance> = tours
        .iter()
        .filter_map(|tour| {
            let start = start_point(tour)?;
            Some(TourDistance {
                id: tour.id.clone(),
                name: tour.name.clone().unwrap_or_default(),
                distance: Haversine.distance(center, start) * unit.per_meter(),
            })
        })
        .collect();
    result.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    result
}

/// Ids of tours starting within `radius` of `center`.
pub fn within(tours: &[Tour], center: Point<f64>, radius: f64, unit: Unit) -> Vec<String> {
    tours
        .iter()
        .filter(|tour| {
            start_point(tour)
                .is_some_and(|start| Haversine.distance(center, start) * unit.per_meter() <= radius)
        })
        .map(|tour| tour.id.clone())
        .collect()
}

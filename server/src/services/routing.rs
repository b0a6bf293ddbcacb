// homeworks/src/services/routing.rs

//! Road distance between two points. Tries the commercial routing API, then
//! an OSRM server, then falls back to the great-circle distance. Never fails.

use crate::errors::AppError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{instrument, warn};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
  pub lat: f64,
  pub lng: f64,
}

impl FromStr for LatLng {
  type Err = AppError;

  /// `"<lat>,<lng>"`.
  fn from_str(s: &str) -> Result<Self, AppError> {
    let invalid = || AppError::Validation(format!("Invalid coordinate '{}', expected 'lat,lng'", s));
    let (lat, lng) = s.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
      return Err(invalid());
    }
    Ok(LatLng { lat, lng })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
  Commercial,
  Osrm,
  StraightLine,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteEstimate {
  pub distance_meters: f64,
  pub duration_seconds: Option<f64>,
  pub source: RouteSource,
}

pub fn haversine_meters(a: LatLng, b: LatLng) -> f64 {
  let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
  let dlat = lat2 - lat1;
  let dlng = (b.lng - a.lng).to_radians();
  let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
  2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[derive(Deserialize)]
struct ValueField {
  value: f64,
}

#[derive(Deserialize)]
struct CommercialLeg {
  distance: ValueField,
  duration: ValueField,
}

#[derive(Deserialize)]
struct CommercialRoute {
  legs: Vec<CommercialLeg>,
}

#[derive(Deserialize)]
struct CommercialResponse {
  routes: Vec<CommercialRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
  distance: f64,
  duration: f64,
}

#[derive(Deserialize)]
struct OsrmResponse {
  code: String,
  #[serde(default)]
  routes: Vec<OsrmRoute>,
}

fn commercial_estimate(body: CommercialResponse) -> Option<RouteEstimate> {
  let route = body.routes.into_iter().next()?;
  if route.legs.is_empty() {
    return None;
  }
  Some(RouteEstimate {
    distance_meters: route.legs.iter().map(|l| l.distance.value).sum(),
    duration_seconds: Some(route.legs.iter().map(|l| l.duration.value).sum()),
    source: RouteSource::Commercial,
  })
}

fn osrm_estimate(body: OsrmResponse) -> Option<RouteEstimate> {
  if body.code != "Ok" {
    return None;
  }
  let route = body.routes.into_iter().next()?;
  Some(RouteEstimate {
    distance_meters: route.distance,
    duration_seconds: Some(route.duration),
    source: RouteSource::Osrm,
  })
}

pub struct RoutePlanner {
  client: Client,
  commercial_url: Option<String>,
  commercial_key: Option<String>,
  osrm_url: Option<String>,
}

impl RoutePlanner {
  pub fn new(client: Client, commercial_url: Option<String>, commercial_key: Option<String>, osrm_url: Option<String>) -> Self {
    Self {
      client,
      commercial_url,
      commercial_key,
      osrm_url: osrm_url.map(|u| u.trim_end_matches('/').to_string()),
    }
  }

  async fn via_commercial(&self, url: &str, from: LatLng, to: LatLng) -> Result<Option<RouteEstimate>, AppError> {
    let origin = format!("{},{}", from.lat, from.lng);
    let destination = format!("{},{}", to.lat, to.lng);
    let mut request = self
      .client
      .get(url)
      .query(&[("origin", origin.as_str()), ("destination", destination.as_str())]);
    if let Some(key) = &self.commercial_key {
      request = request.header("Api-Key", key);
    }
    let response = request.send().await?.error_for_status()?;
    Ok(commercial_estimate(response.json().await?))
  }

  async fn via_osrm(&self, base: &str, from: LatLng, to: LatLng) -> Result<Option<RouteEstimate>, AppError> {
    let url = format!(
      "{}/route/v1/driving/{},{};{},{}?overview=false",
      base, from.lng, from.lat, to.lng, to.lat
    );
    let response = self.client.get(url).send().await?.error_for_status()?;
    Ok(osrm_estimate(response.json().await?))
  }

  #[instrument(name = "routing::plan", skip(self))]
  pub async fn plan(&self, from: LatLng, to: LatLng) -> RouteEstimate {
    if let Some(url) = &self.commercial_url {
      match self.via_commercial(url, from, to).await {
        Ok(Some(estimate)) => return estimate,
        Ok(None) => warn!("Commercial routing returned no route."),
        Err(e) => warn!(error = %e, "Commercial routing failed; trying OSRM."),
      }
    }
    if let Some(base) = &self.osrm_url {
      match self.via_osrm(base, from, to).await {
        Ok(Some(estimate)) => return estimate,
        Ok(None) => warn!("OSRM returned no route."),
        Err(e) => warn!(error = %e, "OSRM routing failed; using straight-line distance."),
      }
    }
    RouteEstimate {
      distance_meters: haversine_meters(from, to),
      duration_seconds: None,
      source: RouteSource::StraightLine,
    }
  }
}

// homeworks/src/services/geocode.rs

//! Address search through a public Nominatim-compatible geocoder, bounded by a timeout.

use crate::errors::AppError;
use crate::services::policy::OnUnavailable;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use stagehand::with_timeout;
use std::time::Duration;
use tracing::{debug, instrument};

const USER_AGENT: &str = "homeworks-backend/0.1";
const MAX_RESULTS: u8 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
  pub display_name: String,
  pub lat: f64,
  pub lon: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeocodeResult {
  pub places: Vec<Place>,
  /// True when the upstream failed and the result is the permissive fallback.
  pub degraded: bool,
}

// Nominatim sends coordinates as strings.
#[derive(Deserialize)]
struct NominatimHit {
  display_name: String,
  lat: String,
  lon: String,
}

fn into_places(hits: Vec<NominatimHit>) -> Vec<Place> {
  hits
    .into_iter()
    .filter_map(|h| {
      Some(Place {
        lat: h.lat.parse().ok()?,
        lon: h.lon.parse().ok()?,
        display_name: h.display_name,
      })
    })
    .collect()
}

pub struct Geocoder {
  client: Client,
  base_url: String,
  timeout: Duration,
  policy: OnUnavailable,
}

impl Geocoder {
  pub fn new(client: Client, base_url: &str, timeout: Duration, policy: OnUnavailable) -> Self {
    Self {
      client,
      base_url: base_url.trim_end_matches('/').to_string(),
      timeout,
      policy,
    }
  }

  async fn fetch(&self, query: &str) -> Result<Vec<Place>, AppError> {
    let limit = MAX_RESULTS.to_string();
    let response = self
      .client
      .get(format!("{}/search", self.base_url))
      .query(&[("format", "json"), ("q", query), ("limit", limit.as_str())])
      .header(reqwest::header::USER_AGENT, USER_AGENT)
      .send()
      .await?;
    if !response.status().is_success() {
      return Err(AppError::Upstream(format!("Geocoder answered HTTP {}", response.status())));
    }
    let hits: Vec<NominatimHit> = response.json().await?;
    Ok(into_places(hits))
  }

  #[instrument(name = "geocode::search", skip(self), err(Display))]
  pub async fn search(&self, query: &str) -> Result<GeocodeResult, AppError> {
    let query = query.trim();
    if query.is_empty() {
      return Err(AppError::Validation("Search text is required.".to_string()));
    }
    let degraded = || GeocodeResult {
      places: Vec::new(),
      degraded: true,
    };
    match with_timeout(self.timeout, self.fetch(query)).await {
      Some(Ok(places)) => {
        debug!(hits = places.len(), "Geocoder answered.");
        Ok(GeocodeResult { places, degraded: false })
      }
      Some(Err(e)) => self.policy.resolve("geocoder", &e.to_string(), degraded),
      None => self
        .policy
        .resolve("geocoder", &format!("no answer within {:?}", self.timeout), degraded),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unparsable_coordinates_are_dropped() {
    let hits = vec![
      NominatimHit {
        display_name: "Tehran".into(),
        lat: "35.6892".into(),
        lon: "51.3890".into(),
      },
      NominatimHit {
        display_name: "Broken".into(),
        lat: "north".into(),
        lon: "51".into(),
      },
    ];
    let places = into_places(hits);
    assert_eq!(places.len(), 1);
    assert_eq!(places[0].display_name, "Tehran");
    assert!((places[0].lat - 35.6892).abs() < 1e-9);
  }

  #[tokio::test]
  async fn unreachable_geocoder_fails_open_under_allow() {
    let geocoder = Geocoder::new(Client::new(), "http://127.0.0.1:9", Duration::from_secs(2), OnUnavailable::Allow);
    let result = geocoder.search("Azadi Square").await.unwrap();
    assert!(result.degraded);
    assert!(result.places.is_empty());
  }

  #[tokio::test]
  async fn unreachable_geocoder_errors_under_deny() {
    let geocoder = Geocoder::new(Client::new(), "http://127.0.0.1:9", Duration::from_secs(2), OnUnavailable::Deny);
    assert!(matches!(geocoder.search("Azadi Square").await, Err(AppError::Upstream(_))));
  }

  #[tokio::test]
  async fn blank_query_is_rejected() {
    let geocoder = Geocoder::new(Client::new(), "http://127.0.0.1:9", Duration::from_secs(1), OnUnavailable::Allow);
    assert!(matches!(geocoder.search("  ").await, Err(AppError::Validation(_))));
  }
}

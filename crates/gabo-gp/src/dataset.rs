//! Append-only record of evaluated points.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A single evaluated point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation<P> {
    /// Point at which the objective was evaluated
    pub point: P,
    /// Observed objective value
    pub value: f64,
}

/// Observations in evaluation order, with the incumbent (lowest value)
/// tracked as entries are appended.
///
/// Only the observations are serialized. Deserializing replays them through
/// [`Dataset::push`], so the incumbent is recomputed and non-finite values
/// are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SerializedDataset<P>")]
pub struct Dataset<P> {
    observations: Vec<Observation<P>>,
    #[serde(skip)]
    incumbent: Option<usize>,
}

#[derive(Deserialize)]
struct SerializedDataset<P> {
    observations: Vec<Observation<P>>,
}

impl<P> TryFrom<SerializedDataset<P>> for Dataset<P> {
    type Error = ModelError;

    fn try_from(serialized: SerializedDataset<P>) -> Result<Self, Self::Error> {
        let mut dataset = Self::new();
        for Observation { point, value } in serialized.observations {
            dataset.push(point, value)?;
        }
        Ok(dataset)
    }
}

impl<P> Default for Dataset<P> {
    fn default() -> Self {
        Self {
            observations: Vec::new(),
            incumbent: None,
        }
    }
}

impl<P> Dataset<P> {
    /// Creates an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observation and returns its index.
    ///
    /// Non-finite values are refused since a single NaN would poison the
    /// surrogate fit.
    pub fn push(&mut self, point: P, value: f64) -> Result<usize, ModelError> {
        if !value.is_finite() {
            return Err(ModelError::InvalidObservation {
                reason: format!("observed value {value} is not finite"),
            });
        }
        let index = self.observations.len();
        let improves = self
            .incumbent()
            .map_or(true, |best| value < best.value);
        self.observations.push(Observation { point, value });
        if improves {
            self.incumbent = Some(index);
        }
        Ok(index)
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether no observation has been recorded.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// All observations in evaluation order.
    pub fn observations(&self) -> &[Observation<P>] {
        &self.observations
    }

    /// Observation at `index`.
    pub fn get(&self, index: usize) -> Option<&Observation<P>> {
        self.observations.get(index)
    }

    /// The most recent observation.
    pub fn last(&self) -> Option<&Observation<P>> {
        self.observations.last()
    }

    /// Iterates over the observed points.
    pub fn points(&self) -> impl Iterator<Item = &P> + '_ {
        self.observations.iter().map(|o| &o.point)
    }

    /// Iterates over the observed values.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.observations.iter().map(|o| o.value)
    }

    /// Observation with the lowest value, the earliest one on ties.
    pub fn incumbent(&self) -> Option<&Observation<P>> {
        self.incumbent.and_then(|i| self.observations.get(i))
    }

    /// Index of the incumbent.
    pub fn incumbent_index(&self) -> Option<usize> {
        self.incumbent
    }

    /// Lowest observed value.
    pub fn best_value(&self) -> Option<f64> {
        self.incumbent().map(|o| o.value)
    }

    /// Consumes the dataset and returns its observations.
    pub fn into_observations(self) -> Vec<Observation<P>> {
        self.observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_incumbent_tracks_minimum_first_on_ties() {
        let mut data = Dataset::new();
        assert!(data.incumbent().is_none());
        assert_eq!(data.push("a", 3.0).unwrap(), 0);
        data.push("b", 1.0).unwrap();
        data.push("c", 1.0).unwrap();
        data.push("d", 2.0).unwrap();
        assert_eq!(data.len(), 4);
        assert_eq!(data.incumbent_index(), Some(1));
        assert_eq!(data.incumbent().map(|o| o.point), Some("b"));
        assert_eq!(data.values().collect::<Vec<_>>(), vec![3.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_non_finite_values_are_refused() {
        let mut data = Dataset::new();
        data.push(0, 1.0).unwrap();
        assert!(data.push(1, f64::NAN).is_err());
        assert!(data.push(2, f64::INFINITY).is_err());
        assert_eq!(data.len(), 1);
        assert_eq!(data.best_value(), Some(1.0));
    }

    #[test]
    fn test_serde_round_trip() {
        let mut data = Dataset::new();
        data.push(vec![1.0, 0.0], 0.5).unwrap();
        data.push(vec![0.0, 1.0], -0.5).unwrap();
        let json = serde_json::to_string(&data).unwrap();
        let back: Dataset<Vec<f64>> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_deserialize_recomputes_incumbent() {
        let json = r#"{
            "observations": [
                {"point": "a", "value": 2.0},
                {"point": "b", "value": 1.0},
                {"point": "c", "value": 1.0}
            ],
            "incumbent": 7
        }"#;
        let data: Dataset<String> = serde_json::from_str(json).unwrap();
        assert_eq!(data.incumbent_index(), Some(1));
        assert_eq!(data.best_value(), Some(1.0));

        let empty: Dataset<String> =
            serde_json::from_str(r#"{"observations": [], "incumbent": 0}"#).unwrap();
        assert!(empty.incumbent().is_none());
    }

    #[test]
    fn test_deserialize_rejects_non_finite_values() {
        let serialized = SerializedDataset {
            observations: vec![
                Observation { point: 0, value: 1.0 },
                Observation { point: 1, value: f64::INFINITY },
            ],
        };
        assert!(matches!(
            Dataset::try_from(serialized),
            Err(ModelError::InvalidObservation { .. })
        ));
        assert!(serde_json::from_str::<Dataset<u32>>(
            r#"{"observations": [{"point": 0, "value": null}]}"#
        )
        .is_err());
    }
}

//! # Response Module
//!
//! The immutable instrument response handed to the cascade.
//!
//! A `Response` is an ordered, non-empty list of stages (stage 0 nearest
//! the sensor) plus the channel identity, the validity epoch and the
//! declared input/output units. It is validated once on construction and
//! never mutated afterwards; deserialization goes through the same checks.

use crate::error::{ResponseError, Result};
use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CHANNEL IDENTITY
// =============================================================================

/// Network/station/location/channel codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId {
    /// Network code.
    pub network: String,
    /// Station code.
    pub station: String,
    /// Location code, often empty.
    #[serde(default)]
    pub location: String,
    /// Channel code, e.g. `HHZ`.
    pub channel: String,
}

impl ChannelId {
    #[must_use]
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

/// Validity interval. Timestamps are carried verbatim from the metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epoch {
    /// Start of validity.
    pub start: String,
    /// `None` means still open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl Epoch {
    #[must_use]
    pub fn new(start: impl Into<String>, end: Option<String>) -> Self {
        Self {
            start: start.into(),
            end,
        }
    }
}

/// Vendor-supplied overall sensitivity of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sensitivity {
    /// Output units per input unit.
    pub value: f64,
    /// Hz.
    #[serde(default)]
    pub frequency: f64,
}

// =============================================================================
// RESPONSE
// =============================================================================

/// Wire shape of a response, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawResponse {
    #[serde(default)]
    channel: ChannelId,
    #[serde(default)]
    epoch: Epoch,
    #[serde(default)]
    input_units: String,
    #[serde(default)]
    output_units: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sensitivity: Option<Sensitivity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sample_rate: Option<f64>,
    stages: Vec<Stage>,
}

/// A complete, validated instrument response for one channel epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResponse", into = "RawResponse")]
pub struct Response {
    channel: ChannelId,
    epoch: Epoch,
    input_units: String,
    output_units: String,
    sensitivity: Option<Sensitivity>,
    sample_rate: Option<f64>,
    stages: Vec<Stage>,
}

impl Response {
    /// Build a response from its stages. Fails on an empty list or a
    /// structurally invalid stage.
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        ResponseBuilder::new().stages(stages).build()
    }

    #[must_use]
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new()
    }

    #[must_use]
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    #[must_use]
    pub fn epoch(&self) -> &Epoch {
        &self.epoch
    }

    #[must_use]
    pub fn input_units(&self) -> &str {
        &self.input_units
    }

    #[must_use]
    pub fn output_units(&self) -> &str {
        &self.output_units
    }

    #[must_use]
    pub fn sensitivity(&self) -> Option<Sensitivity> {
        self.sensitivity
    }

    /// Initial sample rate for digital stages that precede any declared rate.
    #[must_use]
    pub fn sample_rate(&self) -> Option<f64> {
        self.sample_rate
    }

    /// Stages in evaluation order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Product of the scalar `Gain` stages.
    #[must_use]
    pub fn gain_product(&self) -> f64 {
        self.stages.iter().filter_map(Stage::gain_value).product()
    }
}

impl TryFrom<RawResponse> for Response {
    type Error = ResponseError;

    fn try_from(raw: RawResponse) -> Result<Self> {
        if raw.stages.is_empty() {
            return Err(ResponseError::EmptyResponse);
        }
        for (index, stage) in raw.stages.iter().enumerate() {
            stage.validate(index)?;
        }
        if let Some(rate) = raw.sample_rate {
            if !(rate > 0.0 && rate.is_finite()) {
                return Err(ResponseError::InvalidStage {
                    index: 0,
                    reason: format!("response sample rate {rate} must be positive"),
                });
            }
        }
        Ok(Self {
            channel: raw.channel,
            epoch: raw.epoch,
            input_units: raw.input_units,
            output_units: raw.output_units,
            sensitivity: raw.sensitivity,
            sample_rate: raw.sample_rate,
            stages: raw.stages,
        })
    }
}

impl From<Response> for RawResponse {
    fn from(r: Response) -> Self {
        Self {
            channel: r.channel,
            epoch: r.epoch,
            input_units: r.input_units,
            output_units: r.output_units,
            sensitivity: r.sensitivity,
            sample_rate: r.sample_rate,
            stages: r.stages,
        }
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Incremental construction of a [`Response`].
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    raw: RawResponse,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            raw: RawResponse {
                channel: ChannelId::default(),
                epoch: Epoch::default(),
                input_units: String::new(),
                output_units: String::new(),
                sensitivity: None,
                sample_rate: None,
                stages: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn channel(mut self, channel: ChannelId) -> Self {
        self.raw.channel = channel;
        self
    }

    #[must_use]
    pub fn epoch(mut self, epoch: Epoch) -> Self {
        self.raw.epoch = epoch;
        self
    }

    #[must_use]
    pub fn units(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.raw.input_units = input.into();
        self.raw.output_units = output.into();
        self
    }

    #[must_use]
    pub fn sensitivity(mut self, value: f64, frequency: f64) -> Self {
        self.raw.sensitivity = Some(Sensitivity { value, frequency });
        self
    }

    #[must_use]
    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.raw.sample_rate = Some(rate);
        self
    }

    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.raw.stages.push(stage);
        self
    }

    #[must_use]
    pub fn stages(mut self, stages: Vec<Stage>) -> Self {
        self.raw.stages.extend(stages);
        self
    }

    pub fn build(self) -> Result<Response> {
        Response::try_from(self.raw)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stage::{Decimation, ResponseList};

    #[test]
    fn empty_response_is_rejected() {
        assert_eq!(Response::new(Vec::new()), Err(ResponseError::EmptyResponse));
    }

    #[test]
    fn invalid_stage_reports_index() {
        let err = Response::new(vec![
            Stage::gain(2.0, 1.0),
            Stage::Decimation(Decimation::new(100.0, 0)),
        ])
        .unwrap_err();
        assert!(matches!(err, ResponseError::InvalidStage { index: 1, .. }));
    }

    #[test]
    fn builder_sets_metadata() {
        let response = Response::builder()
            .channel(ChannelId::new("XX", "STA", "00", "BHZ"))
            .epoch(Epoch::new("2020-01-01T00:00:00Z", None))
            .units("M/S", "COUNTS")
            .sensitivity(1500.0, 1.0)
            .stage(Stage::gain(1500.0, 1.0))
            .build()
            .unwrap();

        assert_eq!(response.channel().to_string(), "XX.STA.00.BHZ");
        assert_eq!(response.input_units(), "M/S");
        assert_eq!(response.output_units(), "COUNTS");
        assert_eq!(response.sensitivity().map(|s| s.value), Some(1500.0));
        assert_eq!(response.stages().len(), 1);
    }

    #[test]
    fn gain_product_multiplies_gain_stages_only() {
        let response = Response::new(vec![
            Stage::gain(2.0, 1.0),
            Stage::analog(),
            Stage::gain(3.0, 1.0),
        ])
        .unwrap();
        assert_eq!(response.gain_product(), 6.0);
    }

    #[test]
    fn deserialization_validates() {
        let json = r#"{"channel":{"network":"XX","station":"A","channel":"HHZ"},"stages":[]}"#;
        assert!(serde_json::from_str::<Response>(json).is_err());

        let json = r#"{
            "input_units": "M/S",
            "output_units": "COUNTS",
            "stages": [
                {"type": "poles_zeros", "poles": [[-1.0, 0.0]], "normalization_factor": 1.0},
                {"type": "gain", "sensitivity": 800.0, "frequency_of_sensitivity": 1.0}
            ]
        }"#;
        let response: Response = serde_json::from_str(json).unwrap();
        assert_eq!(response.stages().len(), 2);
        assert_eq!(response.stages()[0].kind(), "PolesZeros");
    }

    #[test]
    fn unsorted_response_list_is_rejected_on_deserialize() {
        let list = ResponseList::new(vec![
            crate::stage::ResponseListEntry::new(2.0, 1.0, 0.0),
            crate::stage::ResponseListEntry::new(1.0, 1.0, 0.0),
        ]);
        assert!(Response::new(vec![Stage::ResponseList(list)]).is_err());
    }

    #[test]
    fn nan_response_list_frequency_is_rejected() {
        let list = ResponseList::new(
            [1.0, f64::NAN, 3.0]
                .into_iter()
                .map(|f| crate::stage::ResponseListEntry::new(f, 1.0, 0.0))
                .collect(),
        );
        let err = Response::new(vec![Stage::gain(2.0, 1.0), Stage::ResponseList(list)]).unwrap_err();
        assert!(matches!(err, ResponseError::InvalidStage { index: 1, .. }));
    }
}

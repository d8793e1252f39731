//! A world whose whole state is one column of a fixed table of time series.
//!
//! The table is read from `timeseries.json` in the data directory:
//!
//! ```json
//! { "ids": ["a", "b"], "startdate": "2016-01-01T00:00:00Z",
//!   "enddate": "2016-01-01T00:02:00Z", "data": [[1, 2, null], [4, 5, 6]] }
//! ```
//!
//! Each row of `data` belongs to the id at the same position; each column is
//! one time step. `null` marks a missing value.

use crate::adapter::{AdapterInfo, Config, WorldAdapter};
use crate::environment::Environment;
use crate::error::WorldError;
use crate::ports::{DataPorts, KeyedPorts};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::Value;
use std::any::Any;
use std::path::Path;
use tracing::{info, warn};

pub const TIMESERIES_FILE: &str = "timeseries.json";

/// How the raw series are preprocessed and presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSeriesOptions {
    /// Present columns in a random order, reshuffled every pass.
    pub shuffle: bool,
    /// Center each series on its mean and divide by its standard deviation.
    pub z_transform: bool,
    /// Center each series, clip to four standard deviations and rescale to [0, 1].
    pub clip_and_scale: bool,
    /// z-transform, then squash through a logistic sigmoid.
    pub sigmoid: bool,
}

impl Default for TimeSeriesOptions {
    fn default() -> Self {
        Self {
            shuffle: true,
            z_transform: true,
            clip_and_scale: false,
            sigmoid: true,
        }
    }
}

impl TimeSeriesOptions {
    /// Read options from a world config, keeping defaults for absent keys.
    pub fn from_config(config: &Config) -> Result<Self, WorldError> {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| -> Result<bool, WorldError> {
            match config.get(key) {
                None | Some(Value::Null) => Ok(default),
                Some(Value::Bool(b)) => Ok(*b),
                Some(other) => Err(WorldError::InvalidOptions(format!(
                    "{key} must be a boolean, got {other}"
                ))),
            }
        };
        let options = Self {
            shuffle: flag("shuffle", defaults.shuffle)?,
            z_transform: flag("z_transform", defaults.z_transform)?,
            clip_and_scale: flag("clip_and_scale", defaults.clip_and_scale)?,
            sigmoid: flag("sigmoid", defaults.sigmoid)?,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), WorldError> {
        if self.clip_and_scale && self.sigmoid {
            return Err(WorldError::InvalidOptions(
                "clip_and_scale and sigmoid cannot be combined".into(),
            ));
        }
        Ok(())
    }

    fn transforms(&self) -> bool {
        self.z_transform || self.clip_and_scale || self.sigmoid
    }
}

#[derive(Deserialize)]
struct TimeSeriesFile {
    ids: Vec<Value>,
    #[serde(default)]
    startdate: Option<DateTime<Utc>>,
    #[serde(default)]
    enddate: Option<DateTime<Utc>>,
    data: Vec<Vec<Option<f64>>>,
}

fn nanmean(row: &[f64]) -> Option<f64> {
    let (sum, n) = row
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn nanstd(row: &[f64], mean: f64) -> f64 {
    let (sum, n) = row
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + (v - mean).powi(2), n + 1));
    (sum / n as f64).sqrt()
}

/// NaN counts as zero when comparing.
fn nan_as_zero(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v }
}

/// Logistic function that avoids overflowing `exp` for very negative input.
fn sigmoid(x: f64) -> f64 {
    let cutoff = f64::MAX.ln() - 1.0;
    let x = if nan_as_zero(x) <= -cutoff { -cutoff } else { x };
    1.0 / (1.0 + (-x).exp())
}

/// Apply the configured preprocessing to every row.
///
/// Rows that are entirely missing or constant come out as all-NaN.
pub fn normalize(rows: &[Vec<f64>], options: &TimeSeriesOptions) -> Vec<Vec<f64>> {
    if !options.transforms() {
        return rows.to_vec();
    }
    rows.iter()
        .map(|row| {
            let mut out = vec![f64::NAN; row.len()];
            if let Some(mean) = nanmean(row) {
                let std = nanstd(row, mean);
                if std > 0.0 {
                    for (o, v) in out.iter_mut().zip(row) {
                        *o = if options.clip_and_scale {
                            let bound = std * 4.0;
                            let centered = v - mean;
                            let clipped = match nan_as_zero(centered) {
                                c if c > bound => bound,
                                c if c < -bound => -bound,
                                _ => centered,
                            };
                            ((clipped / bound) + 1.0) * 0.5
                        } else {
                            (v - mean) / std
                        };
                    }
                }
            }
            if options.sigmoid {
                out.iter_mut().for_each(|v| *v = sigmoid(*v));
            }
            out
        })
        .collect()
}

/// Environment cycling through the columns of a table of time series.
pub struct TimeSeries {
    ids: Vec<String>,
    pub startdate: Option<DateTime<Utc>>,
    pub enddate: Option<DateTime<Utc>>,
    series: Vec<Vec<f64>>,
    len: usize,
    options: TimeSeriesOptions,
    permutation: Vec<usize>,
    state: Vec<f64>,
}

impl TimeSeries {
    pub const WORLD_TYPE: &'static str = "TimeSeries";

    /// Load `timeseries.json` from `data_directory`.
    pub fn load(data_directory: &Path, options: TimeSeriesOptions) -> Result<Self, WorldError> {
        let path = data_directory.join(TIMESERIES_FILE);
        info!(path = %path.display(), "loading time series");
        let text = std::fs::read_to_string(&path).map_err(|source| WorldError::Io {
            path: path.clone(),
            source,
        })?;
        let file: TimeSeriesFile =
            serde_json::from_str(&text).map_err(|source| WorldError::Parse {
                path: path.clone(),
                source,
            })?;
        let ids = file
            .ids
            .into_iter()
            .map(|id| match id {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
        let data = file
            .data
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect();
        let mut series = Self::from_parts(ids, data, options).map_err(|reason| {
            WorldError::BadTimeSeries {
                path: path.clone(),
                reason,
            }
        })?;
        series.startdate = file.startdate;
        series.enddate = file.enddate;
        Ok(series)
    }

    /// Build from in-memory rows, one per id.
    pub fn from_parts(
        ids: Vec<String>,
        data: Vec<Vec<f64>>,
        options: TimeSeriesOptions,
    ) -> Result<Self, String> {
        options.validate().map_err(|e| e.to_string())?;
        if ids.len() != data.len() {
            return Err(format!("{} ids but {} rows", ids.len(), data.len()));
        }
        let len = data.first().map(Vec::len).unwrap_or(0);
        if len == 0 {
            return Err("no time steps".into());
        }
        if data.iter().any(|row| row.len() != len) {
            return Err("rows differ in length".into());
        }
        let series = normalize(&data, &options);
        let mut permutation: Vec<usize> = (0..len).collect();
        if options.shuffle {
            permutation.shuffle(&mut rand::thread_rng());
        }
        let mut world = Self {
            ids,
            startdate: None,
            enddate: None,
            series,
            len,
            options,
            permutation,
            state: Vec::new(),
        };
        world.advance(0);
        Ok(world)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Number of time steps in the table.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn options(&self) -> TimeSeriesOptions {
        self.options
    }

    /// One value per id for the current step.
    pub fn state(&self) -> &[f64] {
        &self.state
    }

    /// Column shown at `step`, drawing a new permutation at the start of
    /// each pass when shuffling.
    fn column_for_step(&mut self, step: u64) -> usize {
        let t = (step as i128 - 1).rem_euclid(self.len as i128) as usize;
        if !self.options.shuffle {
            return t;
        }
        if t == 0 {
            self.permutation.shuffle(&mut rand::thread_rng());
        }
        self.permutation[t]
    }

    fn advance(&mut self, step: u64) {
        let column = self.column_for_step(step);
        self.state = self.series.iter().map(|row| row[column]).collect();
    }
}

impl Environment for TimeSeries {
    fn world_type(&self) -> &str {
        Self::WORLD_TYPE
    }

    fn supported_worldadapters(&self) -> Vec<&'static str> {
        vec![TimeSeriesRunner::TYPE]
    }

    fn step(&mut self, current_step: u64) {
        self.advance(current_step);
    }

    fn create_worldadapter(
        &self,
        adapter_type: &str,
        info: AdapterInfo,
    ) -> Result<Box<dyn WorldAdapter>, WorldError> {
        if adapter_type != TimeSeriesRunner::TYPE {
            return Err(WorldError::UnsupportedWorldadapter {
                adapter: adapter_type.to_string(),
                world_type: Self::WORLD_TYPE.to_string(),
            });
        }
        Ok(Box::new(TimeSeriesRunner::new(info, &self.ids)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Body for agents living in a [`TimeSeries`]: one datasource per id.
pub struct TimeSeriesRunner {
    info: AdapterInfo,
    ports: KeyedPorts,
}

impl TimeSeriesRunner {
    pub const TYPE: &'static str = "TimeSeriesRunner";

    pub fn new(info: AdapterInfo, ids: &[String]) -> Self {
        Self {
            info,
            ports: KeyedPorts::new().with_datasources(ids.iter().cloned()),
        }
    }
}

impl WorldAdapter for TimeSeriesRunner {
    fn info(&self) -> &AdapterInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut AdapterInfo {
        &mut self.info
    }

    fn ports(&self) -> &dyn DataPorts {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut dyn DataPorts {
        &mut self.ports
    }

    fn update_data_sources_and_targets(&mut self, env: &dyn Environment) {
        let Some(world) = env.as_any().downcast_ref::<TimeSeries>() else {
            warn!(agent = %self.info.uid, "time series runner outside a time series world");
            return;
        };
        for (id, value) in world.ids().iter().zip(world.state()) {
            self.ports.set_datasource(id.clone(), *value);
        }
    }
}

//! Storage for the values exchanged between an agent and its world.
//!
//! [`KeyedPorts`] keeps one named value per port and lists ports in sorted
//! order. [`ArrayPorts`] keeps flat vectors in insertion order and supports
//! multi-dimensional groups, which suits engines that read and write all
//! values at once.

use crate::error::WorldError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Range;

/// Read/write access to data sources, data targets and target feedback.
pub trait DataPorts: Send + Sync {
    fn available_datasources(&self) -> Vec<String>;
    fn available_datatargets(&self) -> Vec<String>;

    /// Names of datasource groups. Only array ports have groups.
    fn datasource_groups(&self) -> Vec<String> {
        Vec::new()
    }

    fn datatarget_groups(&self) -> Vec<String> {
        Vec::new()
    }

    fn datasource_value(&self, key: &str) -> Option<f64>;
    fn datasource_values(&self) -> Vec<f64>;
    fn datatarget_value(&self, key: &str) -> Option<f64>;
    fn datatarget_values(&self) -> Vec<f64>;

    /// Whether the action behind a datatarget succeeded.
    fn datatarget_feedback_value(&self, key: &str) -> Option<f64>;
    fn datatarget_feedback_values(&self) -> Vec<f64>;

    fn add_to_datatarget(&mut self, key: &str, value: f64) -> Result<(), WorldError>;
    fn set_datatarget_values(&mut self, values: &[f64]) -> Result<(), WorldError>;
    fn add_datatarget_values(&mut self, values: &[f64]) -> Result<(), WorldError>;
    fn set_datatarget_feedback_value(&mut self, key: &str, value: f64) -> Result<(), WorldError>;

    /// Called after every world update.
    fn reset_datatargets(&mut self);
}

/// Named ports, listed alphabetically.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KeyedPorts {
    pub datasources: BTreeMap<String, f64>,
    pub datatargets: BTreeMap<String, f64>,
    pub datatarget_feedback: BTreeMap<String, f64>,
}

impl KeyedPorts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add zeroed datasources.
    pub fn with_datasources<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.datasources.insert(name.into(), 0.0);
        }
        self
    }

    /// Add zeroed datatargets, each with zeroed feedback.
    pub fn with_datatargets<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.datatargets.insert(name.clone(), 0.0);
            self.datatarget_feedback.insert(name, 0.0);
        }
        self
    }

    /// Set a datasource, creating it if needed.
    pub fn set_datasource(&mut self, key: impl Into<String>, value: f64) {
        self.datasources.insert(key.into(), value);
    }

    fn assign_positionally(
        &mut self,
        values: &[f64],
        op: impl Fn(&mut f64, f64),
    ) -> Result<(), WorldError> {
        if values.len() < self.datatargets.len() {
            return Err(WorldError::LengthMismatch {
                expected: self.datatargets.len(),
                actual: values.len(),
            });
        }
        for (slot, value) in self.datatargets.values_mut().zip(values) {
            op(slot, *value);
        }
        Ok(())
    }
}

impl DataPorts for KeyedPorts {
    fn available_datasources(&self) -> Vec<String> {
        self.datasources.keys().cloned().collect()
    }

    fn available_datatargets(&self) -> Vec<String> {
        self.datatargets.keys().cloned().collect()
    }

    fn datasource_value(&self, key: &str) -> Option<f64> {
        self.datasources.get(key).copied()
    }

    fn datasource_values(&self) -> Vec<f64> {
        self.datasources.values().copied().collect()
    }

    fn datatarget_value(&self, key: &str) -> Option<f64> {
        self.datatargets.get(key).copied()
    }

    fn datatarget_values(&self) -> Vec<f64> {
        self.datatargets.values().copied().collect()
    }

    fn datatarget_feedback_value(&self, key: &str) -> Option<f64> {
        Some(self.datatarget_feedback.get(key).copied().unwrap_or(0.0))
    }

    fn datatarget_feedback_values(&self) -> Vec<f64> {
        self.datatargets
            .keys()
            .map(|k| self.datatarget_feedback.get(k).copied().unwrap_or(0.0))
            .collect()
    }

    fn add_to_datatarget(&mut self, key: &str, value: f64) -> Result<(), WorldError> {
        // unknown targets are ignored
        if let Some(slot) = self.datatargets.get_mut(key) {
            *slot += value;
        }
        Ok(())
    }

    fn set_datatarget_values(&mut self, values: &[f64]) -> Result<(), WorldError> {
        self.assign_positionally(values, |slot, v| *slot = v)
    }

    fn add_datatarget_values(&mut self, values: &[f64]) -> Result<(), WorldError> {
        self.assign_positionally(values, |slot, v| *slot += v)
    }

    fn set_datatarget_feedback_value(&mut self, key: &str, value: f64) -> Result<(), WorldError> {
        self.datatarget_feedback.insert(key.to_string(), value);
        Ok(())
    }

    fn reset_datatargets(&mut self) {
        for value in self.datatargets.values_mut() {
            *value = 0.0;
        }
    }
}

/// Flat value vectors with named entries and shaped groups.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArrayPorts {
    datasource_names: Vec<String>,
    datatarget_names: Vec<String>,
    datasource_groups: Vec<(String, Range<usize>)>,
    datatarget_groups: Vec<(String, Range<usize>)>,
    datasource_values: Vec<f64>,
    datatarget_values: Vec<f64>,
    datatarget_feedback_values: Vec<f64>,
}

/// Names for every cell of `shape`, row-major: `vision_0_0`, `vision_0_1`, ...
fn generate_names(basename: &str, shape: &[usize]) -> Vec<String> {
    let size: usize = shape.iter().product();
    (0..size)
        .map(|flat| {
            let mut idxs = vec![0; shape.len()];
            let mut rem = flat;
            for (dim, len) in shape.iter().enumerate().rev() {
                idxs[dim] = rem % len;
                rem /= len;
            }
            std::iter::once(basename.to_string())
                .chain(idxs.iter().map(|i| i.to_string()))
                .collect::<Vec<_>>()
                .join("_")
        })
        .collect()
}

fn group_range<'a>(
    groups: &'a [(String, Range<usize>)],
    name: &str,
) -> Result<&'a Range<usize>, WorldError> {
    groups
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, r)| r)
        .ok_or_else(|| WorldError::UnknownGroup(name.to_string()))
}

fn check_len(expected: usize, actual: usize) -> Result<(), WorldError> {
    if expected != actual {
        return Err(WorldError::LengthMismatch { expected, actual });
    }
    Ok(())
}

fn shaped_initial(
    name: &str,
    shape: &[usize],
    initial_values: Option<&[f64]>,
) -> Result<Vec<f64>, WorldError> {
    let size: usize = shape.iter().product();
    match initial_values {
        Some(values) if values.len() != size => Err(WorldError::ShapeMismatch {
            name: name.to_string(),
            expected: size,
            actual: values.len(),
        }),
        Some(values) => Ok(values.to_vec()),
        None => Ok(vec![0.0; size]),
    }
}

impl ArrayPorts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a datasource and return its index.
    pub fn add_datasource(&mut self, name: impl Into<String>, initial_value: f64) -> usize {
        self.datasource_names.push(name.into());
        self.datasource_values.push(initial_value);
        self.datasource_names.len() - 1
    }

    /// Add a datatarget and return its index. Its feedback starts at the
    /// same initial value.
    pub fn add_datatarget(&mut self, name: impl Into<String>, initial_value: f64) -> usize {
        self.datatarget_names.push(name.into());
        self.datatarget_values.push(initial_value);
        self.datatarget_feedback_values.push(initial_value);
        self.datatarget_names.len() - 1
    }

    /// Add a multi-dimensional datasource. `initial_values` are given
    /// flattened, row-major.
    pub fn add_datasource_group(
        &mut self,
        name: &str,
        shape: &[usize],
        initial_values: Option<&[f64]>,
    ) -> Result<Range<usize>, WorldError> {
        let values = shaped_initial(name, shape, initial_values)?;
        Ok(self.push_datasource_group(name, shape, values))
    }

    /// Add a multi-dimensional datasource filled with zeros.
    pub fn add_zeroed_datasource_group(&mut self, name: &str, shape: &[usize]) -> Range<usize> {
        let size = shape.iter().product();
        self.push_datasource_group(name, shape, vec![0.0; size])
    }

    fn push_datasource_group(&mut self, name: &str, shape: &[usize], values: Vec<f64>) -> Range<usize> {
        let start = self.datasource_names.len();
        let range = start..start + values.len();
        self.datasource_names.extend(generate_names(name, shape));
        self.datasource_values.extend(values);
        self.datasource_groups.push((name.to_string(), range.clone()));
        range
    }

    /// Add a multi-dimensional datatarget. Feedback for the group starts at zero.
    pub fn add_datatarget_group(
        &mut self,
        name: &str,
        shape: &[usize],
        initial_values: Option<&[f64]>,
    ) -> Result<Range<usize>, WorldError> {
        let values = shaped_initial(name, shape, initial_values)?;
        Ok(self.push_datatarget_group(name, shape, values))
    }

    pub fn add_zeroed_datatarget_group(&mut self, name: &str, shape: &[usize]) -> Range<usize> {
        let size = shape.iter().product();
        self.push_datatarget_group(name, shape, vec![0.0; size])
    }

    fn push_datatarget_group(&mut self, name: &str, shape: &[usize], values: Vec<f64>) -> Range<usize> {
        let start = self.datatarget_names.len();
        let range = start..start + values.len();
        self.datatarget_names.extend(generate_names(name, shape));
        self.datatarget_feedback_values
            .extend(std::iter::repeat(0.0).take(values.len()));
        self.datatarget_values.extend(values);
        self.datatarget_groups.push((name.to_string(), range.clone()));
        range
    }

    pub fn datasource_index(&self, name: &str) -> Result<usize, WorldError> {
        self.datasource_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| WorldError::UnknownDatasource(name.to_string()))
    }

    pub fn datatarget_index(&self, name: &str) -> Result<usize, WorldError> {
        self.datatarget_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| WorldError::UnknownDatatarget(name.to_string()))
    }

    pub fn set_datasource_value(&mut self, key: &str, value: f64) -> Result<(), WorldError> {
        let idx = self.datasource_index(key)?;
        self.datasource_values[idx] = value;
        Ok(())
    }

    pub fn set_datatarget_value(&mut self, key: &str, value: f64) -> Result<(), WorldError> {
        let idx = self.datatarget_index(key)?;
        self.datatarget_values[idx] = value;
        Ok(())
    }

    pub fn datasource_group(&self, name: &str) -> Result<&[f64], WorldError> {
        let range = group_range(&self.datasource_groups, name)?;
        Ok(&self.datasource_values[range.clone()])
    }

    pub fn datatarget_group(&self, name: &str) -> Result<&[f64], WorldError> {
        let range = group_range(&self.datatarget_groups, name)?;
        Ok(&self.datatarget_values[range.clone()])
    }

    pub fn datatarget_feedback_group(&self, name: &str) -> Result<&[f64], WorldError> {
        let range = group_range(&self.datatarget_groups, name)?;
        Ok(&self.datatarget_feedback_values[range.clone()])
    }

    pub fn set_datasource_group(&mut self, name: &str, values: &[f64]) -> Result<(), WorldError> {
        let range = group_range(&self.datasource_groups, name)?.clone();
        check_len(range.len(), values.len())?;
        self.datasource_values[range].copy_from_slice(values);
        Ok(())
    }

    pub fn add_to_datatarget_group(&mut self, name: &str, values: &[f64]) -> Result<(), WorldError> {
        let range = group_range(&self.datatarget_groups, name)?.clone();
        check_len(range.len(), values.len())?;
        for (slot, value) in self.datatarget_values[range].iter_mut().zip(values) {
            *slot += value;
        }
        Ok(())
    }

    pub fn set_datatarget_feedback_group(
        &mut self,
        name: &str,
        values: &[f64],
    ) -> Result<(), WorldError> {
        let range = group_range(&self.datatarget_groups, name)?.clone();
        check_len(range.len(), values.len())?;
        self.datatarget_feedback_values[range].copy_from_slice(values);
        Ok(())
    }

    pub fn set_datasource_values(&mut self, values: &[f64]) -> Result<(), WorldError> {
        check_len(self.datasource_values.len(), values.len())?;
        self.datasource_values.copy_from_slice(values);
        Ok(())
    }

    pub fn set_datatarget_feedback_values(&mut self, values: &[f64]) -> Result<(), WorldError> {
        check_len(self.datatarget_feedback_values.len(), values.len())?;
        self.datatarget_feedback_values.copy_from_slice(values);
        Ok(())
    }

    /// Mutable view of all datasource values, for bulk writers.
    pub fn datasource_values_mut(&mut self) -> &mut [f64] {
        &mut self.datasource_values
    }

    /// Copy the current target values into the feedback vector.
    pub fn mirror_datatargets_to_feedback(&mut self) {
        self.datatarget_feedback_values
            .copy_from_slice(&self.datatarget_values);
    }
}

impl DataPorts for ArrayPorts {
    fn available_datasources(&self) -> Vec<String> {
        self.datasource_names.clone()
    }

    fn available_datatargets(&self) -> Vec<String> {
        self.datatarget_names.clone()
    }

    fn datasource_groups(&self) -> Vec<String> {
        self.datasource_groups.iter().map(|(n, _)| n.clone()).collect()
    }

    fn datatarget_groups(&self) -> Vec<String> {
        self.datatarget_groups.iter().map(|(n, _)| n.clone()).collect()
    }

    fn datasource_value(&self, key: &str) -> Option<f64> {
        let idx = self.datasource_index(key).ok()?;
        Some(self.datasource_values[idx])
    }

    fn datasource_values(&self) -> Vec<f64> {
        self.datasource_values.clone()
    }

    fn datatarget_value(&self, key: &str) -> Option<f64> {
        let idx = self.datatarget_index(key).ok()?;
        Some(self.datatarget_values[idx])
    }

    fn datatarget_values(&self) -> Vec<f64> {
        self.datatarget_values.clone()
    }

    fn datatarget_feedback_value(&self, key: &str) -> Option<f64> {
        let idx = self.datatarget_index(key).ok()?;
        Some(self.datatarget_feedback_values[idx])
    }

    fn datatarget_feedback_values(&self) -> Vec<f64> {
        self.datatarget_feedback_values.clone()
    }

    fn add_to_datatarget(&mut self, key: &str, value: f64) -> Result<(), WorldError> {
        let idx = self.datatarget_index(key)?;
        self.datatarget_values[idx] += value;
        Ok(())
    }

    fn set_datatarget_values(&mut self, values: &[f64]) -> Result<(), WorldError> {
        check_len(self.datatarget_values.len(), values.len())?;
        self.datatarget_values.copy_from_slice(values);
        Ok(())
    }

    fn add_datatarget_values(&mut self, values: &[f64]) -> Result<(), WorldError> {
        check_len(self.datatarget_values.len(), values.len())?;
        for (slot, value) in self.datatarget_values.iter_mut().zip(values) {
            *slot += value;
        }
        Ok(())
    }

    fn set_datatarget_feedback_value(&mut self, key: &str, value: f64) -> Result<(), WorldError> {
        let idx = self.datatarget_index(key)?;
        self.datatarget_feedback_values[idx] = value;
        Ok(())
    }

    fn reset_datatargets(&mut self) {
        // the engine owns target values between steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_row_major() {
        assert_eq!(
            generate_names("action", &[2, 3]),
            vec!["action_0_0", "action_0_1", "action_0_2", "action_1_0", "action_1_1", "action_1_2"]
        );
        assert_eq!(generate_names("scalar", &[]), vec!["scalar"]);
    }

    #[test]
    fn keyed_ports_are_sorted() {
        let ports = KeyedPorts::new().with_datasources(["zeta", "alpha", "mid"]);
        assert_eq!(ports.available_datasources(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn keyed_ignores_unknown_targets() {
        let mut ports = KeyedPorts::new().with_datatargets(["a"]);
        ports.add_to_datatarget("nope", 1.0).unwrap();
        ports.add_to_datatarget("a", 0.5).unwrap();
        ports.add_to_datatarget("a", 0.25).unwrap();
        assert_eq!(ports.datatarget_value("a"), Some(0.75));
        assert_eq!(ports.datatarget_value("nope"), None);
        assert_eq!(ports.datatarget_feedback_value("nope"), Some(0.0));
    }

    #[test]
    fn keyed_positional_assignment_needs_enough_values() {
        let mut ports = KeyedPorts::new().with_datatargets(["b", "a"]);
        assert!(matches!(
            ports.set_datatarget_values(&[1.0]),
            Err(WorldError::LengthMismatch { expected: 2, actual: 1 })
        ));
        ports.set_datatarget_values(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(ports.datatarget_value("a"), Some(1.0));
        assert_eq!(ports.datatarget_value("b"), Some(2.0));
        ports.add_datatarget_values(&[1.0, 1.0]).unwrap();
        assert_eq!(ports.datatarget_values(), vec![2.0, 3.0]);
        ports.reset_datatargets();
        assert_eq!(ports.datatarget_values(), vec![0.0, 0.0]);
    }

    #[test]
    fn array_groups_track_ranges() {
        let mut ports = ArrayPorts::new();
        assert_eq!(ports.add_datasource("test", 0.0), 0);
        let range = ports.add_datasource_group("vision", &[3, 7], None).unwrap();
        assert_eq!(range, 1..22);
        assert_eq!(ports.available_datasources().len(), 22);
        assert_eq!(ports.datasource_index("vision_2_6").unwrap(), 21);

        let values: Vec<f64> = (0..21).map(f64::from).collect();
        ports.set_datasource_group("vision", &values).unwrap();
        assert_eq!(ports.datasource_group("vision").unwrap()[20], 20.0);
        assert_eq!(ports.datasource_value("vision_0_1"), Some(1.0));
        assert!(ports.set_datasource_group("vision", &[1.0]).is_err());
    }

    #[test]
    fn array_group_initial_values_must_fit_shape() {
        let mut ports = ArrayPorts::new();
        let err = ports
            .add_datatarget_group("motor", &[2, 2], Some(&[1.0, 2.0, 3.0]))
            .unwrap_err();
        assert!(matches!(err, WorldError::ShapeMismatch { expected: 4, actual: 3, .. }));
        ports
            .add_datatarget_group("motor", &[2, 2], Some(&[1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        assert_eq!(ports.datatarget_feedback_group("motor").unwrap(), &[0.0; 4]);
    }

    #[test]
    fn zeroed_groups_follow_scalars() {
        let mut ports = ArrayPorts::new();
        ports.add_datatarget("test", 0.5);
        assert_eq!(ports.add_zeroed_datatarget_group("action", &[2, 3]), 1..7);
        assert_eq!(ports.add_zeroed_datasource_group("vision", &[2]), 0..2);
        assert_eq!(ports.datatarget_value("action_1_2"), Some(0.0));
        assert_eq!(ports.datatarget_groups(), vec!["action"]);
        assert_eq!(ports.datasource_group("vision").unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn array_datatarget_feedback_starts_at_initial_value() {
        let mut ports = ArrayPorts::new();
        ports.add_datatarget("grip", 0.5);
        assert_eq!(ports.datatarget_feedback_value("grip"), Some(0.5));
    }

    #[test]
    fn array_unknown_names_are_errors() {
        let mut ports = ArrayPorts::new();
        ports.add_datatarget("x", 0.0);
        assert!(matches!(
            ports.add_to_datatarget("y", 1.0),
            Err(WorldError::UnknownDatatarget(_))
        ));
        assert!(ports.set_datatarget_feedback_value("y", 1.0).is_err());
        assert!(ports.datasource_group("nothing").is_err());
    }

    #[test]
    fn array_targets_survive_reset() {
        let mut ports = ArrayPorts::new();
        ports.add_datatarget_group("action", &[2, 3], None).unwrap();
        ports
            .add_to_datatarget_group("action", &[1.0, 0.0, 0.0, 0.0, 0.0, 2.0])
            .unwrap();
        ports
            .add_to_datatarget_group("action", &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0])
            .unwrap();
        ports.reset_datatargets();
        assert_eq!(ports.datatarget_value("action_0_0"), Some(2.0));
        assert_eq!(ports.datatarget_value("action_1_2"), Some(2.0));
        assert!(ports.set_datatarget_values(&[0.0; 5]).is_err());
    }
}

use crate::environment::Environment;
use crate::ports::{ArrayPorts, DataPorts, KeyedPorts};
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Free-form configuration handed to worlds and world adapters.
pub type Config = BTreeMap<String, Value>;

/// A configuration parameter a world adapter type understands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigOption {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConfigOption {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Identity and configuration common to every world adapter.
#[derive(Debug, Clone, Serialize)]
pub struct AdapterInfo {
    pub uid: String,
    pub name: String,
    pub adapter_type: String,
    pub config: Config,
    /// Node net driving this agent, assigned once the node net is bound.
    pub nodenet: Option<String>,
}

impl AdapterInfo {
    /// Build the info for a new adapter, filling options missing from
    /// `config` with their defaults.
    pub fn new(
        adapter_type: impl Into<String>,
        uid: Option<String>,
        name: Option<String>,
        options: &[ConfigOption],
        mut config: Config,
    ) -> Self {
        for option in options {
            config
                .entry(option.name.clone())
                .or_insert_with(|| option.default.clone().unwrap_or(Value::Null));
        }
        let uid = uid.unwrap_or_else(shared::generate_uid);
        let name = name.filter(|n| !n.is_empty()).unwrap_or_else(|| uid.clone());
        Self {
            uid,
            name,
            adapter_type: adapter_type.into(),
            config,
            nodenet: None,
        }
    }
}

/// Serializable view of an adapter's ports, as reported to clients.
#[derive(Debug, Clone, Serialize)]
pub struct AdapterSnapshot {
    pub uid: String,
    pub name: String,
    pub adapter_type: String,
    pub datasources: Vec<String>,
    pub datasource_values: Vec<f64>,
    pub datatargets: Vec<String>,
    pub datatarget_values: Vec<f64>,
    pub datatarget_feedback_values: Vec<f64>,
    pub datasource_groups: Vec<String>,
    pub datatarget_groups: Vec<String>,
}

/// Transmits data between an agent and its environment.
///
/// The agent writes activations into data targets and reads data sources;
/// the world calls [`WorldAdapter::update`] once per world step to translate
/// between those values and the world.
pub trait WorldAdapter: Send + Sync {
    fn info(&self) -> &AdapterInfo;
    fn info_mut(&mut self) -> &mut AdapterInfo;
    fn ports(&self) -> &dyn DataPorts;
    fn ports_mut(&mut self) -> &mut dyn DataPorts;

    /// Read the data targets and fill the data sources.
    fn update_data_sources_and_targets(&mut self, env: &dyn Environment);

    /// Called by the world at each world step.
    fn update(&mut self, env: &dyn Environment) {
        self.update_data_sources_and_targets(env);
        self.ports_mut().reset_datatargets();
    }

    /// Whether the agent is still alive. Dead agents are removed by the world.
    fn is_alive(&self) -> bool {
        true
    }

    fn uid(&self) -> &str {
        &self.info().uid
    }

    fn snapshot(&self) -> AdapterSnapshot {
        let info = self.info();
        let ports = self.ports();
        AdapterSnapshot {
            uid: info.uid.clone(),
            name: info.name.clone(),
            adapter_type: info.adapter_type.clone(),
            datasources: ports.available_datasources(),
            datasource_values: ports.datasource_values(),
            datatargets: ports.available_datatargets(),
            datatarget_values: ports.datatarget_values(),
            datatarget_feedback_values: ports.datatarget_feedback_values(),
            datasource_groups: ports.datasource_groups(),
            datatarget_groups: ports.datatarget_groups(),
        }
    }
}

/// Example adapter with a constant, a random and an echoing port.
pub struct DefaultAdapter {
    info: AdapterInfo,
    ports: KeyedPorts,
}

impl DefaultAdapter {
    pub const TYPE: &'static str = "Default";

    pub fn new(info: AdapterInfo) -> Self {
        let ports = KeyedPorts::new()
            .with_datasources(["static_on", "random", "static_off"])
            .with_datatargets(["echo"]);
        let mut adapter = Self { info, ports };
        adapter.refresh();
        adapter
    }

    fn refresh(&mut self) {
        let echo = self.ports.datatargets.get("echo").copied().unwrap_or(0.0);
        if echo != 0.0 {
            self.ports.datatarget_feedback.insert("echo".into(), echo);
        }
        self.ports.set_datasource("static_on", 1.0);
        self.ports
            .set_datasource("random", rand::thread_rng().gen_range(0.0..1.0));
    }
}

impl WorldAdapter for DefaultAdapter {
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

    fn update_data_sources_and_targets(&mut self, _env: &dyn Environment) {
        self.refresh();
    }
}

/// Example array adapter with a scalar and a grouped port on each side.
pub struct DefaultArrayAdapter {
    info: AdapterInfo,
    ports: ArrayPorts,
}

impl DefaultArrayAdapter {
    pub const TYPE: &'static str = "DefaultArray";

    pub fn new(info: AdapterInfo) -> Self {
        let mut ports = ArrayPorts::new();
        ports.add_datasource("test", 0.0);
        ports.add_datatarget("test", 0.0);
        ports.add_zeroed_datasource_group("vision", &[3, 7]);
        ports.add_zeroed_datatarget_group("action", &[2, 3]);
        let mut adapter = Self { info, ports };
        adapter.randomize_sources();
        adapter
    }

    fn randomize_sources(&mut self) {
        let mut rng = rand::thread_rng();
        for value in self.ports.datasource_values_mut() {
            *value = rng.gen_range(0.0..1.0);
        }
    }

    pub fn array_ports(&self) -> &ArrayPorts {
        &self.ports
    }

    pub fn array_ports_mut(&mut self) -> &mut ArrayPorts {
        &mut self.ports
    }
}

impl WorldAdapter for DefaultArrayAdapter {
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

    fn update_data_sources_and_targets(&mut self, _env: &dyn Environment) {
        self.ports.mirror_datatargets_to_feedback();
        self.randomize_sources();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::DefaultEnvironment;
    use serde_json::json;

    fn info(adapter_type: &str) -> AdapterInfo {
        AdapterInfo::new(adapter_type, None, None, &[], Config::new())
    }

    #[test]
    fn config_defaults_fill_missing_options() {
        let options = vec![
            ConfigOption::new("speed").with_default(3),
            ConfigOption::new("host"),
        ];
        let mut config = Config::new();
        config.insert("speed".into(), json!(7));
        let info = AdapterInfo::new("X", Some("abc".into()), None, &options, config);
        assert_eq!(info.config["speed"], json!(7));
        assert_eq!(info.config["host"], Value::Null);
        assert_eq!(info.name, "abc");
    }

    #[test]
    fn default_adapter_echoes_into_feedback() {
        let env = DefaultEnvironment::default();
        let mut adapter = DefaultAdapter::new(info(DefaultAdapter::TYPE));
        assert_eq!(adapter.ports().datasource_value("static_on"), Some(1.0));
        assert_eq!(adapter.ports().datasource_value("static_off"), Some(0.0));

        adapter.ports_mut().add_to_datatarget("echo", 0.4).unwrap();
        adapter.update(&env);
        assert_eq!(adapter.ports().datatarget_feedback_value("echo"), Some(0.4));
        assert_eq!(adapter.ports().datatarget_value("echo"), Some(0.0));

        // a zero echo leaves the last feedback in place
        adapter.update(&env);
        assert_eq!(adapter.ports().datatarget_feedback_value("echo"), Some(0.4));

        let random = adapter.ports().datasource_value("random").unwrap();
        assert!((0.0..1.0).contains(&random));
    }

    #[test]
    fn default_array_adapter_mirrors_targets() {
        let env = DefaultEnvironment::default();
        let mut adapter = DefaultArrayAdapter::new(info(DefaultArrayAdapter::TYPE));
        assert_eq!(adapter.ports().available_datasources().len(), 22);
        assert_eq!(adapter.ports().available_datatargets().len(), 7);
        assert_eq!(adapter.ports().datasource_groups(), vec!["vision"]);
        assert_eq!(adapter.ports().datatarget_groups(), vec!["action"]);

        adapter.ports_mut().add_to_datatarget("action_1_0", 0.9).unwrap();
        adapter.update(&env);
        assert_eq!(
            adapter.ports().datatarget_feedback_value("action_1_0"),
            Some(0.9)
        );
        assert!(adapter
            .ports()
            .datasource_values()
            .iter()
            .all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn snapshot_lists_ports_in_order() {
        let adapter = DefaultAdapter::new(info(DefaultAdapter::TYPE));
        let snap = adapter.snapshot();
        assert_eq!(snap.datasources, vec!["random", "static_off", "static_on"]);
        assert_eq!(snap.datatargets, vec!["echo"]);
        assert_eq!(snap.adapter_type, "Default");
    }
}

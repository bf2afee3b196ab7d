/////////////////////////////////////////////////////////////////////////////////////
//
// Epinet model
//
// data_management module
//
// reads the model parameter file and manages the output directory tree
//
////////////////////////////////////////////////////////////////////////////////////

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;
use yaml_rust::yaml::{Yaml, YamlLoader};

use crate::baseline::BaselineParms;
use crate::environment::SimParms;
use crate::error::ModelError;
use crate::network::{NetworkGenerator, Topology, DEFAULT_EDGE_P};

// -------------------------------- File paths -------------------------------------------------

/// Locates the parameter file and owns the per-scenario output tree under
/// the model root.
pub struct ModelDataStore {
    parameter_file: PathBuf,
    scenario_dir: PathBuf,
}

impl ModelDataStore {
    /// The model root must contain `parms.yaml`.  Any pre-existing
    /// `Scenarios` output directory is deleted and recreated.
    pub fn new(model_root: &str) -> Result<ModelDataStore, ModelError> {
        let parameter_file: PathBuf = [model_root, "parms.yaml"].iter().collect();
        let scenario_dir: PathBuf = [model_root, "Scenarios"].iter().collect();

        if scenario_dir.exists() {
            fs::remove_dir_all(&scenario_dir)?;
        }
        fs::create_dir_all(&scenario_dir)?;

        info!(root = model_root, "model data store ready");

        Ok(ModelDataStore {
            parameter_file,
            scenario_dir,
        })
    }

    pub fn get_model_parms(&self) -> Result<ModelParameters, ModelError> {
        let parm_string = fs::read_to_string(&self.parameter_file)?;

        let docs = YamlLoader::load_from_str(&parm_string).map_err(|e| {
            ModelError::InvalidConfiguration(format!(
                "cannot parse {}: {}",
                self.parameter_file.display(),
                e
            ))
        })?;
        // multiple docs are possible in a yaml file; only the first one matters
        let doc = docs.get(0).ok_or_else(|| {
            ModelError::InvalidConfiguration(format!("{} is empty", self.parameter_file.display()))
        })?;

        ModelParameters::from_yaml(doc)
    }

    pub fn create_scenario_directory(&self, scenario_number: usize) -> Result<PathBuf, ModelError> {
        let dir_full_path = self.scenario_dir.join(format!("scenario_{:04}", scenario_number));
        if !dir_full_path.exists() {
            fs::create_dir(&dir_full_path)?;
        }
        Ok(dir_full_path)
    }

    pub fn scenario_dir(&self) -> &Path {
        &self.scenario_dir
    }
}

// ----------------------------- Scenario parameters -------------------------------------------
//
// A scenario sweep runs the whole trial batch once per value of a single
// tunable, mirroring a sensitivity analysis.

#[derive(Hash, Debug, Copy, Clone, Eq, PartialEq)]
pub enum ScenarioVariable {
    BaseInfectionP,
    VaccinationProtection,
    BaseVaxRate,
    OpinionDecay,
    OpinionIncreasePerNeighbor,
    RewireP,
    EdgeP,
}

impl fmt::Display for ScenarioVariable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for ScenarioVariable {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<ScenarioVariable, ModelError> {
        match s {
            "base_infection_p" => Ok(ScenarioVariable::BaseInfectionP),
            "vaccination_protection" => Ok(ScenarioVariable::VaccinationProtection),
            "base_vax_rate" => Ok(ScenarioVariable::BaseVaxRate),
            "opinion_decay" => Ok(ScenarioVariable::OpinionDecay),
            "opinion_increase_per_neighbor" => Ok(ScenarioVariable::OpinionIncreasePerNeighbor),
            "rewire_p" => Ok(ScenarioVariable::RewireP),
            "edge_p" => Ok(ScenarioVariable::EdgeP),
            _ => Err(ModelError::InvalidConfiguration(format!(
                "unknown scenario variable '{}'",
                s
            ))),
        }
    }
}

/// Network construction options.
#[derive(Debug, Copy, Clone)]
pub struct NetworkParms {
    pub topology: Topology,
    pub nodes: usize,
    pub neighbors: usize,
    pub rewire_p: f64,
    pub edge_p: f64,
}

impl NetworkParms {
    pub fn generator(&self) -> Result<NetworkGenerator, ModelError> {
        NetworkGenerator::new(self.nodes, self.topology, self.neighbors, self.rewire_p)?
            .with_edge_p(self.edge_p)
    }
}

/// Everything one scenario needs: network options plus simulation rates.
#[derive(Debug, Copy, Clone)]
pub struct ScenarioParms {
    pub network: NetworkParms,
    pub sim: SimParms,
}

/// Optional baseline comparison block.
#[derive(Debug, Copy, Clone)]
pub struct BaselineRun {
    pub runs: usize,
    pub parms: BaselineParms,
}

pub struct ModelParameters {
    pub model_name: String,
    pub model_description: String,
    pub steps: usize,
    pub trials: usize,
    pub seed: u64,
    network_parms: NetworkParms,
    sim_parms: SimParms,
    pub variable: Option<ScenarioVariable>,
    pub value_vector: Vec<f64>,
    pub current_increment: Option<usize>,
    pub baseline: Option<BaselineRun>,
}

impl ModelParameters {
    fn from_yaml(doc: &Yaml) -> Result<ModelParameters, ModelError> {
        let model_name = req_str(&doc["model_name"], "model_name")?;
        let model_description = req_str(&doc["model_description"], "model_description")?;
        let steps = req_positive(&doc["steps"], "steps")?;
        let trials = req_positive(&doc["trials"], "trials")?;
        let seed = req_u64(&doc["seed"], "seed")?;

        // network parms ------------------------------------------------
        let np = &doc["network_parms"];
        let topology: Topology = req_str(&np["topology"], "network_parms.topology")?.parse()?;
        let network_parms = NetworkParms {
            topology,
            nodes: req_positive(&np["nodes"], "network_parms.nodes")?,
            neighbors: req_positive(&np["neighbors"], "network_parms.neighbors")?,
            rewire_p: opt_f64(&np["rewire_p"], "network_parms.rewire_p", 0.1)?,
            edge_p: opt_f64(&np["edge_p"], "network_parms.edge_p", DEFAULT_EDGE_P)?,
        };

        // sim parms, every key optional with the model defaults ---------
        let sp = &doc["sim_parms"];
        let defaults = SimParms::default();
        let sim_parms = SimParms {
            base_infection_p: opt_f64(
                &sp["base_infection_p"],
                "sim_parms.base_infection_p",
                defaults.base_infection_p,
            )?,
            vaccination_protection: opt_f64(
                &sp["vaccination_protection"],
                "sim_parms.vaccination_protection",
                defaults.vaccination_protection,
            )?,
            base_vax_rate: opt_f64(&sp["base_vax_rate"], "sim_parms.base_vax_rate", defaults.base_vax_rate)?,
            opinion_decay: opt_f64(&sp["opinion_decay"], "sim_parms.opinion_decay", defaults.opinion_decay)?,
            opinion_increase_per_neighbor: opt_f64(
                &sp["opinion_increase_per_neighbor"],
                "sim_parms.opinion_increase_per_neighbor",
                defaults.opinion_increase_per_neighbor,
            )?,
        };

        // scenario sweep (optional) -------------------------------------
        let scp = &doc["scenario_parms"];
        let (variable, value_vector) = if scp.is_badvalue() {
            (None, Vec::new())
        } else {
            let variable: ScenarioVariable =
                req_str(&scp["scenario_variable"], "scenario_parms.scenario_variable")?.parse()?;
            let values = scp["scenario_values"].as_vec().ok_or_else(|| {
                ModelError::InvalidConfiguration(String::from(
                    "missing or invalid scenario_parms.scenario_values",
                ))
            })?;
            let mut value_vector: Vec<f64> = Vec::with_capacity(values.len());
            for v in values {
                value_vector.push(yaml_f64(v).ok_or_else(|| {
                    ModelError::InvalidConfiguration(String::from(
                        "non-numeric entry in scenario_parms.scenario_values",
                    ))
                })?);
            }
            if value_vector.is_empty() {
                return Err(ModelError::InvalidConfiguration(String::from(
                    "scenario_parms.scenario_values is empty",
                )));
            }
            (Some(variable), value_vector)
        };

        // baseline comparison (optional) --------------------------------
        let bp = &doc["baseline_parms"];
        let baseline = if bp.is_badvalue() {
            None
        } else {
            let parms = BaselineParms {
                population: req_u64(&bp["population"], "baseline_parms.population")?,
                initial_infected: req_u64(&bp["initial_infected"], "baseline_parms.initial_infected")?,
                initial_recovered: opt_u64(&bp["initial_recovered"], "baseline_parms.initial_recovered", 0)?,
                beta: req_f64(&bp["beta"], "baseline_parms.beta")?,
                gamma: req_f64(&bp["gamma"], "baseline_parms.gamma")?,
                days: req_positive(&bp["days"], "baseline_parms.days")?,
            };
            parms.validate()?;
            Some(BaselineRun {
                runs: req_positive(&bp["runs"], "baseline_parms.runs")?,
                parms,
            })
        };

        let parms = ModelParameters {
            model_name,
            model_description,
            steps,
            trials,
            seed,
            network_parms,
            sim_parms,
            variable,
            value_vector,
            current_increment: None,
            baseline,
        };

        // fail fast on out-of-range rates and network options
        parms.sim_parms.validate()?;
        parms.network_parms.generator()?;

        Ok(parms)
    }

    pub fn scenario_count(&self) -> usize {
        if self.value_vector.is_empty() {
            1
        } else {
            self.value_vector.len()
        }
    }

    fn scenario_parms(&self) -> ScenarioParms {
        ScenarioParms {
            network: self.network_parms,
            sim: self.sim_parms,
        }
    }
}

impl fmt::Display for ModelParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Model name {}\nModel description {}\nNetwork {} with {} nodes\n",
            self.model_name, self.model_description, self.network_parms.topology, self.network_parms.nodes
        )?;
        match self.variable {
            Some(variable) => write!(
                f,
                "Scenario sweep on {} with values {:?}",
                variable, self.value_vector
            ),
            None => write!(f, "Single scenario with base parameters"),
        }
    }
}

// the Iterator trait for model parameters issues a sequence of
// ScenarioParms, each one differing only by the next value of the swept
// variable.  With no sweep configured it yields the base scenario once.
impl Iterator for ModelParameters {
    type Item = ScenarioParms;

    fn next(&mut self) -> Option<ScenarioParms> {
        let increment = match self.current_increment {
            Some(i) => i + 1,
            None => 0,
        };
        self.current_increment = Some(increment);

        if self.value_vector.is_empty() {
            if increment == 0 {
                return Some(self.scenario_parms());
            }
            return None;
        }
        if increment == self.value_vector.len() {
            return None;
        }

        let value = self.value_vector[increment];
        match self.variable {
            Some(ScenarioVariable::BaseInfectionP) => self.sim_parms.base_infection_p = value,
            Some(ScenarioVariable::VaccinationProtection) => {
                self.sim_parms.vaccination_protection = value
            }
            Some(ScenarioVariable::BaseVaxRate) => self.sim_parms.base_vax_rate = value,
            Some(ScenarioVariable::OpinionDecay) => self.sim_parms.opinion_decay = value,
            Some(ScenarioVariable::OpinionIncreasePerNeighbor) => {
                self.sim_parms.opinion_increase_per_neighbor = value
            }
            Some(ScenarioVariable::RewireP) => self.network_parms.rewire_p = value,
            Some(ScenarioVariable::EdgeP) => self.network_parms.edge_p = value,
            None => (),
        }

        Some(self.scenario_parms())
    }
}

// ----------------------------- yaml helpers --------------------------------------------------

fn yaml_f64(node: &Yaml) -> Option<f64> {
    node.as_f64().or_else(|| node.as_i64().map(|v| v as f64))
}

fn req_str(node: &Yaml, name: &str) -> Result<String, ModelError> {
    node.as_str().map(String::from).ok_or_else(|| {
        ModelError::InvalidConfiguration(format!("missing or invalid parameter '{}'", name))
    })
}

fn req_f64(node: &Yaml, name: &str) -> Result<f64, ModelError> {
    yaml_f64(node).ok_or_else(|| {
        ModelError::InvalidConfiguration(format!("missing or invalid parameter '{}'", name))
    })
}

fn opt_f64(node: &Yaml, name: &str, default: f64) -> Result<f64, ModelError> {
    if node.is_badvalue() {
        return Ok(default);
    }
    req_f64(node, name)
}

fn req_u64(node: &Yaml, name: &str) -> Result<u64, ModelError> {
    match node.as_i64() {
        Some(v) if v >= 0 => Ok(v as u64),
        _ => Err(ModelError::InvalidConfiguration(format!(
            "missing or invalid parameter '{}'",
            name
        ))),
    }
}

fn opt_u64(node: &Yaml, name: &str, default: u64) -> Result<u64, ModelError> {
    if node.is_badvalue() {
        return Ok(default);
    }
    req_u64(node, name)
}

fn req_positive(node: &Yaml, name: &str) -> Result<usize, ModelError> {
    match node.as_i64() {
        Some(v) if v > 0 => Ok(v as usize),
        _ => Err(ModelError::InvalidConfiguration(format!(
            "parameter '{}' must be a positive integer",
            name
        ))),
    }
}

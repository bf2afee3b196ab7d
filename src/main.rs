use std::env;
use std::io::{self, Write};
use std::process;

use rand::rngs::StdRng;
use rand::SeedableRng;

use epinet::baseline::stochastic_sir;
use epinet::data_management::{BaselineRun, ModelDataStore, ScenarioParms};
use epinet::environment::Environment;
use epinet::error::ModelError;
use epinet::stats::{TickLog, TickRecord, TrialLog, TrialRecord};
use epinet::utilities::{mean, std_dev};

// baseline runs whose seed fizzles before a real outbreak are excluded
// from the summary
const BASELINE_PEAK_FLOOR: u64 = 5;

fn main() {
    tracing_subscriber::fmt::init();

    // process command line arguments (just the model root directory location)
    let args: Vec<_> = env::args().collect();
    let model_root = match args.get(1) {
        Some(root) => root.clone(),
        None => {
            eprintln!("Error: no model location specified");
            process::exit(1);
        }
    };

    if let Err(e) = run(&model_root) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(model_root: &str) -> Result<(), ModelError> {
    // the model data store handles all model inputs and outputs
    let data_store = ModelDataStore::new(model_root)?;
    let model_parms = data_store.get_model_parms()?;

    println!("\n--------------------Epinet Model-----------------------");
    println!("{}", model_parms);
    println!(
        "Model runs {} scenarios of {} trials x {} steps",
        model_parms.scenario_count(),
        model_parms.trials,
        model_parms.steps
    );

    let steps = model_parms.steps;
    let trials = model_parms.trials;
    let seed = model_parms.seed;
    let baseline = model_parms.baseline;
    let mut scenario_number = 0;

    // loop around scenarios
    for scenario in model_parms {
        scenario_number += 1;

        println!(
            "\nStarting scenario {} ------------------------------------------------------------",
            scenario_number
        );
        let scenario_dir = data_store.create_scenario_directory(scenario_number)?;
        let tick_log = TickLog::new(&scenario_dir)?;
        let trial_log = TrialLog::new(&scenario_dir)?;

        let mut peaks: Vec<f64> = Vec::with_capacity(trials);
        let mut trial_records: Vec<TrialRecord> = Vec::with_capacity(trials);

        print!("Running {} trials", trials);
        for trial in 0..trials {
            // every trial gets its own random stream so runs reproduce and
            // trials stay independent
            let trial_seed = seed + (scenario_number * 1000 + trial) as u64;
            let outcome = run_trial(&scenario, steps, scenario_number, trial, trial_seed)?;
            tick_log.append(&outcome.ticks)?;
            peaks.push(outcome.record.peak_infected as f64);
            trial_records.push(outcome.record);
            print!(".");
            io::stdout().flush()?;
        }
        println!();

        trial_log.append(&trial_records)?;
        println!("Mean peak infected: {:.2}", mean(&peaks));
        println!("Std dev: {:.2}", std_dev(&peaks));
    }

    if let Some(baseline) = baseline {
        run_baseline(&baseline, seed)?;
    }

    Ok(())
}

struct TrialOutcome {
    ticks: Vec<TickRecord>,
    record: TrialRecord,
}

// one full simulation: generate the network, build the environment and
// drive it for the configured number of steps
fn run_trial(
    scenario: &ScenarioParms,
    steps: usize,
    scenario_number: usize,
    trial: usize,
    trial_seed: u64,
) -> Result<TrialOutcome, ModelError> {
    let mut rng = StdRng::seed_from_u64(trial_seed);

    let generator = scenario.network.generator()?;
    let (edges, positions) = generator.generate(&mut rng);
    let mut env = Environment::new(edges, positions, scenario.sim, &mut rng)?;

    let mut ticks: Vec<TickRecord> = Vec::with_capacity(steps + 1);
    let mut peak = env.infected_count();
    ticks.push(TickRecord {
        scenario: scenario_number,
        trial,
        tick: 0,
        infected: env.infected_count(),
        vaccinated: env.vaccinated_count(),
        mean_opinion: env.mean_opinion(),
        new_infections: 0,
    });

    for tick in 1..=steps {
        let infected_edges = env.step(&mut rng);
        let infected = env.infected_count();
        if infected > peak {
            peak = infected;
        }
        ticks.push(TickRecord {
            scenario: scenario_number,
            trial,
            tick,
            infected,
            vaccinated: env.vaccinated_count(),
            mean_opinion: env.mean_opinion(),
            new_infections: infected_edges.len(),
        });
    }

    let record = TrialRecord {
        scenario: scenario_number,
        trial,
        seed: trial_seed,
        peak_infected: peak,
        final_infected: env.infected_count(),
        final_vaccinated: env.vaccinated_count(),
        final_mean_opinion: env.mean_opinion(),
    };

    Ok(TrialOutcome { ticks, record })
}

// the graph-free stochastic SIR counter, reported for comparison
fn run_baseline(baseline: &BaselineRun, seed: u64) -> Result<(), ModelError> {
    let mut peaks: Vec<f64> = Vec::with_capacity(baseline.runs);
    for run in 0..baseline.runs {
        let mut rng = StdRng::seed_from_u64(seed + run as u64);
        let series = stochastic_sir(&baseline.parms, &mut rng)?;
        let peak = series.peak_infected();
        if peak <= BASELINE_PEAK_FLOOR {
            continue;
        }
        peaks.push(peak as f64);
    }

    println!("\n----- SIR baseline peak infection statistics -----");
    println!(
        "Runs: {} ({} above the fizzle floor)",
        baseline.runs,
        peaks.len()
    );
    println!("Mean peak infected: {:.2}", mean(&peaks));
    println!("Standard deviation: {:.2}", std_dev(&peaks));
    println!("--------------------------------------------------");
    Ok(())
}

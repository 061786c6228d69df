#[macro_use]
extern crate timeit;
extern crate env_logger;
extern crate flatnet;
extern crate rand;

use std::env;
use std::sync::Arc;
use flatnet::activation::ActivationType;
use flatnet::concurrent::{ConcurrentTrainingManager, LogStatus, ManagerConfig, TrainingJob};
use flatnet::data::MemoryTrainingSet;
use flatnet::network::{FlatNetwork, NetworkConfig};
use flatnet::solver::{Solver, SolverConfig};
use flatnet::solvers::{Momentum, Resilient};
use flatnet::weight::FillerType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn main() {
    env_logger::init();

    let modes: Vec<String> = vec!("iteration".to_string(), "sweep".to_string());
    if let Some(mode) = env::args().nth(1) {
        if mode == "iteration" {
            bench_iteration();
        } else if mode == "sweep" {
            bench_sweep();
        } else {
            println!("Sorry, no benchmark found with name '{:?}'. Valid options: {:?}", mode, modes);
        }
    } else {
        println!("No benchmark specified. Default: `iteration`. Valid options: {:?}", modes);
        bench_iteration();
    }
}

// a smooth target the networks can learn: y = sin(x0) * cos(x1)
fn dataset(records: usize, rng: &mut StdRng) -> MemoryTrainingSet {
    let mut inputs = Vec::with_capacity(records);
    let mut ideals = Vec::with_capacity(records);
    for _ in 0..records {
        let x0: f64 = rng.gen_range(-3f64..3f64);
        let x1: f64 = rng.gen_range(-3f64..3f64);
        inputs.push(vec![x0, x1]);
        ideals.push(vec![x0.sin() * x1.cos()]);
    }
    MemoryTrainingSet::from_slices(&inputs, &ideals).unwrap()
}

fn network(hidden: usize, rng: &mut StdRng) -> FlatNetwork {
    let cfg = NetworkConfig::feedforward(&format!("sine-{}", hidden), &[2, hidden, hidden, 1], ActivationType::TanH);
    let mut network = FlatNetwork::from_config(&cfg).unwrap();
    network.randomize(&FillerType::Glorot, rng).unwrap();
    network
}

fn bench_iteration() {
    let mut rng = StdRng::seed_from_u64(42);
    let data = dataset(20_000, &mut rng);
    for threads in &[1usize, 2, 4, 0] {
        let config = SolverConfig { base_lr: 0.001f64, threads: *threads, ..SolverConfig::default() };
        let mut solver = Solver::from_config(network(32, &mut rng), Box::new(data.clone()), Momentum::new(), &config).unwrap();
        println!("{} gradient workers:", solver.worker_count());
        let seconds = timeit_loops!(10, {
            solver.iteration().unwrap();
        });
        println!("  {:.3} ms per iteration, error after {} iterations: {:.6}",
                 seconds * 1000f64, solver.iter(), solver.error());
    }
}

fn bench_sweep() {
    let mut rng = StdRng::seed_from_u64(7);
    let data = dataset(2_000, &mut rng);
    let mut manager = ConcurrentTrainingManager::from_config(ManagerConfig::default())
        .unwrap()
        .with_status(Arc::new(LogStatus));
    for hidden in &[4usize, 8, 12, 16, 24, 32] {
        let job = TrainingJob::new(&format!("sine-{}", hidden), network(*hidden, &mut rng), Box::new(data.clone()),
                                   Resilient::default(), &SolverConfig::default(), 200, 0.001f64);
        manager.add_job(Box::new(job)).unwrap();
    }
    let seconds = timeit_loops!(1, {
        let summary = manager.run().unwrap();
        println!("{} jobs done, {} failed", summary.completed, summary.failed);
    });
    println!("sweep took {:.2} s", seconds);
}

//! Plans the reference day with all three objective variants.
//!
//! Run with: `cargo run --example reference_day`

use loadshift::scenario::{random_tasks, reference_group_caps, reference_tasks};
use loadshift::scheduling::{Horizon, PriceCurve, StabilityWeights, Task, TaskSet};
use loadshift::{Planner, PlannerConfig, Schedule};
use qtty::{Minute, Quantity};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() {
    println!("=== Reference Day ===\n");

    let tasks = reference_tasks();
    println!(
        "{} agents, {} tasks, {:.1} kWh total demand",
        tasks.num_agents(),
        tasks.num_tasks(),
        tasks.total_demand()
    );

    let config = PlannerConfig::default()
        .with_group_caps(reference_group_caps())
        .with_parallel(true);
    let planner = Planner::new(config.clone());

    // Variant A: one independent solve per agent
    println!("\n--- Price-weighted (per agent) ---");
    let per_agent = planner.plan_price_weighted(&tasks).unwrap();
    for (agent, outcome) in per_agent.iter() {
        match outcome.schedule() {
            Some(schedule) => println!("{agent}: cost {:.4}", schedule.total_cost()),
            None => println!("{agent}: {}", outcome.status()),
        }
    }
    if let Some(total) = per_agent.total_cost() {
        println!("Total: {total:.4}");
    }

    // Variant B: joint solve penalising slot-to-slot swings
    println!("\n--- Temporal stability (joint) ---");
    for (alpha, beta) in [(1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
        let planner = Planner::new(
            config
                .clone()
                .with_stability(StabilityWeights::new(alpha, beta)),
        );
        match planner.plan_stability(&tasks).unwrap().schedule() {
            Some(schedule) => println!(
                "alpha={alpha} beta={beta}: cost {:.4}, variation {:.4}",
                schedule.total_cost(),
                variation(schedule.usage())
            ),
            None => println!("alpha={alpha} beta={beta}: not optimal"),
        }
    }

    // Variant C: unit price grows with aggregate usage
    println!("\n--- Congestion pricing (joint) ---");
    let outcome = planner.plan_congestion(&tasks).unwrap();
    if let Some(schedule) = outcome.schedule() {
        print_usage(schedule);
    }

    println!("\n--- Half-hour slots ---");
    half_hour_day();

    println!("\n--- Random agents ---");
    let mut rng = StdRng::seed_from_u64(2024);
    let random = random_tasks(&mut rng, 8, 6, &Horizon::hourly(24));
    let result = planner.plan_price_weighted(&random).unwrap();
    println!(
        "{} agents solved, {} failures, total cost {:?}",
        result.len(),
        result.failures().len(),
        result.total_cost()
    );
}

fn half_hour_day() {
    let horizon = Horizon::new(48, Quantity::<Minute>::new(30.0)).unwrap();
    let prices: Vec<f64> = (0..48).map(|s| if (14..34).contains(&s) { 6.0 } else { 3.5 }).collect();
    let config = PlannerConfig {
        horizon,
        prices: PriceCurve::new(prices),
        group_caps: Default::default(),
        ..PlannerConfig::default()
    };
    let tasks: TaskSet = [
        ("Car", vec![Task::new(36, 47, 7.0, 30.0)]),
        ("Heater", vec![Task::new(0, 47, 2.0, 12.0), Task::new(10, 20, 1.0, 3.0)]),
    ]
    .into_iter()
    .collect();

    let result = Planner::new(config).plan_price_weighted(&tasks).unwrap();
    for (agent, outcome) in result.iter() {
        if let Some(schedule) = outcome.schedule() {
            println!("{agent}: cost {:.2}", schedule.total_cost());
        }
    }
}

fn variation(usage: &[f64]) -> f64 {
    usage.windows(2).map(|w| (w[1] - w[0]).abs()).sum()
}

fn print_usage(schedule: &Schedule) {
    println!("Total cost: {:.3}", schedule.total_cost());
    for (slot, (usage, unit)) in schedule
        .usage()
        .iter()
        .zip(schedule.unit_prices())
        .enumerate()
    {
        println!("  slot {slot:2}: {usage:5.2} kW at {unit:.3}");
    }
}

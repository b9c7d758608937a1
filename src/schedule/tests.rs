//! End-to-end tests: build, solve and extract for all three variants.

use super::*;
use crate::scenario::{random_tasks, reference_group_caps, reference_prices, reference_tasks};
use crate::scheduling::{
    build_price_weighted, BuildError, GroupCaps, PriceCurve, StabilityMetric, StabilityWeights,
    Task, TaskDefect, TaskSet,
};
use crate::{Planner, PlannerConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

const DEMAND_TOL: f64 = 1e-6;

/// Helper to build a one-agent task set.
fn single_agent(tasks: Vec<Task>) -> TaskSet {
    [("User1", tasks)].into_iter().collect()
}

fn hourly_config(prices: Vec<f64>, caps: GroupCaps) -> PlannerConfig {
    PlannerConfig {
        horizon: Horizon::hourly(prices.len()),
        prices: PriceCurve::new(prices),
        group_caps: caps,
        ..PlannerConfig::default()
    }
}

fn reference_config(caps: GroupCaps) -> PlannerConfig {
    PlannerConfig::default().with_group_caps(caps)
}

/// Every task receives its demand and stays within `[0, cap]`.
fn assert_demands_met(tasks: &TaskSet, schedule: &Schedule) {
    for (key, task) in tasks.iter() {
        let delivered = schedule.delivered(&key);
        assert!(
            (delivered - task.demand).abs() < DEMAND_TOL,
            "{key}: delivered {delivered}, demand {}",
            task.demand
        );
        let alloc = schedule.allocation().task(&key).unwrap();
        for &v in &alloc.values {
            assert!(v >= 0.0 && v <= task.cap, "{key}: {v} outside [0, {}]", task.cap);
        }
    }
}

fn independent_congestion_cost(usage: &[f64]) -> f64 {
    usage.iter().map(|u| 0.5 * u * u).sum()
}

#[cfg(test)]
mod worked_examples {
    use super::*;

    #[test]
    fn test_two_slot_example() {
        let planner = Planner::new(hourly_config(vec![1.0, 2.0], GroupCaps::new()));
        let tasks = single_agent(vec![Task::new(0, 1, 1.0, 1.0)]);
        let result = planner.plan_price_weighted(&tasks).unwrap();
        let schedule = result.get("User1").and_then(|o| o.schedule()).unwrap();

        let key = TaskKey::new("User1", 0);
        assert_eq!(schedule.allocation().get(&key, 0), 1.0);
        assert_eq!(schedule.allocation().get(&key, 1), 0.0);
        assert!((schedule.total_cost() - 1.0).abs() < 1e-9);
        assert!((schedule.objective_value() - 1.0).abs() < 1e-9);
        assert_eq!(schedule.kind(), ScheduleKind::PriceWeighted);
    }

    #[test]
    fn test_single_slot_window_takes_all_demand() {
        let planner = Planner::new(hourly_config(vec![3.0, 1.0, 2.0], GroupCaps::new()));
        let tasks = single_agent(vec![Task::new(1, 1, 2.0, 1.5)]);
        let result = planner.plan_price_weighted(&tasks).unwrap();
        let schedule = result.get("User1").and_then(|o| o.schedule()).unwrap();
        assert_eq!(schedule.allocation().get(&TaskKey::new("User1", 0), 1), 1.5);
        assert_eq!(schedule.usage(), &[0.0, 1.5, 0.0]);
    }

    #[test]
    fn test_single_slot_over_cap_fails_fast() {
        let planner = Planner::new(hourly_config(vec![1.0, 2.0], GroupCaps::new()));
        let tasks = single_agent(vec![Task::new(0, 0, 1.0, 2.0)]);
        let err = planner.plan_price_weighted(&tasks).unwrap_err();
        assert_eq!(
            err,
            BuildError::InfeasibleTaskSpec {
                agent: "User1".to_string(),
                task: 0,
                reason: TaskDefect::DemandExceedsCapacity,
            }
        );
        assert!(planner.plan_congestion(&tasks).is_err());
        assert!(planner.plan_stability(&tasks).is_err());
    }

    #[test]
    fn test_group_cap_infeasibility_is_a_status() {
        // demand 2 over two slots needs both slots at full power
        let caps = GroupCaps::new().with_cap(0, 0.5);
        let planner = Planner::new(hourly_config(vec![1.0, 1.0], caps));
        let tasks = single_agent(vec![Task::new(0, 1, 1.0, 2.0)]);
        let result = planner.plan_price_weighted(&tasks).unwrap();

        let outcome = result.get("User1").unwrap();
        assert_eq!(outcome.status(), SolveStatus::Infeasible);
        assert!(outcome.schedule().is_none());
        assert_eq!(result.total_cost(), None);
        assert_eq!(result.usage(), None);
        assert_eq!(result.failures().len(), 1);
        assert!(!result.all_optimal());
    }

    #[test]
    fn test_zero_demand_task() {
        let planner = Planner::new(hourly_config(vec![1.0, 2.0], GroupCaps::new()));
        let tasks = single_agent(vec![Task::new(0, 1, 1.0, 0.0)]);
        let result = planner.plan_price_weighted(&tasks).unwrap();
        let schedule = result.get("User1").and_then(|o| o.schedule()).unwrap();
        assert_eq!(schedule.total_cost(), 0.0);
        assert_eq!(schedule.usage(), &[0.0, 0.0]);
    }

    #[test]
    fn test_half_hour_slots_deliver_energy() {
        let cfg = PlannerConfig {
            horizon: Horizon::from_hours(4, 0.5).unwrap(),
            prices: PriceCurve::new(vec![4.0, 1.0, 1.0, 4.0]),
            group_caps: GroupCaps::new(),
            ..PlannerConfig::default()
        };
        // 1 unit of energy at up to 1 unit of power: two half-hour slots
        let tasks = single_agent(vec![Task::new(0, 3, 1.0, 1.0)]);
        let result = Planner::new(cfg).plan_price_weighted(&tasks).unwrap();
        let schedule = result.get("User1").and_then(|o| o.schedule()).unwrap();
        assert_demands_met(&tasks, schedule);
        assert_eq!(schedule.usage(), &[0.0, 1.0, 1.0, 0.0]);
        assert!((schedule.total_cost() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_extract_rejects_failed_solution() {
        let sm = build_price_weighted(
            "a",
            &[Task::new(0, 1, 1.0, 1.0)],
            &Horizon::hourly(2),
            &PriceCurve::flat(2, 1.0),
            &GroupCaps::new(),
        )
        .unwrap();
        let failed = Solution {
            status: SolveStatus::NumericalFailure,
            values: Vec::new(),
            objective: f64::NAN,
            iterations: 100,
            duals: Vec::new(),
        };
        assert_eq!(
            sm.extract(&failed),
            ScheduleOutcome::NotOptimal(SolveStatus::NumericalFailure)
        );
    }

    #[test]
    fn test_values_are_snapped_onto_bounds() {
        let sm = build_price_weighted(
            "a",
            &[Task::new(0, 1, 1.0, 1.0)],
            &Horizon::hourly(2),
            &PriceCurve::new(vec![1.0, 2.0]),
            &GroupCaps::new(),
        )
        .unwrap();
        let noisy = Solution {
            status: SolveStatus::Optimal,
            values: vec![1.0 + 1e-12, -1e-13],
            objective: 1.0,
            iterations: 1,
            duals: vec![1.0],
        };
        let schedule = sm.extract(&noisy).into_schedule().unwrap();
        let alloc = schedule.allocation().task(&TaskKey::new("a", 0)).unwrap();
        assert_eq!(alloc.values, vec![1.0, 0.0]);
        assert_eq!(alloc.deadline(), 1);
    }

    #[test]
    fn test_schedule_ids_are_unique() {
        let sm = build_price_weighted(
            "a",
            &[Task::new(0, 1, 1.0, 1.0)],
            &Horizon::hourly(2),
            &PriceCurve::new(vec![1.0, 2.0]),
            &GroupCaps::new(),
        )
        .unwrap();
        let options = SolverOptions::default();
        let first = sm.solve(&options).into_schedule().unwrap();
        let second = sm.solve(&options).into_schedule().unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(first.allocation(), second.allocation());
    }

    #[test]
    fn test_empty_outcome_costs_positive_zero() {
        let total = PerAgentOutcome::default().total_cost().unwrap();
        assert_eq!(total, 0.0);
        assert!(total.is_sign_positive());
    }

    #[test]
    fn test_total_cost_needs_every_agent_optimal() {
        let sm = build_price_weighted(
            "a",
            &[Task::new(0, 1, 1.0, 1.0)],
            &Horizon::hourly(2),
            &PriceCurve::new(vec![1.0, 2.0]),
            &GroupCaps::new(),
        )
        .unwrap();
        let solved = sm.solve(&SolverOptions::default());
        let outcomes: BTreeMap<AgentId, ScheduleOutcome> = [
            ("a".to_string(), solved.clone()),
            ("b".to_string(), solved),
        ]
        .into_iter()
        .collect();
        assert_eq!(PerAgentOutcome::new(outcomes.clone()).total_cost(), Some(2.0));

        let mut outcomes = outcomes;
        outcomes.insert(
            "c".to_string(),
            ScheduleOutcome::NotOptimal(SolveStatus::Infeasible),
        );
        assert_eq!(PerAgentOutcome::new(outcomes).total_cost(), None);
    }
}

#[cfg(test)]
mod reference_day {
    use super::*;

    const REFERENCE_TOTAL: f64 = 463.972381302;

    #[test]
    fn test_price_weighted_per_user() {
        let tasks = reference_tasks();
        let planner = Planner::new(reference_config(reference_group_caps()));
        assert_eq!(planner.config().prices, reference_prices());
        let result = planner.plan_price_weighted(&tasks).unwrap();
        assert!(result.all_optimal());

        let expected = [
            ("User1", 104.7309),
            ("User2", 80.9515),
            ("User3", 99.9416),
            ("User4", 97.4169),
            ("User5", 80.9315),
        ];
        for (user, cost) in expected {
            let schedule = result.get(user).and_then(|o| o.schedule()).unwrap();
            assert!(
                (schedule.total_cost() - cost).abs() < 1e-4,
                "{user}: {}",
                schedule.total_cost()
            );
            let agent_tasks: TaskSet = [(user, tasks.agent(user).unwrap().to_vec())]
                .into_iter()
                .collect();
            assert_demands_met(&agent_tasks, schedule);
            for (slot, limit) in reference_group_caps().iter() {
                assert!(schedule.usage()[slot] <= limit + DEMAND_TOL);
            }
        }
        let total = result.total_cost().unwrap();
        assert!((total - REFERENCE_TOTAL).abs() < 1e-6, "total {total}");
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let tasks = reference_tasks();
        let sequential = Planner::new(reference_config(reference_group_caps()))
            .plan_price_weighted(&tasks)
            .unwrap();
        let parallel = Planner::new(PlannerConfig {
            workers: Some(3),
            ..reference_config(reference_group_caps()).with_parallel(true)
        })
        .plan_price_weighted(&tasks)
        .unwrap();

        assert_eq!(sequential.len(), parallel.len());
        for ((a, s), (b, p)) in sequential.iter().zip(parallel.iter()) {
            assert_eq!(a, b);
            let (s, p) = (s.schedule().unwrap(), p.schedule().unwrap());
            assert_eq!(s.allocation(), p.allocation());
            assert_eq!(s.total_cost(), p.total_cost());
        }
    }

    #[test]
    fn test_joint_stability_reduces_to_price_weighted() {
        let tasks = reference_tasks();
        let cfg = reference_config(reference_group_caps())
            .with_stability(StabilityWeights::new(1.0, 0.0));
        let schedule = Planner::new(cfg)
            .plan_stability(&tasks)
            .unwrap()
            .into_schedule()
            .unwrap();
        assert_demands_met(&tasks, &schedule);
        assert!((schedule.total_cost() - REFERENCE_TOTAL).abs() < 1e-6);
        assert!((schedule.objective_value() - REFERENCE_TOTAL).abs() < 1e-6);
    }

    #[test]
    fn test_stability_on_usage() {
        let tasks = reference_tasks();
        let cfg = reference_config(GroupCaps::new());
        let schedule = Planner::new(cfg)
            .plan_stability(&tasks)
            .unwrap()
            .into_schedule()
            .unwrap();
        assert_demands_met(&tasks, &schedule);
        let variation: f64 = schedule
            .usage()
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .sum();
        assert!((variation - 3.55).abs() < 1e-6, "variation {variation}");
        assert!((schedule.objective_value() - 3.55).abs() < 1e-6);
    }

    #[test]
    fn test_stability_on_cost() {
        let tasks = reference_tasks();
        let weights = StabilityWeights::new(0.0, 1.0).with_metric(StabilityMetric::Cost);
        let cfg = reference_config(GroupCaps::new()).with_stability(weights);
        let schedule = Planner::new(cfg)
            .plan_stability(&tasks)
            .unwrap()
            .into_schedule()
            .unwrap();
        assert_demands_met(&tasks, &schedule);
        let variation: f64 = schedule
            .slot_costs()
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .sum();
        assert!((variation - 20.2013508598).abs() < 1e-6, "variation {variation}");
    }

    #[test]
    fn test_congestion() {
        let tasks = reference_tasks();
        let schedule = Planner::new(reference_config(reference_group_caps()))
            .plan_congestion(&tasks)
            .unwrap()
            .into_schedule()
            .unwrap();
        assert_demands_met(&tasks, &schedule);

        let usage = schedule.usage();
        for (slot, expected) in [(0, 1.0), (1, 2.0), (2, 3.5), (3, 3.5), (4, 4.55), (23, 4.55)] {
            assert!((usage[slot] - expected).abs() < 1e-6, "slot {slot}: {}", usage[slot]);
        }
        assert!((schedule.total_cost() - 221.775).abs() < 1e-6);
        assert!((schedule.total_cost() - independent_congestion_cost(usage)).abs() < 1e-9);
        assert!((schedule.objective_value() - 221.775).abs() < 1e-6);

        for (unit, u) in schedule.unit_prices().iter().zip(usage) {
            assert!((unit - 0.5 * u).abs() < 1e-9);
        }
    }
}

#[cfg(test)]
mod properties {
    use super::*;

    const SEEDS: [u64; 4] = [1, 2, 3, 42];

    fn random_set(seed: u64, agents: usize, per_agent: usize) -> TaskSet {
        let mut rng = StdRng::seed_from_u64(seed);
        random_tasks(&mut rng, agents, per_agent, &Horizon::hourly(24))
    }

    #[test]
    fn test_price_weighted_meets_demand() {
        let planner = Planner::new(reference_config(GroupCaps::new()));
        for seed in SEEDS {
            let tasks = random_set(seed, 3, 5);
            let result = planner.plan_price_weighted(&tasks).unwrap();
            assert!(result.all_optimal(), "seed {seed}");
            for (agent, outcome) in result.iter() {
                let agent_tasks: TaskSet = [(agent.as_str(), tasks.agent(agent).unwrap().to_vec())]
                    .into_iter()
                    .collect();
                assert_demands_met(&agent_tasks, outcome.schedule().unwrap());
            }
        }
    }

    #[test]
    fn test_joint_equivalence() {
        for seed in SEEDS {
            let tasks = random_set(seed, 3, 4);
            let cfg = reference_config(reference_group_caps())
                .with_stability(StabilityWeights::new(1.0, 0.0));
            let planner = Planner::new(cfg);

            let Some(per_agent) = planner.plan_price_weighted(&tasks).unwrap().total_cost() else {
                // caps may make a random set infeasible; the joint model must agree
                let joint = planner.plan_stability(&tasks).unwrap();
                assert_eq!(joint.status(), SolveStatus::Infeasible, "seed {seed}");
                continue;
            };
            let joint = planner
                .plan_stability(&tasks)
                .unwrap()
                .into_schedule()
                .unwrap();
            assert!(
                (joint.total_cost() - per_agent).abs() < 1e-6,
                "seed {seed}: joint {} vs per-agent {per_agent}",
                joint.total_cost()
            );
        }
    }

    #[test]
    fn test_congestion_cost_matches_usage() {
        let planner = Planner::new(reference_config(GroupCaps::new()));
        for seed in SEEDS {
            let tasks = random_set(seed, 4, 5);
            let schedule = planner
                .plan_congestion(&tasks)
                .unwrap()
                .into_schedule()
                .unwrap();
            assert_demands_met(&tasks, &schedule);
            let expected = independent_congestion_cost(schedule.usage());
            assert!((schedule.total_cost() - expected).abs() < 1e-6, "seed {seed}");
        }
    }

    #[test]
    fn test_stability_meets_demand() {
        let planner = Planner::new(reference_config(GroupCaps::new()));
        for seed in SEEDS {
            let tasks = random_set(seed, 3, 4);
            let schedule = planner
                .plan_stability(&tasks)
                .unwrap()
                .into_schedule()
                .unwrap();
            assert_demands_met(&tasks, &schedule);
        }
    }

    #[test]
    fn test_shrinking_window_is_monotone() {
        // task 1 needs two of the three capped slots 0..=2, so task 0 must reach slot 3
        let caps = GroupCaps::new().with_cap(0, 1.0).with_cap(1, 1.0).with_cap(2, 1.0);
        let planner = Planner::new(hourly_config(vec![1.0; 8], caps));

        let feasible: Vec<bool> = (0..=6)
            .rev()
            .map(|deadline| {
                let tasks = single_agent(vec![
                    Task::new(0, deadline, 1.0, 2.0),
                    Task::new(0, 2, 1.0, 2.0),
                ]);
                match planner.plan_price_weighted(&tasks) {
                    Ok(result) => result.all_optimal(),
                    Err(_) => false,
                }
            })
            .collect();

        assert_eq!(feasible, vec![true, true, true, true, false, false, false]);
        assert!(feasible.windows(2).all(|w| w[0] || !w[1]));
    }
}

#[cfg(test)]
mod scale {
    use super::*;
    use std::time::{Duration, Instant};

    /// Wall-clock bound for one joint solve, loose enough for unoptimised
    /// builds.
    const BUDGET: Duration = Duration::from_secs(30);

    fn fleet() -> TaskSet {
        let mut rng = StdRng::seed_from_u64(7);
        random_tasks(&mut rng, 30, 20, &Horizon::hourly(24))
    }

    #[test]
    fn test_joint_stability_fleet_solves_in_time() {
        let tasks = fleet();
        let planner = Planner::new(reference_config(GroupCaps::new()));
        let start = Instant::now();
        let schedule = planner
            .plan_stability(&tasks)
            .unwrap()
            .into_schedule()
            .unwrap();
        let elapsed = start.elapsed();
        assert_demands_met(&tasks, &schedule);
        assert!(elapsed < BUDGET, "stability took {elapsed:?}");
    }

    #[test]
    fn test_joint_congestion_fleet_solves_in_time() {
        let tasks = fleet();
        let planner = Planner::new(reference_config(GroupCaps::new()));
        let start = Instant::now();
        let schedule = planner
            .plan_congestion(&tasks)
            .unwrap()
            .into_schedule()
            .unwrap();
        let elapsed = start.elapsed();
        assert_demands_met(&tasks, &schedule);
        let expected = independent_congestion_cost(schedule.usage());
        assert!((schedule.total_cost() - expected).abs() < 1e-6);
        assert!(elapsed < BUDGET, "congestion took {elapsed:?}");
    }
}

#[cfg(test)]
#[cfg(feature = "serde")]
mod serde_tests {
    use super::*;

    #[test]
    fn test_schedule_round_trip() {
        let planner = Planner::new(hourly_config(vec![1.0, 2.0], GroupCaps::new()));
        let tasks = single_agent(vec![Task::new(0, 1, 1.0, 1.0)]);
        let outcome = planner.plan_congestion(&tasks).unwrap();

        let json = serde_json::to_string(&outcome).unwrap();
        let back: ScheduleOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn test_config_round_trip() {
        let cfg = PlannerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"slot_hours\":1.0"));
        let back: PlannerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_invalid_horizon_is_rejected() {
        let json = r#"{"slots":0,"slot_hours":1.0}"#;
        assert!(serde_json::from_str::<Horizon>(json).is_err());
    }
}

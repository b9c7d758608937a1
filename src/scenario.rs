//! Reference day and random task generation.
//!
//! The reference day is a 24-slot hourly horizon with five users owning ten
//! tasks each, every task capped at one unit of power per hour.

use rand::Rng;

use crate::scheduling::{GroupCaps, Horizon, PriceCurve, Task, TaskSet};

const REFERENCE_PRICES: [f64; 24] = [
    4.246522377, 3.640027796, 3.480502639, 3.245460995, 3.162915992, 3.597667495,
    3.905355954, 4.078340246, 5.374797426, 4.944699124, 5.438100083, 3.909231366,
    6.200666726, 4.482141894, 5.410801558, 6.149170969, 5.8837687, 6.329263208,
    6.469511152, 5.58349762, 5.558922379, 5.255354797, 5.568480613, 5.441475567,
];

/// `(ready, deadline, cap, demand)` per user.
const REFERENCE_TASKS: [(&str, [(usize, usize, f64, f64); 10]); 5] = [
    (
        "User1",
        [
            (20, 23, 1.0, 1.0),
            (18, 23, 1.0, 2.0),
            (19, 21, 1.0, 1.0),
            (12, 20, 1.0, 3.0),
            (6, 12, 1.0, 3.0),
            (18, 20, 1.0, 2.0),
            (4, 10, 1.0, 2.0),
            (12, 18, 1.0, 2.0),
            (7, 14, 1.0, 3.0),
            (8, 14, 1.0, 3.0),
        ],
    ),
    (
        "User2",
        [
            (11, 22, 1.0, 2.0),
            (5, 11, 1.0, 2.0),
            (5, 23, 1.0, 1.0),
            (6, 20, 1.0, 3.0),
            (19, 19, 1.0, 1.0),
            (18, 21, 1.0, 2.0),
            (3, 23, 1.0, 3.0),
            (21, 23, 1.0, 2.0),
            (13, 17, 1.0, 1.0),
            (6, 11, 1.0, 2.0),
        ],
    ),
    (
        "User3",
        [
            (20, 23, 1.0, 2.0),
            (15, 21, 1.0, 3.0),
            (11, 15, 1.0, 2.0),
            (2, 17, 1.0, 3.0),
            (13, 16, 1.0, 2.0),
            (10, 18, 1.0, 2.0),
            (21, 23, 1.0, 2.0),
            (20, 23, 1.0, 1.0),
            (7, 21, 1.0, 2.0),
            (0, 7, 1.0, 3.0),
        ],
    ),
    (
        "User4",
        [
            (1, 8, 1.0, 1.0),
            (11, 20, 1.0, 2.0),
            (12, 19, 1.0, 3.0),
            (11, 16, 1.0, 3.0),
            (16, 18, 1.0, 1.0),
            (19, 23, 1.0, 3.0),
            (22, 23, 1.0, 1.0),
            (12, 19, 1.0, 2.0),
            (8, 20, 1.0, 2.0),
            (4, 12, 1.0, 2.0),
        ],
    ),
    (
        "User5",
        [
            (4, 20, 1.0, 1.0),
            (18, 22, 1.0, 3.0),
            (4, 16, 1.0, 1.0),
            (2, 16, 1.0, 3.0),
            (16, 23, 1.0, 2.0),
            (6, 18, 1.0, 2.0),
            (2, 6, 1.0, 1.0),
            (13, 17, 1.0, 3.0),
            (15, 23, 1.0, 1.0),
            (17, 23, 1.0, 1.0),
        ],
    ),
];

/// Hourly unit prices of the reference day.
pub fn reference_prices() -> PriceCurve {
    PriceCurve::new(REFERENCE_PRICES.to_vec())
}

/// Five users with ten tasks each.
pub fn reference_tasks() -> TaskSet {
    REFERENCE_TASKS
        .iter()
        .map(|(user, tasks)| (*user, tasks.iter().map(|&t| Task::from(t)).collect()))
        .collect()
}

/// Each user may draw at most 2 units at hours 11, 13 and 21.
pub fn reference_group_caps() -> GroupCaps {
    [(11, 2.0), (13, 2.0), (21, 2.0)].into_iter().collect()
}

/// Random task set in which every task passes validation against `horizon`.
///
/// Agents are named `Agent1`, `Agent2`, ...; caps are drawn from
/// `[0.5, 2.0]` and demands never exceed the window capacity.
pub fn random_tasks<R: Rng + ?Sized>(
    rng: &mut R,
    agents: usize,
    tasks_per_agent: usize,
    horizon: &Horizon,
) -> TaskSet {
    let slots = horizon.slots();
    let slot_hours = horizon.slot_hours();
    (1..=agents)
        .map(|a| {
            let tasks = (0..tasks_per_agent)
                .map(|_| {
                    let ready = rng.gen_range(0..slots);
                    let deadline = rng.gen_range(ready..slots);
                    let cap = (rng.gen_range(0.5..=2.0_f64) * 4.0).round() / 4.0;
                    let window = (deadline - ready + 1) as f64;
                    let fill = rng.gen_range(0.0..=1.0_f64);
                    let demand = (cap * window * slot_hours * fill * 100.0).floor() / 100.0;
                    Task::new(ready, deadline, cap, demand)
                })
                .collect();
            (format!("Agent{a}"), tasks)
        })
        .collect()
}

use std::collections::BTreeMap;

use super::error::TaskDefect;
use super::horizon::Horizon;

/// Identifier of the agent (user, household, site) owning a group of tasks.
pub type AgentId = String;

/// A deferrable energy requirement.
///
/// The task may draw up to `cap` power in every slot of `[ready, deadline]`
/// and must receive `demand` energy in total.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Task {
    pub ready: usize,
    pub deadline: usize,
    pub cap: f64,
    pub demand: f64,
}

impl Task {
    pub fn new(ready: usize, deadline: usize, cap: f64, demand: f64) -> Self {
        Self {
            ready,
            deadline,
            cap,
            demand,
        }
    }

    /// Slots the task may run in. Empty when `ready > deadline`.
    pub fn window(&self) -> std::ops::RangeInclusive<usize> {
        self.ready..=self.deadline
    }

    pub fn window_len(&self) -> usize {
        (self.deadline + 1).saturating_sub(self.ready)
    }

    pub fn is_active(&self, slot: usize) -> bool {
        self.window().contains(&slot)
    }

    /// Largest energy the task can receive over its window.
    pub fn max_energy(&self, slot_hours: f64) -> f64 {
        self.cap * self.window_len() as f64 * slot_hours
    }

    /// Checks the task against the horizon before any model is built.
    pub fn check(&self, horizon: &Horizon) -> Result<(), TaskDefect> {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        if !valid(self.cap) || !valid(self.demand) {
            return Err(TaskDefect::NegativeValue);
        }
        if self.ready > self.deadline {
            return Err(TaskDefect::EmptyWindow);
        }
        if self.deadline >= horizon.slots() {
            return Err(TaskDefect::WindowOutsideHorizon);
        }
        if self.demand > self.max_energy(horizon.slot_hours()) {
            return Err(TaskDefect::DemandExceedsCapacity);
        }
        Ok(())
    }
}

impl From<(usize, usize, f64, f64)> for Task {
    fn from((ready, deadline, cap, demand): (usize, usize, f64, f64)) -> Self {
        Self::new(ready, deadline, cap, demand)
    }
}

/// Position of a task inside a [`TaskSet`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskKey {
    pub agent: AgentId,
    pub index: usize,
}

impl TaskKey {
    pub fn new(agent: impl Into<AgentId>, index: usize) -> Self {
        Self {
            agent: agent.into(),
            index,
        }
    }
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.agent, self.index)
    }
}

/// Tasks grouped by agent, ordered by agent id.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskSet {
    agents: BTreeMap<AgentId, Vec<Task>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `task` to `agent`'s list and returns its key.
    pub fn push(&mut self, agent: impl Into<AgentId>, task: Task) -> TaskKey {
        let agent = agent.into();
        let tasks = self.agents.entry(agent.clone()).or_default();
        tasks.push(task);
        TaskKey {
            agent,
            index: tasks.len() - 1,
        }
    }

    /// Replaces all tasks of `agent`.
    pub fn insert_agent(&mut self, agent: impl Into<AgentId>, tasks: Vec<Task>) {
        self.agents.insert(agent.into(), tasks);
    }

    pub fn agent(&self, agent: &str) -> Option<&[Task]> {
        self.agents.get(agent).map(Vec::as_slice)
    }

    pub fn get(&self, key: &TaskKey) -> Option<&Task> {
        self.agents.get(&key.agent)?.get(key.index)
    }

    pub fn agents(&self) -> impl Iterator<Item = (&AgentId, &[Task])> {
        self.agents.iter().map(|(a, t)| (a, t.as_slice()))
    }

    /// All tasks in agent order, then task order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskKey, &Task)> {
        self.agents.iter().flat_map(|(agent, tasks)| {
            tasks
                .iter()
                .enumerate()
                .map(move |(index, task)| (TaskKey::new(agent.clone(), index), task))
        })
    }

    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn num_tasks(&self) -> usize {
        self.agents.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_tasks() == 0
    }

    pub fn total_demand(&self) -> f64 {
        self.agents.values().flatten().map(|t| t.demand).sum()
    }
}

impl<A: Into<AgentId>> FromIterator<(A, Vec<Task>)> for TaskSet {
    fn from_iter<I: IntoIterator<Item = (A, Vec<Task>)>>(iter: I) -> Self {
        Self {
            agents: iter.into_iter().map(|(a, t)| (a.into(), t)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_length_and_activity() {
        let t = Task::new(3, 5, 1.0, 2.0);
        assert_eq!(t.window_len(), 3);
        assert!(t.is_active(3) && t.is_active(5));
        assert!(!t.is_active(2) && !t.is_active(6));
        assert_eq!(Task::new(4, 3, 1.0, 0.0).window_len(), 0);
    }

    #[test]
    fn test_check_reports_each_defect() {
        let h = Horizon::hourly(24);
        assert_eq!(Task::new(0, 1, 1.0, 1.0).check(&h), Ok(()));
        assert_eq!(
            Task::new(5, 4, 1.0, 0.0).check(&h),
            Err(TaskDefect::EmptyWindow)
        );
        assert_eq!(
            Task::new(20, 24, 1.0, 1.0).check(&h),
            Err(TaskDefect::WindowOutsideHorizon)
        );
        assert_eq!(
            Task::new(0, 0, 1.0, 2.0).check(&h),
            Err(TaskDefect::DemandExceedsCapacity)
        );
        assert_eq!(
            Task::new(0, 3, -1.0, 1.0).check(&h),
            Err(TaskDefect::NegativeValue)
        );
        assert_eq!(
            Task::new(0, 3, 1.0, f64::NAN).check(&h),
            Err(TaskDefect::NegativeValue)
        );
    }

    #[test]
    fn test_demand_at_exact_capacity_is_accepted() {
        let h = Horizon::hourly(24);
        assert_eq!(Task::new(2, 4, 1.0, 3.0).check(&h), Ok(()));
    }

    #[test]
    fn test_capacity_scales_with_slot_length() {
        let half_hour = Horizon::from_hours(48, 0.5).unwrap();
        // 2 slots × 1 kW × 0.5 h = 1 kWh
        assert_eq!(Task::new(0, 1, 1.0, 1.0).check(&half_hour), Ok(()));
        assert_eq!(
            Task::new(0, 1, 1.0, 1.5).check(&half_hour),
            Err(TaskDefect::DemandExceedsCapacity)
        );
    }

    #[test]
    fn test_task_set_keeps_agent_order() {
        let mut set = TaskSet::new();
        set.push("b", Task::new(0, 1, 1.0, 1.0));
        let key = set.push("a", Task::new(0, 2, 1.0, 1.0));
        set.push("a", Task::new(1, 2, 1.0, 0.5));

        assert_eq!(key, TaskKey::new("a", 0));
        assert_eq!(set.num_agents(), 2);
        assert_eq!(set.num_tasks(), 3);
        let keys: Vec<_> = set.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["a#0", "a#1", "b#0"]);
        assert!((set.total_demand() - 2.5).abs() < 1e-12);
        assert_eq!(set.get(&TaskKey::new("a", 1)).map(|t| t.ready), Some(1));
        assert!(set.get(&TaskKey::new("c", 0)).is_none());
    }

    #[test]
    fn test_from_tuples() {
        let t: Task = (1, 2, 0.5, 1.0).into();
        assert_eq!(t, Task::new(1, 2, 0.5, 1.0));
    }
}

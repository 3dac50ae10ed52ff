//! AI task prioritizer and turn planner.
//!
//! Ranking is deterministic: the same tasks in the same order always rank the
//! same way. Each budgeted category's share of the faction's effort is its
//! weighted share of the total raw score; `General` then borrows the largest
//! share.

use concord_protocol::{AiTask, AiTaskCategory, TaskId};
use serde::{Deserialize, Serialize};

use crate::rules::CategoryWeights;

/// Effort fraction per category. The three budgeted fractions sum to 1.0;
/// `general` mirrors one of them once [`borrow_for_general`] has run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryBudget {
    pub offensive: f64,
    pub defensive: f64,
    pub social: f64,
    pub general: f64,
}

impl CategoryBudget {
    pub fn get(&self, category: AiTaskCategory) -> f64 {
        match category {
            AiTaskCategory::Offensive => self.offensive,
            AiTaskCategory::Defensive => self.defensive,
            AiTaskCategory::Social => self.social,
            AiTaskCategory::General => self.general,
        }
    }

    fn set(&mut self, category: AiTaskCategory, value: f64) {
        match category {
            AiTaskCategory::Offensive => self.offensive = value,
            AiTaskCategory::Defensive => self.defensive = value,
            AiTaskCategory::Social => self.social = value,
            AiTaskCategory::General => self.general = value,
        }
    }
}

/// Gives `General` the largest budgeted fraction. Ties keep the first
/// category in Offensive, Defensive, Social order.
pub fn borrow_for_general(mut budget: CategoryBudget) -> CategoryBudget {
    let mut best = budget.get(AiTaskCategory::BUDGETED[0]);
    for category in &AiTaskCategory::BUDGETED[1..] {
        let fraction = budget.get(*category);
        if fraction > best {
            best = fraction;
        }
    }
    budget.general = best;
    budget
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedTask {
    pub task: AiTask,
    pub priority: f64,
    /// Budget fraction of the task's category.
    pub fraction: f64,
}

#[derive(Clone, Debug)]
pub struct TaskPrioritizer {
    weights: CategoryWeights,
}

impl TaskPrioritizer {
    pub fn new(weights: CategoryWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &CategoryWeights {
        &self.weights
    }

    /// Budgeted fractions for `tasks`, before the `General` post-pass.
    ///
    /// Negative and NaN scores contribute nothing to a category's total.
    pub fn category_fractions(&self, tasks: &[AiTask]) -> CategoryBudget {
        let mut budget = CategoryBudget::default();

        let weighted: Vec<(AiTaskCategory, f64)> = AiTaskCategory::BUDGETED
            .iter()
            .map(|&category| {
                let weight = self.weights.get(category).unwrap_or(0.0);
                let total: f64 = tasks
                    .iter()
                    .filter(|t| t.category == category)
                    .map(|t| t.score().max(0.0))
                    .sum();
                (category, if weight > 0.0 { weight * total } else { 0.0 })
            })
            .collect();
        let weighted_sum: f64 = weighted.iter().map(|(_, v)| v).sum();

        if weighted_sum > 0.0 && weighted_sum.is_finite() {
            for (category, value) in weighted {
                budget.set(category, value / weighted_sum);
            }
            return budget;
        }

        let weight_sum: f64 = AiTaskCategory::BUDGETED
            .iter()
            .map(|&c| self.weights.get(c).unwrap_or(0.0))
            .sum();
        for category in AiTaskCategory::BUDGETED {
            let fraction = if weight_sum > 0.0 {
                self.weights.get(category).unwrap_or(0.0) / weight_sum
            } else {
                1.0 / AiTaskCategory::BUDGETED.len() as f64
            };
            budget.set(category, fraction);
        }
        budget
    }

    pub fn budget(&self, tasks: &[AiTask]) -> CategoryBudget {
        borrow_for_general(self.category_fractions(tasks))
    }

    /// Orders tasks by priority, highest first. Ties go to the earlier
    /// category, then to the higher raw score, then to the earlier task.
    pub fn rank(&self, tasks: Vec<AiTask>) -> Vec<RankedTask> {
        let budget = self.budget(&tasks);
        let mut ranked: Vec<RankedTask> = tasks
            .into_iter()
            .map(|task| {
                let fraction = budget.get(task.category);
                // An unbudgeted category contributes nothing, even for infinite scores.
                let priority = if fraction > 0.0 {
                    fraction * task.score()
                } else {
                    0.0
                };
                RankedTask {
                    priority,
                    fraction,
                    task,
                }
            })
            .collect();

        // Raw score still orders a category whose fraction flattened every
        // priority to zero. Stable sort keeps submission order for full ties.
        ranked.sort_by(|a, b| {
            b.priority
                .total_cmp(&a.priority)
                .then(a.task.category.ordinal().cmp(&b.task.category.ordinal()))
                .then(b.task.score().total_cmp(&a.task.score()))
        });
        ranked
    }
}

// =============================================================================
// Turn Planner
// =============================================================================

/// Tasks chosen for one turn and tasks carried to the next.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnPlan {
    pub execute: Vec<RankedTask>,
    pub deferred: Vec<RankedTask>,
    /// Effort left unused.
    pub remaining: u32,
}

/// Queues one faction's tasks and fits them into per-turn effort budgets.
#[derive(Clone, Debug)]
pub struct TurnPlanner {
    prioritizer: TaskPrioritizer,
    next_id: u32,
    /// Submission order; carried tasks keep their original ids.
    queue: Vec<AiTask>,
}

impl TurnPlanner {
    pub fn new(prioritizer: TaskPrioritizer) -> Self {
        Self {
            prioritizer,
            next_id: 1,
            queue: Vec::new(),
        }
    }

    pub fn prioritizer(&self) -> &TaskPrioritizer {
        &self.prioritizer
    }

    pub fn submit(&mut self, mut task: AiTask) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        task.id = id;
        self.queue.push(task);
        id
    }

    pub fn pending(&self) -> &[AiTask] {
        &self.queue
    }

    pub fn plan_turn(&mut self, effort_budget: u32) -> TurnPlan {
        let mut tasks = std::mem::take(&mut self.queue);
        tasks.sort_by_key(|t| t.id);

        let mut remaining = effort_budget;
        let mut plan = TurnPlan::default();
        for ranked in self.prioritizer.rank(tasks) {
            if ranked.task.effort <= remaining {
                remaining -= ranked.task.effort;
                plan.execute.push(ranked);
            } else {
                let mut carried = ranked.task.clone();
                carried.deferrals += 1;
                self.queue.push(carried);
                plan.deferred.push(ranked);
            }
        }
        plan.remaining = remaining;

        tracing::debug!(
            executed = plan.execute.len(),
            deferred = plan.deferred.len(),
            remaining,
            "turn planned"
        );
        plan
    }
}

#[cfg(test)]
mod tests {
    use concord_protocol::FactionId;

    use super::*;

    const OWNER: FactionId = FactionId(0);

    fn task(category: AiTaskCategory, score: f64, label: &str) -> AiTask {
        AiTask::custom(OWNER, category, score, label)
    }

    fn labels(ranked: &[RankedTask]) -> Vec<String> {
        ranked
            .iter()
            .map(|r| match &r.task.action {
                concord_protocol::TaskAction::Custom { label } => label.clone(),
                other => format!("{other:?}"),
            })
            .collect()
    }

    fn equal() -> TaskPrioritizer {
        TaskPrioritizer::new(CategoryWeights::default())
    }

    #[test]
    fn empty_and_single_rank() {
        assert!(equal().rank(Vec::new()).is_empty());
        for category in AiTaskCategory::ALL {
            let ranked = equal().rank(vec![task(category, 4.0, "only")]);
            assert_eq!(ranked.len(), 1);
            assert_eq!(labels(&ranked), vec!["only"]);
        }
    }

    #[test]
    fn general_borrows_largest_fraction() {
        let tasks = vec![
            task(AiTaskCategory::Offensive, 10.0, "o"),
            task(AiTaskCategory::Defensive, 10.0, "d"),
            task(AiTaskCategory::Social, 10.0, "s"),
            task(AiTaskCategory::General, 5.0, "g"),
        ];
        let ranked = equal().rank(tasks);
        assert_eq!(labels(&ranked), vec!["o", "d", "s", "g"]);
        let general = &ranked[3];
        assert!((general.fraction - 1.0 / 3.0).abs() < 1e-12);
        assert!((general.priority - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn borrow_breaks_ties_in_category_order() {
        let budget = borrow_for_general(CategoryBudget {
            offensive: 0.25,
            defensive: 0.375,
            social: 0.375,
            general: 0.0,
        });
        assert_eq!(budget.general, 0.375);
    }

    #[test]
    fn fractions_sum_to_one() {
        let weight_sets = [
            (1.0, 1.0, 1.0),
            (3.0, 0.5, 0.0),
            (0.0, 0.0, 0.0),
            (0.0, 2.0, 0.0),
        ];
        let task_sets = vec![
            Vec::new(),
            vec![task(AiTaskCategory::General, 9.0, "g")],
            vec![
                task(AiTaskCategory::Offensive, 8.0, "o"),
                task(AiTaskCategory::Social, 1.5, "s"),
            ],
            vec![task(AiTaskCategory::Defensive, -3.0, "d")],
        ];
        for (offensive, defensive, social) in weight_sets {
            let prioritizer = TaskPrioritizer::new(CategoryWeights {
                offensive,
                defensive,
                social,
            });
            for tasks in &task_sets {
                let b = prioritizer.category_fractions(tasks);
                let sum = b.offensive + b.defensive + b.social;
                assert!((sum - 1.0).abs() < 1e-9, "{offensive}/{defensive}/{social}: {sum}");
            }
        }
    }

    #[test]
    fn weights_shift_budget() {
        let prioritizer = TaskPrioritizer::new(CategoryWeights {
            offensive: 3.0,
            defensive: 1.0,
            social: 1.0,
        });
        let ranked = prioritizer.rank(vec![
            task(AiTaskCategory::Social, 10.0, "s"),
            task(AiTaskCategory::Offensive, 6.0, "o"),
        ]);
        // o: 18 / 28 * 6 ~ 3.86, s: 10 / 28 * 10 ~ 3.57
        assert_eq!(labels(&ranked), vec!["o", "s"]);
    }

    #[test]
    fn same_category_keeps_score_then_insertion_order() {
        let ranked = equal().rank(vec![
            task(AiTaskCategory::Defensive, 2.0, "a"),
            task(AiTaskCategory::Defensive, 7.0, "b"),
            task(AiTaskCategory::Defensive, 2.0, "c"),
            task(AiTaskCategory::Defensive, f64::NAN, "nan"),
        ]);
        assert_eq!(labels(&ranked), vec!["b", "a", "c", "nan"]);
        assert_eq!(ranked[3].priority, 0.0);
    }

    #[test]
    fn zero_weight_category_still_orders_by_score() {
        let prioritizer = TaskPrioritizer::new(CategoryWeights {
            offensive: 1.0,
            defensive: 1.0,
            social: 0.0,
        });
        let ranked = prioritizer.rank(vec![
            task(AiTaskCategory::Offensive, 5.0, "o"),
            task(AiTaskCategory::Social, 2.0, "s_low"),
            task(AiTaskCategory::Social, 9.0, "s_high"),
            task(AiTaskCategory::Social, f64::INFINITY, "s_inf"),
        ]);
        assert_eq!(labels(&ranked), vec!["o", "s_inf", "s_high", "s_low"]);
        assert!(ranked.iter().all(|r| !r.priority.is_nan()));
        assert_eq!(ranked[1].priority, 0.0);
    }

    #[test]
    fn all_negative_category_orders_by_score() {
        let ranked = equal().rank(vec![
            task(AiTaskCategory::Offensive, -5.0, "o_minus5"),
            task(AiTaskCategory::Offensive, -1.0, "o_minus1"),
            task(AiTaskCategory::Defensive, 10.0, "d"),
        ]);
        assert_eq!(labels(&ranked), vec!["d", "o_minus1", "o_minus5"]);
    }

    #[test]
    fn planner_defers_and_carries_tasks() {
        let mut planner = TurnPlanner::new(equal());
        let big = planner.submit(AiTask::new(
            OWNER,
            AiTaskCategory::Offensive,
            9.0,
            5,
            concord_protocol::TaskAction::Custom {
                label: "siege".to_string(),
            },
        ));
        let small = planner.submit(task(AiTaskCategory::Social, 1.0, "envoy"));

        let plan = planner.plan_turn(3);
        assert_eq!(plan.execute.len(), 1);
        assert_eq!(plan.execute[0].task.id, small);
        assert_eq!(plan.deferred.len(), 1);
        assert_eq!(plan.remaining, 2);
        assert_eq!(planner.pending().len(), 1);
        assert_eq!(planner.pending()[0].deferrals, 1);

        let plan = planner.plan_turn(5);
        assert_eq!(plan.execute.len(), 1);
        assert_eq!(plan.execute[0].task.id, big);
        assert_eq!(plan.execute[0].task.deferrals, 1);
        assert!(planner.pending().is_empty());
    }
}

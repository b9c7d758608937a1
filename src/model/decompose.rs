//! Splitting a model into independent blocks.
//!
//! Two variables belong to the same block when some constraint mentions both.
//! Scheduling models are block-diagonal per task (or per agent once group caps
//! are present), so each block can be solved on its own and the pieces
//! stitched back together.

use petgraph::unionfind::UnionFind;

use super::{
    Constraint, ConstraintId, LinearExpr, Model, Objective, QuadraticTerm, VarId,
};

/// Variables and constraints of one independent block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    variables: Vec<VarId>,
    constraints: Vec<ConstraintId>,
}

impl Component {
    /// Variables of the block in increasing index order.
    pub fn variables(&self) -> &[VarId] {
        &self.variables
    }

    pub fn constraints(&self) -> &[ConstraintId] {
        &self.constraints
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition {
    /// Blocks ordered by their smallest variable index.
    pub components: Vec<Component>,
    /// Constraints without any variable; they are satisfied or violated
    /// independently of every block.
    pub empty_constraints: Vec<ConstraintId>,
}

impl Model {
    /// Partitions the model into independent blocks of variables.
    pub fn decompose(&self) -> Decomposition {
        let n = self.num_variables();
        let mut sets = UnionFind::<usize>::new(n);
        for constraint in self.constraints() {
            let mut vars = constraint.expr().variables();
            if let Some(first) = vars.next() {
                for other in vars {
                    sets.union(first.index(), other.index());
                }
            }
        }
        let labels = sets.into_labeling();

        let mut block_of_label = vec![usize::MAX; n];
        let mut components: Vec<Component> = Vec::new();
        for (j, &label) in labels.iter().enumerate() {
            if block_of_label[label] == usize::MAX {
                block_of_label[label] = components.len();
                components.push(Component {
                    variables: Vec::new(),
                    constraints: Vec::new(),
                });
            }
            components[block_of_label[label]].variables.push(VarId(j));
        }

        let mut empty_constraints = Vec::new();
        for (i, constraint) in self.constraints().iter().enumerate() {
            match constraint.expr().variables().next() {
                Some(first) => {
                    let block = block_of_label[labels[first.index()]];
                    components[block].constraints.push(ConstraintId(i));
                }
                None => empty_constraints.push(ConstraintId(i)),
            }
        }

        Decomposition {
            components,
            empty_constraints,
        }
    }

    /// Extracts the sub-model spanned by `component`.
    ///
    /// Local variable `k` of the result is `component.variables()[k]` of this
    /// model.
    pub fn restrict(&self, component: &Component) -> Model {
        let mut local = vec![None; self.num_variables()];
        for (k, var) in component.variables.iter().enumerate() {
            local[var.index()] = Some(VarId(k));
        }
        let remap = |expr: &LinearExpr| -> LinearExpr {
            expr.iter()
                .filter_map(|(v, a)| local[v.index()].map(|lv| (lv, a)))
                .collect()
        };

        let variables = component
            .variables
            .iter()
            .map(|v| self.variables[v.index()])
            .collect();
        let constraints = component
            .constraints
            .iter()
            .map(|id| {
                let c = &self.constraints[id.index()];
                Constraint::new(remap(c.expr()), c.relation(), c.rhs())
            })
            .collect();
        let quadratic: QuadraticTerm = self
            .objective
            .quadratic()
            .iter()
            .filter_map(|(v, q)| local[v.index()].map(|lv| (lv, q)))
            .collect();
        let objective = Objective::new(remap(self.objective.linear()), quadratic);

        Model {
            variables,
            constraints,
            objective,
        }
    }
}

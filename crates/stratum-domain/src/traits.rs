//! Trait definitions for read access to stored records
//!
//! These traits define the boundary between policy logic (governor, compiler,
//! query engine) and the storage layer. Implementations live in `stratum-store`.

use crate::{Constraint, ConstraintId, FamilyId, Fit, FitId, Scope, Status, Tier};

/// Read-only view over constraints and fits
///
/// Implemented by the store's immutable snapshot. Policy code is generic over
/// this trait so it can be exercised against in-memory fixtures.
pub trait ConstraintSource {
    /// Get any stored version by id (active or not)
    fn constraint(&self, id: &ConstraintId) -> Option<&Constraint>;

    /// Active head of a family
    fn active_in_family(&self, family: &FamilyId) -> Option<&Constraint>;

    /// Every stored version, in id order
    fn constraints(&self) -> Box<dyn Iterator<Item = &Constraint> + '_>;

    /// Get a fit by id
    fn fit(&self, id: &FitId) -> Option<&Fit>;

    /// Every registered fit
    fn fits(&self) -> Box<dyn Iterator<Item = &Fit> + '_>;

    /// Active versions only
    fn active_constraints(&self) -> Box<dyn Iterator<Item = &Constraint> + '_> {
        Box::new(self.constraints().filter(|c| c.is_active()))
    }

    /// Active binding versions (tiers 0-2): the set contradiction checks run against
    fn binding_constraints(&self) -> Box<dyn Iterator<Item = &Constraint> + '_> {
        Box::new(self.active_constraints().filter(|c| c.tier.is_binding()))
    }

    /// Query constraints matching criteria
    fn query_constraints(&self, query: &ConstraintQuery) -> Vec<&Constraint> {
        let mut results: Vec<&Constraint> = self
            .constraints()
            .filter(|c| query.matches(c))
            .collect();
        if let Some(limit) = query.limit {
            results.truncate(limit);
        }
        results
    }
}

/// Query criteria for retrieving constraints
#[derive(Debug, Clone, Default)]
pub struct ConstraintQuery {
    /// Filter by tiers
    pub tiers: Option<Vec<Tier>>,

    /// Filter by scope (GLOBAL records match every scope filter)
    pub scope: Option<Scope>,

    /// Filter by family
    pub family: Option<FamilyId>,

    /// Filter by status; `None` means active only
    pub status: Option<Status>,

    /// Include every status
    pub all_statuses: bool,

    /// Maximum results to return
    pub limit: Option<usize>,
}

impl ConstraintQuery {
    /// Whether a constraint satisfies the criteria
    pub fn matches(&self, constraint: &Constraint) -> bool {
        if let Some(tiers) = &self.tiers {
            if !tiers.contains(&constraint.tier) {
                return false;
            }
        }
        if let Some(scope) = &self.scope {
            if !constraint.scope.intersects(scope) {
                return false;
            }
        }
        if let Some(family) = &self.family {
            if &constraint.family != family {
                return false;
            }
        }
        if self.all_statuses {
            return true;
        }
        constraint.status == self.status.unwrap_or(Status::Active)
    }
}

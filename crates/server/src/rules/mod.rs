pub mod event;
pub mod protection;

use std::time::Instant;

use claims_engine::{Authority, ClaimId, ClaimIndex, Decision, Flag, Permission, PlayerId, Position3D, WorldId};

use crate::dashboard::Metrics;
pub use event::{Hazard, Interaction, Spread, WorldEvent};

/// What one rule thinks of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The rule does not apply.
    Pass,
    Allow,
    Deny,
}

impl Verdict {
    pub const fn from_allowed(allowed: bool) -> Self {
        if allowed { Verdict::Allow } else { Verdict::Deny }
    }
}

/// Read access to claims for rules. Every lookup is counted in the metrics.
pub struct RuleContext<'a> {
    pub index: &'a ClaimIndex,
    pub authority: &'a dyn Authority,
    pub metrics: &'a Metrics,
}

impl RuleContext<'_> {
    pub fn claim_at(&self, world: WorldId, pos: &Position3D) -> Option<ClaimId> {
        let started = Instant::now();
        let claim = self.index.find_at(world, pos).map(|p| p.claim);
        self.metrics.record_lookup(started.elapsed());
        claim
    }

    pub fn player_decision(
        &self,
        world: WorldId,
        pos: &Position3D,
        player: PlayerId,
        permission: Permission,
    ) -> Decision {
        let started = Instant::now();
        let decision = self
            .index
            .check_player_action_at(world, pos, player, permission, self.authority);
        self.metrics.record_lookup(started.elapsed());
        self.metrics.record_decision(decision);
        decision
    }

    pub fn flag_allows(&self, world: WorldId, pos: &Position3D, flag: Flag) -> bool {
        let started = Instant::now();
        let allowed = self.index.check_world_action_at(world, pos, flag);
        self.metrics.record_lookup(started.elapsed());
        self.metrics.record_flag_check(allowed);
        allowed
    }
}

/// A protection rule: look at the event and say whether it may happen.
pub type RuleFn = fn(&RuleContext<'_>, &WorldEvent) -> Verdict;

/// An ordered collection of rules. An event is allowed unless some rule
/// denies it.
pub struct RuleSet {
    rules: Vec<RuleFn>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add(&mut self, rule: RuleFn) {
        self.rules.push(rule);
    }

    pub fn evaluate(&self, ctx: &RuleContext<'_>, event: &WorldEvent) -> bool {
        self.rules
            .iter()
            .all(|rule| rule(ctx, event) != Verdict::Deny)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

/// The standard protection set: player permissions, hazard flags and
/// boundary crossings.
pub fn standard() -> RuleSet {
    let mut rules = RuleSet::new();
    rules.add(protection::player_interaction);
    rules.add(protection::hazard_flags);
    rules.add(protection::boundary_crossing);
    rules
}

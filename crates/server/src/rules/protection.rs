//! Protection rules.
//!
//! Each public function has the signature `fn(&RuleContext, &WorldEvent) -> Verdict`
//! so it can be registered directly as a `RuleFn`.

use claims_engine::Flag;

use super::event::WorldEvent;
use super::{RuleContext, Verdict};

// ── Players ──────────────────────────────────────────────────────────────

/// A player may only touch blocks inside a claim with the matching permission.
/// Casual uses are also open to anyone when the claim allows visitors to interact.
pub fn player_interaction(ctx: &RuleContext<'_>, event: &WorldEvent) -> Verdict {
    let WorldEvent::Interact {
        world,
        player,
        pos,
        action,
    } = event
    else {
        return Verdict::Pass;
    };
    if ctx
        .player_decision(*world, pos, *player, action.permission())
        .is_allowed()
    {
        return Verdict::Allow;
    }
    Verdict::from_allowed(action.is_casual() && ctx.flag_allows(*world, pos, Flag::VisitorInteraction))
}

// ── Single-position hazards ──────────────────────────────────────────────

/// Explosions, lightning, fire and the like need the claim's flag.
pub fn hazard_flags(ctx: &RuleContext<'_>, event: &WorldEvent) -> Verdict {
    let WorldEvent::Hazard { world, pos, hazard } = event else {
        return Verdict::Pass;
    };
    Verdict::from_allowed(ctx.flag_allows(*world, pos, hazard.flag()))
}

// ── Cross-boundary spread ────────────────────────────────────────────────

/// Movement inside one claim, or into unclaimed land, is always fine.
/// Entering a claim from outside it needs the destination's flag.
pub fn boundary_crossing(ctx: &RuleContext<'_>, event: &WorldEvent) -> Verdict {
    let WorldEvent::Spread {
        world,
        from,
        to,
        spread,
    } = event
    else {
        return Verdict::Pass;
    };
    let Some(target) = ctx.claim_at(*world, to) else {
        return Verdict::Allow;
    };
    if ctx.claim_at(*world, from) == Some(target) {
        return Verdict::Allow;
    }
    Verdict::from_allowed(ctx.flag_allows(*world, to, spread.flag()))
}

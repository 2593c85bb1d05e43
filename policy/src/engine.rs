//! Priority-ordered, short-circuiting resolution.
//!
//! Handlers are consulted from highest to lowest priority (ties broken by
//! name) and the first verdict other than `Undefined` wins. An indifferent
//! handler therefore never masks a lower-priority decision, while a
//! high-priority handler that does answer cannot be overridden from below.
//! When every handler abstains the caller's default is returned; the engine
//! never invents an ALLOW or DENY of its own.

use crate::handler::Handler;
use std::collections::HashSet;
use ward_core::{ActiveFlag, Flag, PassiveFlag, PermissionService, Tristate, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// A specific actor performing a discrete action.
    Active { actor: UserId, flag: ActiveFlag },
    /// Ambient world behavior, no actor involved.
    Passive { flag: PassiveFlag },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    pub query: Query,
    /// World the action happens in, forwarded to the permission service.
    pub world: Option<String>,
}

impl QueryContext {
    pub fn active(actor: UserId, flag: ActiveFlag) -> Self {
        Self {
            query: Query::Active { actor, flag },
            world: None,
        }
    }

    pub fn passive(flag: PassiveFlag) -> Self {
        Self {
            query: Query::Passive { flag },
            world: None,
        }
    }

    pub fn with_world(mut self, world: impl Into<String>) -> Self {
        self.world = Some(world.into());
        self
    }

    pub fn flag(&self) -> Flag {
        match &self.query {
            Query::Active { flag, .. } => Flag::Active(*flag),
            Query::Passive { flag } => Flag::Passive(*flag),
        }
    }

    pub fn actor(&self) -> Option<&UserId> {
        match &self.query {
            Query::Active { actor, .. } => Some(actor),
            Query::Passive { .. } => None,
        }
    }
}

/// One consulted handler and what it answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub handler: String,
    pub priority: i32,
    pub verdict: Tristate,
}

/// Trace of a resolution, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    pub steps: Vec<Step>,
    /// Handler whose verdict was returned; `None` when the default applied.
    pub decided_by: Option<String>,
    pub result: Tristate,
}

/// Asks a single handler, dispatching on the query kind.
pub fn verdict(
    handler: &Handler,
    ctx: &QueryContext,
    permissions: &dyn PermissionService,
) -> Tristate {
    let world = ctx.world.as_deref();
    match &ctx.query {
        Query::Active { actor, flag } => handler.query_active(actor, *flag, permissions, world),
        Query::Passive { flag } => handler.query_passive(*flag, permissions, world),
    }
}

/// Deduplicates by name, drops disabled handlers and sorts by priority
/// descending, then name ascending.
pub fn consultation_order<'a, I>(handlers: I) -> Vec<&'a Handler>
where
    I: IntoIterator<Item = &'a Handler>,
{
    let mut seen: HashSet<&'a str> = HashSet::new();
    let mut ordered: Vec<&'a Handler> = handlers
        .into_iter()
        .filter(|&handler| seen.insert(handler.name()))
        .filter(|&handler| handler.is_enabled())
        .collect();
    ordered.sort_by(|a, b| {
        b.priority()
            .cmp(&a.priority())
            .then_with(|| a.name().cmp(b.name()))
    });
    ordered
}

pub fn resolve<'a, I>(
    handlers: I,
    ctx: &QueryContext,
    permissions: &dyn PermissionService,
    default: Tristate,
) -> Tristate
where
    I: IntoIterator<Item = &'a Handler>,
{
    for handler in consultation_order(handlers) {
        let result = verdict(handler, ctx, permissions);
        if result.is_defined() {
            tracing::trace!(
                handler = handler.name(),
                priority = handler.priority(),
                flag = %ctx.flag(),
                verdict = %result,
                "resolved"
            );
            return result;
        }
    }
    tracing::trace!(flag = %ctx.flag(), default = %default, "no handler decided");
    default
}

/// Same walk as [`resolve`], recording every consulted handler.
pub fn explain<'a, I>(
    handlers: I,
    ctx: &QueryContext,
    permissions: &dyn PermissionService,
    default: Tristate,
) -> Explanation
where
    I: IntoIterator<Item = &'a Handler>,
{
    let mut steps = Vec::new();
    for handler in consultation_order(handlers) {
        let result = verdict(handler, ctx, permissions);
        steps.push(Step {
            handler: handler.name().to_string(),
            priority: handler.priority(),
            verdict: result,
        });
        if result.is_defined() {
            return Explanation {
                steps,
                decided_by: Some(handler.name().to_string()),
                result,
            };
        }
    }
    Explanation {
        steps,
        decided_by: None,
        result: default,
    }
}

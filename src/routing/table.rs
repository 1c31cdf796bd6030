//! Ordered route table with nested sub-tables

use super::context::RequestContext;
use crate::handler::Handler;

/// What a matched pattern leads to
#[derive(Debug)]
pub enum Target {
    Handler(Handler),
    Table(RouteTable),
}

impl From<Handler> for Target {
    fn from(handler: Handler) -> Self {
        Self::Handler(handler)
    }
}

impl From<RouteTable> for Target {
    fn from(table: RouteTable) -> Self {
        Self::Table(table)
    }
}

#[derive(Debug)]
struct Route {
    pattern: String,
    target: Target,
}

/// Routes matched by exact segment equality in registration order
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route; earlier registrations win over later ones
    pub fn register(&mut self, pattern: impl Into<String>, target: impl Into<Target>) -> &mut Self {
        self.routes.push(Route {
            pattern: pattern.into(),
            target: target.into(),
        });
        self
    }

    /// Number of entries at this level
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Walk the table, consuming one segment per level, until a handler
    /// is reached.
    ///
    /// Returns `None` when a level has no segment left to match or no
    /// pattern equals the head segment.
    pub fn route<'t>(&'t self, ctx: &mut RequestContext<'_>) -> Option<&'t Handler> {
        let mut table = self;
        loop {
            let head = ctx.head()?;
            let route = table.routes.iter().find(|r| r.pattern == head)?;
            ctx.advance();
            match &route.target {
                Target::Handler(handler) => return Some(handler),
                Target::Table(nested) => table = nested,
            }
        }
    }
}

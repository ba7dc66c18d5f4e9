use std::sync::Arc;
use std::time::{Duration, Instant};

use relay_core::{Route, RouteId};

// Nested routes rarely go deeper than this.
const INITIAL_DEPTH: usize = 8;

/// One frame of the route stack: the route currently being executed.
#[derive(Debug, Clone)]
pub struct RouteContext {
    route: Arc<Route>,
    entered_at: Instant,
}

impl RouteContext {
    #[must_use]
    pub fn new(route: Arc<Route>) -> Self {
        Self {
            route,
            entered_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    #[must_use]
    pub fn route_id(&self) -> &RouteId {
        &self.route.id
    }

    /// Time spent inside this route so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.entered_at.elapsed()
    }
}

/// LIFO stack of route frames; the top is the innermost active route.
#[derive(Debug)]
pub struct RouteContextStack {
    frames: Vec<RouteContext>,
}

impl Default for RouteContextStack {
    fn default() -> Self {
        Self {
            frames: Vec::with_capacity(INITIAL_DEPTH),
        }
    }
}

impl RouteContextStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: RouteContext) {
        self.frames.push(frame);
    }

    /// Pops the innermost frame; `None` on an empty stack.
    pub fn pop(&mut self) -> Option<RouteContext> {
        self.frames.pop()
    }

    /// The innermost frame, if any.
    #[must_use]
    pub fn current(&self) -> Option<&RouteContext> {
        self.frames.last()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames from innermost to outermost.
    pub fn iter(&self) -> impl Iterator<Item = &RouteContext> {
        self.frames.iter().rev()
    }
}

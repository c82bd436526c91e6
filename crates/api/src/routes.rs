//! Path-pattern route table.
//!
//! Patterns are `/`-separated; a `:name` segment matches any single segment.
//! Empty segments are ignored, so trailing and doubled slashes do not
//! matter. When several patterns match, the one with the most literal
//! segments wins, then the one registered first.

use civgate_auth::{ResolvedRoute, RouteResolver};
use civgate_infra::RouteSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

#[derive(Debug, Clone)]
struct RoutePattern {
    segments: Vec<Segment>,
    route: ResolvedRoute,
}

impl RoutePattern {
    fn parse(pattern: &str, route: ResolvedRoute) -> Self {
        let segments = split(pattern)
            .map(|segment| match segment.strip_prefix(':') {
                Some(_) => Segment::Param,
                None => Segment::Literal(segment.to_string()),
            })
            .collect();
        Self { segments, route }
    }

    fn matches(&self, path: &[&str]) -> bool {
        self.segments.len() == path.len()
            && self
                .segments
                .iter()
                .zip(path)
                .all(|(segment, part)| match segment {
                    Segment::Literal(literal) => literal == part,
                    Segment::Param => true,
                })
    }

    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RoutePattern>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        mut self,
        pattern: &str,
        namespace: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        self.routes.push(RoutePattern::parse(
            pattern,
            ResolvedRoute::new(namespace, action),
        ));
        self
    }

    pub fn from_settings(routes: &[RouteSettings]) -> Self {
        routes.iter().fold(Self::new(), |table, route| {
            table.route(&route.pattern, route.namespace.clone(), route.action.clone())
        })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl RouteResolver for RouteTable {
    fn resolve(&self, path: &str) -> Option<ResolvedRoute> {
        let parts: Vec<&str> = split(path).collect();

        let mut best: Option<&RoutePattern> = None;
        for candidate in self.routes.iter().filter(|r| r.matches(&parts)) {
            if best.is_none_or(|b| candidate.literal_count() > b.literal_count()) {
                best = Some(candidate);
            }
        }
        best.map(|pattern| pattern.route.clone())
    }
}

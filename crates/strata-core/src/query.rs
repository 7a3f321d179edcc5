//! # Query Module
//!
//! Read-only pattern queries over a graph view.
//!
//! Accepted form:
//!
//! ```text
//! PREFIX ex: <http://example.org/ns#>
//! SELECT ?a ?r WHERE { ?a a tourism:Attraction ; tourism:hasRating ?r } LIMIT 10
//! ```
//!
//! `SELECT *` projects every variable in the order it first appears.
//! Evaluation is the same deterministic join the rule engine uses.

use crate::formats::turtle::{Parser, Tok};
use crate::graph::{Bindings, TriplePattern};
use crate::primitives::{MAX_QUERY_PATTERNS, MAX_QUERY_ROWS};
use crate::{Graph, StrataError};
use serde::{Deserialize, Serialize};

/// A parsed `SELECT` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    /// Projected variables; empty means `*`.
    pub projection: Vec<String>,
    pub patterns: Vec<TriplePattern>,
    pub limit: Option<usize>,
}

/// Result rows of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub variables: Vec<String>,
    pub rows: Vec<Bindings>,
}

impl SelectQuery {
    /// Parse the query text.
    pub fn parse(text: &str) -> Result<Self, StrataError> {
        let mut parser = Parser::new(text, true)?;
        while parser.directive()? {}

        parser.expect_keyword("SELECT")?;
        let mut projection = Vec::new();
        if parser.peek() == Some(&Tok::Star) {
            parser.expect(&Tok::Star, "'*'")?;
        } else {
            while let Some(Tok::Var(name)) = parser.peek().cloned() {
                parser.expect(&Tok::Var(name.clone()), "variable")?;
                projection.push(name);
            }
            if projection.is_empty() {
                return Err(parser.error_here("expected '*' or variables after SELECT").into());
            }
        }

        parser.expect_keyword("WHERE")?;
        parser.expect(&Tok::LBrace, "'{'")?;
        let mut patterns = Vec::new();
        while parser.peek() != Some(&Tok::RBrace) {
            parser.triples(&mut patterns)?;
            if parser.peek() == Some(&Tok::Dot) {
                parser.expect(&Tok::Dot, "'.'")?;
            } else if parser.peek() != Some(&Tok::RBrace) {
                return Err(parser.error_here("expected '.' or '}'").into());
            }
        }
        parser.expect(&Tok::RBrace, "'}'")?;

        let mut limit = None;
        if parser.peek_keyword("LIMIT") {
            parser.expect_keyword("LIMIT")?;
            match parser.peek().cloned() {
                Some(Tok::Number(n)) => {
                    let value = n
                        .parse::<usize>()
                        .map_err(|_| parser.error_here("LIMIT must be a non-negative integer"))?;
                    parser.expect(&Tok::Number(n), "number")?;
                    limit = Some(value);
                }
                _ => return Err(parser.error_here("expected number after LIMIT").into()),
            }
        }
        if !parser.at_end() {
            return Err(parser.error_here("unexpected trailing input").into());
        }

        if patterns.is_empty() {
            return Err(StrataError::InvalidQuery(
                "WHERE clause has no patterns".to_string(),
            ));
        }
        if patterns.len() > MAX_QUERY_PATTERNS {
            return Err(StrataError::InvalidQuery(format!(
                "{} patterns exceeds maximum of {MAX_QUERY_PATTERNS}",
                patterns.len()
            )));
        }
        for var in &projection {
            if !patterns.iter().any(|p| p.variables().contains(var.as_str())) {
                return Err(StrataError::InvalidQuery(format!(
                    "projected variable ?{var} does not appear in WHERE"
                )));
            }
        }

        Ok(Self {
            projection,
            patterns,
            limit,
        })
    }

    /// Variables in the result, in projection or first-appearance order.
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        if !self.projection.is_empty() {
            return self.projection.clone();
        }
        let mut seen: Vec<String> = Vec::new();
        for pattern in &self.patterns {
            for term in [&pattern.subject, &pattern.predicate, &pattern.object] {
                if let Some(name) = term.as_var() {
                    if !seen.iter().any(|s| s == name) {
                        seen.push(name.to_string());
                    }
                }
            }
        }
        seen
    }

    /// Evaluate against `graph`.
    #[must_use]
    pub fn execute(&self, graph: &Graph) -> QueryResult {
        let variables = self.variables();
        let limit = self.limit.unwrap_or(MAX_QUERY_ROWS).min(MAX_QUERY_ROWS);
        let rows = graph
            .solve_seeded(&self.patterns, &Bindings::new(), limit)
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .filter(|(name, _)| variables.contains(name))
                    .collect()
            })
            .collect();
        QueryResult { variables, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::parse_graph;
    use crate::{Iri, Term};

    fn graph() -> Graph {
        parse_graph(
            "tourism:Dubai a tourism:City ; tourism:isCoastal true .
             tourism:Paris a tourism:City ; tourism:isCoastal false .
             tourism:Aquarium a tourism:Attraction ; tourism:locatedIn tourism:Dubai .",
        )
        .expect("parse")
    }

    #[test]
    fn select_with_projection() {
        let q = SelectQuery::parse(
            "SELECT ?c WHERE { ?c a tourism:City ; tourism:isCoastal true }",
        )
        .expect("parse");
        let result = q.execute(&graph());
        assert_eq!(result.variables, vec!["c".to_string()]);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].get("c"), Some(&Term::Iri(Iri::tourism("Dubai"))));
    }

    #[test]
    fn select_star_and_limit() {
        let q = SelectQuery::parse("select * where { ?c a tourism:City . } limit 1").expect("parse");
        let result = q.execute(&graph());
        assert_eq!(result.variables, vec!["c".to_string()]);
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn prefix_declarations() {
        let q = SelectQuery::parse(
            "PREFIX t: <http://example.org/tourism#>
             SELECT ?a ?c WHERE { ?a t:locatedIn ?c . ?c a t:City }",
        )
        .expect("parse");
        assert_eq!(q.execute(&graph()).rows.len(), 1);
    }

    #[test]
    fn rejects_malformed_queries() {
        assert!(SelectQuery::parse("SELECT WHERE { ?a ?b ?c }").is_err());
        assert!(SelectQuery::parse("SELECT ?x WHERE { ?a ?b ?c }").is_err());
        assert!(SelectQuery::parse("SELECT * WHERE { }").is_err());
        assert!(SelectQuery::parse("SELECT * WHERE { ?a ?b ?c } LIMIT x").is_err());
        assert!(SelectQuery::parse("SELECT * WHERE { ?a ?b ?c } extra").is_err());
    }

    #[test]
    fn pattern_count_is_bounded() {
        let body = (0..=MAX_QUERY_PATTERNS)
            .map(|i| format!("?s{i} ?p{i} ?o{i} ."))
            .collect::<String>();
        let err = SelectQuery::parse(&format!("SELECT * WHERE {{ {body} }}")).expect_err("too big");
        assert!(matches!(err, StrataError::InvalidQuery(_)));
    }
}

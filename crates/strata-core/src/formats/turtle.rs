//! # Turtle Subset
//!
//! The textual graph syntax used for agent payloads, bootstrap graphs, rule
//! files and query patterns.
//!
//! Supported: `@prefix` / `PREFIX`, `<iri>`, prefixed names, `a`, string
//! literals (`'...'`, `"..."`, `"""..."""`) with `^^datatype` or `@lang`,
//! bare integers, decimals and doubles, `true` / `false`, `;` and `,`
//! continuations, `#` comments.
//!
//! Not supported: blank nodes (`_:x`, `[...]`), collections, `@base`.
//! These are rejected with a positioned `ParseError`.

use crate::graph::{PatternTerm, TriplePattern};
use crate::{Datatype, Decimal, Graph, Iri, Literal, Term, Triple, primitives};
use std::collections::BTreeMap;
use std::fmt::Write;
use thiserror::Error;

// =============================================================================
// ERRORS
// =============================================================================

/// A syntax error with its 1-based position in the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    fn at(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

// =============================================================================
// PREFIXES
// =============================================================================

/// Prefix table. `Default` holds `rdf`, `rdfs`, `xsd`, `owl`, `sh` and
/// `tourism`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefixes(BTreeMap<String, String>);

impl Default for Prefixes {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert("rdf".to_string(), primitives::RDF.to_string());
        map.insert("rdfs".to_string(), primitives::RDFS.to_string());
        map.insert("xsd".to_string(), primitives::XSD.to_string());
        map.insert("owl".to_string(), primitives::OWL.to_string());
        map.insert("sh".to_string(), primitives::SHACL.to_string());
        map.insert("tourism".to_string(), primitives::TOURISM.to_string());
        Self(map)
    }
}

impl Prefixes {
    pub fn insert(&mut self, prefix: &str, namespace: &str) {
        self.0.insert(prefix.to_string(), namespace.to_string());
    }

    #[must_use]
    pub fn expand(&self, prefix: &str, local: &str) -> Option<String> {
        self.0.get(prefix).map(|ns| format!("{ns}{local}"))
    }

    /// `prefix:local` for `iri`, using the longest matching namespace.
    #[must_use]
    pub fn compact(&self, iri: &str) -> Option<String> {
        self.0
            .iter()
            .filter_map(|(prefix, ns)| {
                let local = iri.strip_prefix(ns.as_str())?;
                is_simple_local(local).then_some((ns.len(), prefix, local))
            })
            .max_by_key(|(len, _, _)| *len)
            .map(|(_, prefix, local)| format!("{prefix}:{local}"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, ns)| (p.as_str(), ns.as_str()))
    }
}

fn is_simple_local(local: &str) -> bool {
    !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !local.starts_with('-')
}

// =============================================================================
// LEXER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Tok {
    IriRef(String),
    PName { prefix: String, local: String },
    Var(String),
    Str(String),
    LangTag(String),
    Caret2,
    Number(String),
    Word(String),
    AtPrefix,
    Dot,
    Semi,
    Comma,
    LBrace,
    RBrace,
    Star,
}

#[derive(Debug, Clone)]
pub(crate) struct Spanned {
    pub(crate) tok: Tok,
    pub(crate) line: usize,
    pub(crate) column: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::at(self.line, self.column, message)
    }

    fn tokenize(mut self) -> Result<(Vec<Spanned>, (usize, usize)), ParseError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
                continue;
            }
            if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
                continue;
            }

            let (line, column) = (self.line, self.column);
            let tok = self.token(c)?;
            tokens.push(Spanned { tok, line, column });
        }
        Ok((tokens, (self.line, self.column)))
    }

    fn token(&mut self, c: char) -> Result<Tok, ParseError> {
        match c {
            '<' => self.iri_ref(),
            '"' | '\'' => self.string(c),
            '@' => {
                self.bump();
                let word = self.take_while(|c| c.is_ascii_alphanumeric() || c == '-');
                match word.as_str() {
                    "prefix" => Ok(Tok::AtPrefix),
                    "base" => Err(self.error("@base is not supported")),
                    "" => Err(self.error("expected language tag after '@'")),
                    _ => Ok(Tok::LangTag(word)),
                }
            }
            '^' => {
                self.bump();
                if self.bump() == Some('^') {
                    Ok(Tok::Caret2)
                } else {
                    Err(self.error("expected '^^'"))
                }
            }
            '?' | '$' => {
                self.bump();
                let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                if name.is_empty() {
                    Err(self.error("expected variable name"))
                } else {
                    Ok(Tok::Var(name))
                }
            }
            '.' => self.single(Tok::Dot),
            ';' => self.single(Tok::Semi),
            ',' => self.single(Tok::Comma),
            '{' => self.single(Tok::LBrace),
            '}' => self.single(Tok::RBrace),
            '*' => self.single(Tok::Star),
            '[' | '(' => Err(self.error("blank nodes and collections are not supported")),
            '_' if self.peek_at(1) == Some(':') => {
                Err(self.error("blank nodes are not supported"))
            }
            c if c.is_ascii_digit() => Ok(self.number()),
            '+' | '-'
                if self
                    .peek_at(1)
                    .is_some_and(|n| n.is_ascii_digit() || n == '.') =>
            {
                Ok(self.number())
            }
            c if c.is_alphabetic() || c == ':' || c == '_' => Ok(self.word()),
            other => Err(self.error(format!("unexpected character {other:?}"))),
        }
    }

    fn single(&mut self, tok: Tok) -> Result<Tok, ParseError> {
        self.bump();
        Ok(tok)
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !keep(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    fn iri_ref(&mut self) -> Result<Tok, ParseError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('>') => return Ok(Tok::IriRef(out)),
                Some('\n') | None => return Err(self.error("unterminated IRI")),
                Some(c) => out.push(c),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<Tok, ParseError> {
        let long = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        let opening = if long { 3 } else { 1 };
        for _ in 0..opening {
            self.bump();
        }

        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated string"));
            };
            if c == quote {
                if !long {
                    return Ok(Tok::Str(out));
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.bump();
                    self.bump();
                    return Ok(Tok::Str(out));
                }
                out.push(c);
                continue;
            }
            if c == '\n' && !long {
                return Err(self.error("newline in string literal"));
            }
            if c == '\\' {
                out.push(self.escape()?);
                continue;
            }
            out.push(c);
        }
    }

    fn escape(&mut self) -> Result<char, ParseError> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('\\') => Ok('\\'),
            Some('u') => self.unicode_escape(4),
            Some('U') => self.unicode_escape(8),
            _ => Err(self.error("invalid escape sequence")),
        }
    }

    fn unicode_escape(&mut self, digits: usize) -> Result<char, ParseError> {
        let mut hex = String::with_capacity(digits);
        for _ in 0..digits {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                _ => return Err(self.error("invalid unicode escape")),
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error("invalid unicode code point"))
    }

    fn number(&mut self) -> Tok {
        let mut out = String::new();
        if let Some(sign @ ('+' | '-')) = self.peek() {
            out.push(sign);
            self.bump();
        }
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                out.push(c);
                self.bump();
            } else if c == '.'
                && !seen_dot
                && !seen_exp
                && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())
            {
                seen_dot = true;
                out.push(c);
                self.bump();
            } else if (c == 'e' || c == 'E') && !seen_exp {
                seen_exp = true;
                out.push(c);
                self.bump();
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    out.push(sign);
                    self.bump();
                }
            } else {
                break;
            }
        }
        Tok::Number(out)
    }

    fn word(&mut self) -> Tok {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.' | '%') {
                // A trailing '.' terminates the statement.
                if c == '.'
                    && !self
                        .peek_at(1)
                        .is_some_and(|n| n.is_alphanumeric() || matches!(n, '_' | '-' | ':'))
                {
                    break;
                }
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match out.split_once(':') {
            Some((prefix, local)) => Tok::PName {
                prefix: prefix.to_string(),
                local: local.to_string(),
            },
            None => Tok::Word(out),
        }
    }
}

// =============================================================================
// PARSER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Subject,
    Predicate,
    Object,
}

/// Token-level parser shared by graph documents and queries.
pub(crate) struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    prefixes: Prefixes,
    allow_vars: bool,
    end: (usize, usize),
}

impl Parser {
    pub(crate) fn new(input: &str, allow_vars: bool) -> Result<Self, ParseError> {
        let (tokens, end) = Lexer::new(input).tokenize()?;
        Ok(Self {
            tokens,
            pos: 0,
            prefixes: Prefixes::default(),
            allow_vars,
            end,
        })
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub(crate) fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|s| &s.tok)
    }

    fn next(&mut self) -> Result<Spanned, ParseError> {
        let spanned = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ParseError::at(self.end.0, self.end.1, "unexpected end of input"))?;
        self.pos += 1;
        Ok(spanned)
    }

    pub(crate) fn error_here(&self, message: impl Into<String>) -> ParseError {
        match self.tokens.get(self.pos) {
            Some(s) => ParseError::at(s.line, s.column, message),
            None => ParseError::at(self.end.0, self.end.1, message),
        }
    }

    pub(crate) fn expect(&mut self, want: &Tok, what: &str) -> Result<(), ParseError> {
        if self.peek() == Some(want) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error_here(format!("expected {what}")))
        }
    }

    /// Case-insensitive keyword check without consuming.
    pub(crate) fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Tok::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    pub(crate) fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error_here(format!("expected {keyword}")))
        }
    }

    /// Consume one `@prefix` / `PREFIX` directive if present.
    pub(crate) fn directive(&mut self) -> Result<bool, ParseError> {
        let turtle_style = match self.peek() {
            Some(Tok::AtPrefix) => true,
            Some(Tok::Word(w)) if w.eq_ignore_ascii_case("prefix") => false,
            _ => return Ok(false),
        };
        self.pos += 1;

        let prefix_tok = self.next()?;
        let Tok::PName { prefix, local } = prefix_tok.tok else {
            return Err(ParseError::at(
                prefix_tok.line,
                prefix_tok.column,
                "expected prefix name",
            ));
        };
        if !local.is_empty() {
            return Err(ParseError::at(
                prefix_tok.line,
                prefix_tok.column,
                "prefix name must end with ':'",
            ));
        }
        let ns_tok = self.next()?;
        let Tok::IriRef(namespace) = ns_tok.tok else {
            return Err(ParseError::at(
                ns_tok.line,
                ns_tok.column,
                "expected namespace IRI",
            ));
        };
        self.prefixes.insert(&prefix, &namespace);
        if turtle_style {
            self.expect(&Tok::Dot, "'.' after @prefix")?;
        }
        Ok(true)
    }

    /// `subject predicate object (, object)* (; predicate object ...)*`
    pub(crate) fn triples(&mut self, out: &mut Vec<TriplePattern>) -> Result<(), ParseError> {
        let subject = self.term(Position::Subject)?;
        loop {
            let predicate = self.term(Position::Predicate)?;
            loop {
                let object = self.term(Position::Object)?;
                out.push(TriplePattern::new(
                    subject.clone(),
                    predicate.clone(),
                    object,
                ));
                if self.peek() == Some(&Tok::Comma) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            if self.peek() != Some(&Tok::Semi) {
                return Ok(());
            }
            while self.peek() == Some(&Tok::Semi) {
                self.pos += 1;
            }
            // Trailing ';' before the terminator.
            if matches!(self.peek(), Some(Tok::Dot | Tok::RBrace) | None) {
                return Ok(());
            }
        }
    }

    fn term(&mut self, position: Position) -> Result<PatternTerm, ParseError> {
        let spanned = self.next()?;
        let (line, column) = (spanned.line, spanned.column);
        let fail = |message: String| ParseError::at(line, column, message);

        let term = match spanned.tok {
            Tok::Var(name) => {
                if !self.allow_vars {
                    return Err(fail(format!("variable ?{name} is not allowed in graph data")));
                }
                return Ok(PatternTerm::Var(name));
            }
            Tok::IriRef(value) => Term::Iri(Iri::new(value).map_err(|e| fail(e.to_string()))?),
            Tok::PName { prefix, local } => {
                let expanded = self
                    .prefixes
                    .expand(&prefix, &local)
                    .ok_or_else(|| fail(format!("unknown prefix '{prefix}:'")))?;
                Term::Iri(Iri::new(expanded).map_err(|e| fail(e.to_string()))?)
            }
            Tok::Word(word) if word == "a" && position == Position::Predicate => {
                Term::Iri(Iri::rdf_type())
            }
            Tok::Word(word) if word == "true" || word == "false" => {
                Term::Literal(Literal::boolean(word == "true"))
            }
            Tok::Number(lexical) => {
                let datatype = if lexical.contains(['e', 'E']) {
                    Datatype::Double
                } else if lexical.contains('.') {
                    Datatype::Decimal
                } else {
                    Datatype::Integer
                };
                if Decimal::parse(&lexical).is_none() && datatype != Datatype::Double {
                    return Err(fail(format!("number '{lexical}' is out of range")));
                }
                Term::Literal(Literal::new(lexical, datatype).map_err(|e| fail(e.to_string()))?)
            }
            Tok::Str(lexical) => {
                let datatype = match self.peek() {
                    Some(Tok::LangTag(tag)) => {
                        let tag = tag.clone();
                        self.pos += 1;
                        Datatype::LangString(tag)
                    }
                    Some(Tok::Caret2) => {
                        self.pos += 1;
                        match self.term(Position::Object)? {
                            PatternTerm::Const(Term::Iri(iri)) => Datatype::from_iri(&iri),
                            _ => return Err(self.error_here("expected datatype IRI after '^^'")),
                        }
                    }
                    _ => Datatype::String,
                };
                Term::Literal(Literal::new(lexical, datatype).map_err(|e| fail(e.to_string()))?)
            }
            other => return Err(fail(format!("unexpected token {}", describe(&other)))),
        };

        if position != Position::Object && matches!(term, Term::Literal(_)) {
            return Err(fail("literal is only allowed in object position".to_string()));
        }
        Ok(PatternTerm::Const(term))
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Word(w) => format!("'{w}'"),
        Tok::LangTag(t) => format!("'@{t}'"),
        Tok::Caret2 => "'^^'".to_string(),
        Tok::AtPrefix => "'@prefix'".to_string(),
        Tok::Dot => "'.'".to_string(),
        Tok::Semi => "';'".to_string(),
        Tok::Comma => "','".to_string(),
        Tok::LBrace => "'{'".to_string(),
        Tok::RBrace => "'}'".to_string(),
        Tok::Star => "'*'".to_string(),
        other => format!("{other:?}"),
    }
}

// =============================================================================
// PUBLIC ENTRY POINTS
// =============================================================================

/// Parse a graph document into triples, in document order.
pub fn parse_document(input: &str) -> Result<Vec<Triple>, ParseError> {
    let mut parser = Parser::new(input, false)?;
    let mut patterns = Vec::new();
    while !parser.at_end() {
        if parser.directive()? {
            continue;
        }
        parser.triples(&mut patterns)?;
        parser.expect(&Tok::Dot, "'.' at end of statement")?;
    }

    patterns
        .into_iter()
        .map(|pattern| match pattern {
            TriplePattern {
                subject: PatternTerm::Const(Term::Iri(subject)),
                predicate: PatternTerm::Const(Term::Iri(predicate)),
                object: PatternTerm::Const(object),
            } => Ok(Triple::new(subject, predicate, object)),
            _ => Err(ParseError::at(1, 1, "pattern in graph data")),
        })
        .collect()
}

/// Parse a graph document into a `Graph`.
pub fn parse_graph(input: &str) -> Result<Graph, ParseError> {
    Ok(parse_document(input)?.into_iter().collect())
}

/// Parse one pattern term (`?x`, `tourism:City`, `"4.5"^^xsd:decimal`, ...).
pub fn parse_pattern_term(text: &str) -> Result<PatternTerm, ParseError> {
    let mut parser = Parser::new(text, true)?;
    let term = parser.term(Position::Object)?;
    if !parser.at_end() {
        return Err(parser.error_here("trailing input after term"));
    }
    Ok(term)
}

// =============================================================================
// SERIALIZER
// =============================================================================

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

fn render_iri(prefixes: &Prefixes, iri: &str) -> String {
    prefixes
        .compact(iri)
        .unwrap_or_else(|| format!("<{iri}>"))
}

fn is_bare_integer(lexical: &str) -> bool {
    let digits = lexical.strip_prefix('-').unwrap_or(lexical);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_bare_decimal(lexical: &str) -> bool {
    let unsigned = lexical.strip_prefix('-').unwrap_or(lexical);
    unsigned
        .split_once('.')
        .is_some_and(|(i, f)| is_bare_integer(i) && is_bare_integer(f))
}

/// Render a term in compact Turtle form using the default prefixes.
#[must_use]
pub fn render_term(term: &Term) -> String {
    render_term_with(&Prefixes::default(), term)
}

fn render_term_with(prefixes: &Prefixes, term: &Term) -> String {
    match term {
        Term::Iri(iri) => render_iri(prefixes, iri.as_str()),
        Term::Literal(lit) => {
            let quoted = format!("\"{}\"", escape(&lit.lexical));
            match &lit.datatype {
                Datatype::String => quoted,
                Datatype::LangString(tag) => format!("{quoted}@{tag}"),
                Datatype::Integer if is_bare_integer(&lit.lexical) => lit.lexical.clone(),
                Datatype::Decimal if is_bare_decimal(&lit.lexical) => lit.lexical.clone(),
                Datatype::Boolean if lit.lexical == "true" || lit.lexical == "false" => {
                    lit.lexical.clone()
                }
                other => format!("{quoted}^^{}", render_iri(prefixes, &other.iri())),
            }
        }
    }
}

/// Serialize a graph as Turtle, grouped by subject with `a` statements first.
#[must_use]
pub fn to_turtle(graph: &Graph) -> String {
    let prefixes = Prefixes::default();
    let mut out = String::new();
    for (prefix, ns) in prefixes.iter() {
        let _ = writeln!(out, "@prefix {prefix}: <{ns}> .");
    }

    let rdf_type = Iri::rdf_type();
    let mut by_subject: BTreeMap<Iri, (Vec<String>, Vec<String>)> = BTreeMap::new();
    for triple in graph.iter() {
        let object = render_term_with(&prefixes, &triple.object);
        let (types, rest) = by_subject.entry(triple.subject).or_default();
        if triple.predicate == rdf_type {
            types.push(format!("a {object}"));
        } else {
            rest.push(format!(
                "{} {object}",
                render_iri(&prefixes, triple.predicate.as_str())
            ));
        }
    }

    for (subject, (types, rest)) in &by_subject {
        let _ = write!(
            out,
            "\n{} {} .\n",
            render_iri(&prefixes, subject.as_str()),
            types.iter().chain(rest).cloned().collect::<Vec<_>>().join(" ;\n    ")
        );
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DUBAI: &str = r#"
        @prefix tourism: <http://example.org/tourism#> .
        # a coastal city
        tourism:Dubai a tourism:City ;
            tourism:hasName "Dubai" ;
            tourism:isCoastal true .
        tourism:DubaiAquarium a tourism:Attraction ;
            tourism:locatedIn tourism:Dubai ;
            tourism:hasAmenity "Playground", "Cafe" ;
            tourism:hasRating 4.6 ;
            tourism:hasMinAge 0 .
    "#;

    #[test]
    fn parses_document_with_continuations() {
        let triples = parse_document(DUBAI).expect("parse");
        assert_eq!(triples.len(), 9);
        let graph = parse_graph(DUBAI).expect("parse");
        let amenities = graph.objects(&Iri::tourism("DubaiAquarium"), &Iri::tourism("hasAmenity"));
        assert_eq!(amenities.len(), 2);
        let rating = graph.objects(&Iri::tourism("DubaiAquarium"), &Iri::tourism("hasRating"));
        assert_eq!(
            rating[0].as_decimal(),
            Some(Decimal::from_millionths(4_600_000))
        );
    }

    #[test]
    fn default_prefixes_need_no_declaration() {
        let graph = parse_graph("tourism:Paris a tourism:City .").expect("parse");
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn typed_and_tagged_literals() {
        let graph = parse_graph(
            r#"tourism:A tourism:hasEntryFeeAmount "free"^^xsd:decimal ;
                        tourism:hasName "Aquarium"@en ;
                        tourism:opened "2008-01-01T00:00:00Z"^^<http://www.w3.org/2001/XMLSchema#dateTime> ."#,
        )
        .expect("parse");
        let fee = graph.objects(&Iri::tourism("A"), &Iri::tourism("hasEntryFeeAmount"));
        let fee = fee[0].as_literal().expect("literal");
        assert_eq!(fee.datatype, Datatype::Decimal);
        assert_eq!(fee.as_decimal(), None);
        let opened = graph.objects(&Iri::tourism("A"), &Iri::tourism("opened"));
        assert_eq!(
            opened[0].as_literal().map(|l| l.datatype.clone()),
            Some(Datatype::DateTime)
        );
    }

    #[test]
    fn errors_carry_position() {
        let err = parse_document("tourism:A a tourism:City .\ntourism:B a _:blank .")
            .expect_err("blank node");
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 13);

        let err = parse_document("tourism:A a tourism:City").expect_err("missing dot");
        assert!(err.message.contains("'.'"));

        let err = parse_document("nope:A a tourism:City .").expect_err("unknown prefix");
        assert!(err.message.contains("unknown prefix"));
    }

    #[test]
    fn rejects_variables_and_literal_subjects() {
        assert!(parse_document("?x a tourism:City .").is_err());
        assert!(parse_document("\"x\" a tourism:City .").is_err());
        assert!(parse_document("tourism:A [ a tourism:City ] .").is_err());
    }

    #[test]
    fn pattern_terms() {
        assert_eq!(parse_pattern_term("?city"), Ok(PatternTerm::var("city")));
        assert_eq!(
            parse_pattern_term("tourism:City"),
            Ok(PatternTerm::iri(Iri::tourism("City")))
        );
        assert!(parse_pattern_term("tourism:City extra").is_err());
    }

    #[test]
    fn serializer_output_parses_back() {
        let graph = parse_graph(DUBAI).expect("parse");
        let text = to_turtle(&graph);
        assert!(text.contains("tourism:Dubai a tourism:City ;"));
        assert!(text.contains("tourism:DubaiAquarium a tourism:Attraction ;"));
        assert_eq!(parse_graph(&text).expect("reparse"), graph);
    }

    #[test]
    fn escapes_survive_serialization() {
        let graph = parse_graph(r#"tourism:A tourism:hasName "Say \"hi\"\n" ."#).expect("parse");
        assert_eq!(parse_graph(&to_turtle(&graph)).expect("reparse"), graph);
    }
}

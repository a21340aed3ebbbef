use std::collections::BTreeMap;
use std::fmt;

/// Closed tagged model for test-case inputs, expected outputs and candidate
/// results. Produced once at the normalizer/runner boundary and consumed
/// uniformly by the comparator and the progress notifier.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
}

impl Value {
    /// Parse raw test-case text into a typed value.
    ///
    /// Layers, first success wins:
    /// 1. strict JSON,
    /// 2. language-literal form (numbers, quoted strings, lists, tuples,
    ///    mappings, `True`/`False`/`None`, bare top-level tuples),
    /// 3. naive comma split (pieces kept as trimmed text),
    /// 4. the trimmed original string.
    ///
    /// Never fails. A successfully parsed scalar is returned as-is; wrapping
    /// scalars into argument lists is the runner's concern, not the parser's.
    pub fn parse(raw: &str) -> Value {
        let cleaned = raw.trim();

        if let Ok(json) = serde_json::from_str::<serde_json::Value>(cleaned) {
            return json.into();
        }

        if let Some(value) = literal::parse(cleaned) {
            return value;
        }

        if cleaned.contains(',') {
            return Value::Sequence(
                cleaned
                    .split(',')
                    .map(|piece| Value::Text(piece.trim().to_string()))
                    .collect(),
            );
        }

        Value::Text(cleaned.to_string())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// The sequence of numbers this value holds, if every element is numeric.
    pub fn as_numeric_sequence(&self) -> Option<Vec<f64>> {
        match self {
            Value::Sequence(items) => items.iter().map(Value::as_number).collect(),
            _ => None,
        }
    }

    /// Comparison form: scalars become a one-element sequence, sequences and
    /// mappings pass through unchanged.
    pub fn into_comparison_form(self) -> Value {
        match self {
            Value::Sequence(_) | Value::Mapping(_) => self,
            scalar => Value::Sequence(vec![scalar]),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Mapping(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Mapping(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Canonical encoding: strict JSON, integral numbers printed without a
/// fractional part. `Value::parse` applied to this output reproduces the value.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(f, *n),
            Value::Text(s) => {
                f.write_str(&serde_json::to_string(s).map_err(|_| fmt::Error)?)
            }
            Value::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Mapping(map) => {
                f.write_str("{")?;
                for (i, (key, val)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&serde_json::to_string(key).map_err(|_| fmt::Error)?)?;
                    write!(f, ": {val}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn fmt_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

/// Recursive-descent parser for language-literal input, the middle layer of
/// `Value::parse`. Accepts the literal subset test-case authors actually use:
/// numbers, quoted strings, lists, tuples, string-keyed dicts, the
/// `True`/`False`/`None` keywords, and bare top-level tuples (`2, 3`).
mod literal {
    use super::Value;
    use std::collections::BTreeMap;

    pub fn parse(input: &str) -> Option<Value> {
        let mut p = Parser { src: input, pos: 0 };
        p.skip_ws();
        let first = p.parse_value()?;
        p.skip_ws();

        if p.peek() == Some(',') {
            // Bare top-level tuple: `2, 3` or the one-element `2,`.
            let mut items = vec![first];
            while p.eat(',') {
                p.skip_ws();
                if p.at_end() {
                    break;
                }
                items.push(p.parse_value()?);
                p.skip_ws();
            }
            return p.at_end().then_some(Value::Sequence(items));
        }

        p.at_end().then_some(first)
    }

    struct Parser<'a> {
        src: &'a str,
        pos: usize,
    }

    impl Parser<'_> {
        fn peek(&self) -> Option<char> {
            self.src[self.pos..].chars().next()
        }

        fn bump(&mut self) -> Option<char> {
            let c = self.peek()?;
            self.pos += c.len_utf8();
            Some(c)
        }

        fn eat(&mut self, expected: char) -> bool {
            if self.peek() == Some(expected) {
                self.bump();
                true
            } else {
                false
            }
        }

        fn at_end(&self) -> bool {
            self.pos >= self.src.len()
        }

        fn skip_ws(&mut self) {
            while self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            }
        }

        fn parse_value(&mut self) -> Option<Value> {
            match self.peek()? {
                '[' => self.parse_list(),
                '(' => self.parse_paren(),
                '{' => self.parse_mapping(),
                '\'' | '"' => self.parse_string(),
                c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                    self.parse_number()
                }
                c if c.is_alphabetic() => self.parse_keyword(),
                _ => None,
            }
        }

        fn parse_list(&mut self) -> Option<Value> {
            self.eat('[');
            let (items, _) = self.parse_elements(']')?;
            Some(Value::Sequence(items))
        }

        /// `(a, b)` is a tuple, `(a)` is just a parenthesized value, `(a,)`
        /// is a one-element tuple.
        fn parse_paren(&mut self) -> Option<Value> {
            self.eat('(');
            let (mut items, saw_comma) = self.parse_elements(')')?;
            if items.len() == 1 && !saw_comma {
                return items.pop();
            }
            Some(Value::Sequence(items))
        }

        fn parse_elements(&mut self, close: char) -> Option<(Vec<Value>, bool)> {
            let mut items = Vec::new();
            let mut saw_comma = false;
            loop {
                self.skip_ws();
                if self.eat(close) {
                    return Some((items, saw_comma));
                }
                items.push(self.parse_value()?);
                self.skip_ws();
                if self.eat(',') {
                    saw_comma = true;
                } else if self.eat(close) {
                    return Some((items, saw_comma));
                } else {
                    return None;
                }
            }
        }

        fn parse_mapping(&mut self) -> Option<Value> {
            self.eat('{');
            let mut map = BTreeMap::new();
            loop {
                self.skip_ws();
                if self.eat('}') {
                    return Some(Value::Mapping(map));
                }
                let key = match self.parse_string()? {
                    Value::Text(k) => k,
                    _ => return None,
                };
                self.skip_ws();
                if !self.eat(':') {
                    return None;
                }
                self.skip_ws();
                let value = self.parse_value()?;
                map.insert(key, value);
                self.skip_ws();
                if !self.eat(',') {
                    return self.eat('}').then_some(Value::Mapping(map));
                }
            }
        }

        fn parse_string(&mut self) -> Option<Value> {
            let quote = self.bump()?;
            if quote != '\'' && quote != '"' {
                return None;
            }
            let mut out = String::new();
            loop {
                match self.bump()? {
                    c if c == quote => return Some(Value::Text(out)),
                    '\\' => match self.bump()? {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        other => out.push(other),
                    },
                    c => out.push(c),
                }
            }
        }

        fn parse_number(&mut self) -> Option<Value> {
            let start = self.pos;
            if self.peek() == Some('+') || self.peek() == Some('-') {
                self.bump();
            }
            let mut saw_digit = false;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                saw_digit = true;
                self.bump();
            }
            if self.eat('.') {
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    saw_digit = true;
                    self.bump();
                }
            }
            if !saw_digit {
                return None;
            }
            if self.peek() == Some('e') || self.peek() == Some('E') {
                self.bump();
                if self.peek() == Some('+') || self.peek() == Some('-') {
                    self.bump();
                }
                if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    return None;
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
            self.src[start..self.pos].parse::<f64>().ok().map(Value::Number)
        }

        fn parse_keyword(&mut self) -> Option<Value> {
            let start = self.pos;
            while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
                self.bump();
            }
            match &self.src[start..self.pos] {
                "True" => Some(Value::Bool(true)),
                "False" => Some(Value::Bool(false)),
                "None" => Some(Value::Null),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_layer_preferred() {
        assert_eq!(Value::parse("5"), Value::Number(5.0));
        assert_eq!(Value::parse("\"abc\""), Value::Text("abc".into()));
        assert_eq!(
            Value::parse("[1, 2, 3]"),
            Value::Sequence(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0)
            ])
        );
        assert_eq!(Value::parse("null"), Value::Null);
    }

    #[test]
    fn test_literal_layer() {
        assert_eq!(
            Value::parse("(2, 3)"),
            Value::Sequence(vec![Value::Number(2.0), Value::Number(3.0)])
        );
        assert_eq!(Value::parse("'abc'"), Value::Text("abc".into()));
        assert_eq!(Value::parse("True"), Value::Bool(true));
        assert_eq!(Value::parse("None"), Value::Null);
        assert_eq!(Value::parse("(5)"), Value::Number(5.0));
        assert_eq!(
            Value::parse("(5,)"),
            Value::Sequence(vec![Value::Number(5.0)])
        );
    }

    #[test]
    fn test_bare_tuple() {
        // "2,3" parses on the literal layer as a bare tuple.
        assert_eq!(
            Value::parse("2,3"),
            Value::Sequence(vec![Value::Number(2.0), Value::Number(3.0)])
        );
        assert_eq!(
            Value::parse("2,"),
            Value::Sequence(vec![Value::Number(2.0)])
        );
    }

    #[test]
    fn test_literal_mapping() {
        let parsed = Value::parse("{'a': 1, 'b': [2, 3]}");
        let Value::Mapping(map) = parsed else {
            panic!("expected mapping");
        };
        assert_eq!(map["a"], Value::Number(1.0));
        assert_eq!(
            map["b"],
            Value::Sequence(vec![Value::Number(2.0), Value::Number(3.0)])
        );
    }

    #[test]
    fn test_comma_fallback() {
        assert_eq!(
            Value::parse("foo, bar"),
            Value::Sequence(vec![
                Value::Text("foo".into()),
                Value::Text("bar".into())
            ])
        );
    }

    #[test]
    fn test_unparsable_returns_cleaned_text() {
        assert_eq!(Value::parse("  hello world  "), Value::Text("hello world".into()));
        assert_eq!(Value::parse(""), Value::Text(String::new()));
    }

    #[test]
    fn test_scalar_not_wrapped() {
        // Wrapping scalars into argument lists is the runner's job.
        assert!(matches!(Value::parse("42"), Value::Number(_)));
        assert!(matches!(Value::parse("'x'"), Value::Text(_)));
    }

    #[test]
    fn test_canonical_roundtrip() {
        for raw in [
            "5",
            "2.5",
            "[1, 2, 3]",
            "\"abc\"",
            "(2, 3)",
            "{'a': 1}",
            "True",
            "None",
            "[\"a\", [1, 2], null]",
        ] {
            let value = Value::parse(raw);
            let reparsed = Value::parse(&value.to_string());
            assert_eq!(value, reparsed, "roundtrip failed for {raw:?}");
        }
    }

    #[test]
    fn test_integral_numbers_print_without_fraction() {
        assert_eq!(Value::Number(5.0).to_string(), "5");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(-3.0).to_string(), "-3");
    }

    #[test]
    fn test_numeric_sequence() {
        let seq = Value::parse("[1, 2.5, 3]");
        assert_eq!(seq.as_numeric_sequence(), Some(vec![1.0, 2.5, 3.0]));
        assert_eq!(Value::parse("[1, \"a\"]").as_numeric_sequence(), None);
        assert_eq!(Value::Number(1.0).as_numeric_sequence(), None);
    }

    #[test]
    fn test_comparison_form() {
        assert_eq!(
            Value::Number(5.0).into_comparison_form(),
            Value::Sequence(vec![Value::Number(5.0)])
        );
        let seq = Value::Sequence(vec![Value::Number(1.0)]);
        assert_eq!(seq.clone().into_comparison_form(), seq);
    }

    #[test]
    fn test_escaped_strings() {
        assert_eq!(Value::parse("'a\\'b'"), Value::Text("a'b".into()));
        assert_eq!(Value::parse("'a\\nb'"), Value::Text("a\nb".into()));
    }
}

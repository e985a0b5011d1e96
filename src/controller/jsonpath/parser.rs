//! Parser for canonical `{ expr }` templates.

use super::{CompareOp, Filter, Segment, Step};
use serde_json::Value;

/// Characters that end a bare field name
const NAME_TERMINATORS: &[char] = &[
    '.', '[', ']', '(', ')', ' ', '\t', '\n', '\'', '"', '=', '!', '<', '>', ',', '&', '|', '{',
    '}', '*', '@',
];

pub(crate) fn parse_template(template: &str) -> Result<Vec<Segment>, String> {
    let chars: Vec<char> = template.chars().collect();
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut pos = 0;

    while pos < chars.len() {
        if chars[pos] != '{' {
            text.push(chars[pos]);
            pos += 1;
            continue;
        }
        let close = find_action_end(&chars, pos + 1).ok_or_else(|| "unclosed action".to_string())?;
        if !text.is_empty() {
            segments.push(Segment::Text(std::mem::take(&mut text)));
        }
        let expr: String = chars[pos + 1..close].iter().collect();
        segments.push(Segment::Expr(parse_expression(expr.trim())?));
        pos = close + 1;
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

/// Index of the `}` closing an action opened just before `from`
fn find_action_end(chars: &[char], from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut pos = from;
    while pos < chars.len() {
        let c = chars[pos];
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '}' => return Some(pos),
                _ => {}
            },
        }
        pos += 1;
    }
    None
}

fn parse_expression(expr: &str) -> Result<Vec<Step>, String> {
    let mut parser = Parser::new(expr);
    parser.skip_whitespace();
    if parser.peek() == Some('$') {
        parser.pos += 1;
    }
    let steps = parser.parse_steps(true)?;
    parser.skip_whitespace();
    match parser.peek() {
        None => Ok(steps),
        Some(c) => Err(format!("unexpected '{c}' at position {}", parser.pos)),
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(format!("expected '{expected}', found '{c}'")),
            None => Err(format!("expected '{expected}', found end of expression")),
        }
    }

    /// Steps until something that is not a step
    ///
    /// A leading bare name (`first.data`) is accepted at the top level.
    fn parse_steps(&mut self, allow_bare_name: bool) -> Result<Vec<Step>, String> {
        let mut steps = Vec::new();

        if allow_bare_name && self.peek().is_some_and(|c| !NAME_TERMINATORS.contains(&c)) {
            steps.push(Step::Field(self.read_name()));
        }

        loop {
            match self.peek() {
                Some('.') if self.peek_at(1) == Some('.') => {
                    self.pos += 2;
                    steps.push(Step::Recursive);
                    match self.peek() {
                        Some('[') => {}
                        Some('*') => {
                            self.pos += 1;
                            steps.push(Step::Wildcard);
                        }
                        _ => {
                            let name = self.read_name();
                            if name.is_empty() {
                                return Err("expected field name after '..'".to_string());
                            }
                            steps.push(Step::Field(name));
                        }
                    }
                }
                Some('.') => {
                    self.pos += 1;
                    match self.peek() {
                        Some('*') => {
                            self.pos += 1;
                            steps.push(Step::Wildcard);
                        }
                        Some('[') => {}
                        _ => {
                            let name = self.read_name();
                            // A lone "." refers to the current value
                            if !name.is_empty() {
                                steps.push(Step::Field(name));
                            }
                        }
                    }
                }
                Some('[') => steps.push(self.parse_bracket()?),
                _ => return Ok(steps),
            }
        }
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                if let Some(escaped) = self.peek_at(1) {
                    name.push(escaped);
                    self.pos += 2;
                    continue;
                }
            }
            if NAME_TERMINATORS.contains(&c) {
                break;
            }
            name.push(c);
            self.pos += 1;
        }
        name
    }

    fn parse_bracket(&mut self) -> Result<Step, String> {
        self.pos += 1;
        self.skip_whitespace();

        let step = match self.peek() {
            Some('*') => {
                self.pos += 1;
                Step::Wildcard
            }
            Some('?') => {
                self.pos += 1;
                self.expect('(')?;
                let filter = self.parse_filter()?;
                self.expect(')')?;
                Step::Filter(filter)
            }
            Some('\'' | '"') => {
                let mut names = vec![self.read_quoted()?];
                loop {
                    self.skip_whitespace();
                    if self.peek() != Some(',') {
                        break;
                    }
                    self.pos += 1;
                    self.skip_whitespace();
                    names.push(self.read_quoted()?);
                }
                if names.len() == 1 {
                    Step::Field(names.remove(0))
                } else {
                    Step::Fields(names)
                }
            }
            _ => self.parse_indexes()?,
        };

        self.expect(']')?;
        Ok(step)
    }

    fn read_quoted(&mut self) -> Result<String, String> {
        let Some(quote) = self.peek().filter(|c| *c == '\'' || *c == '"') else {
            return Err("expected quoted string".to_string());
        };
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err("unterminated string".to_string()),
                Some('\\') if self.peek_at(1).is_some() => {
                    if let Some(escaped) = self.peek_at(1) {
                        value.push(escaped);
                    }
                    self.pos += 2;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    /// `[0]`, `[0,2]`, `[1:]`, `[::2]`
    fn parse_indexes(&mut self) -> Result<Step, String> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c != ']') {
            self.pos += 1;
        }
        let content: String = self.chars[start..self.pos].iter().collect();
        let content = content.trim();
        if content.is_empty() {
            return Err("empty brackets".to_string());
        }

        if content.contains(':') {
            let parts: Vec<&str> = content.split(':').collect();
            if parts.len() > 3 {
                return Err(format!("invalid slice '{content}'"));
            }
            let bound = |i: usize| -> Result<Option<i64>, String> {
                match parts.get(i).map(|p| p.trim()) {
                    None | Some("") => Ok(None),
                    Some(p) => p
                        .parse()
                        .map(Some)
                        .map_err(|_| format!("invalid slice bound '{p}'")),
                }
            };
            return Ok(Step::Slice {
                start: bound(0)?,
                end: bound(1)?,
                step: bound(2)?,
            });
        }

        content
            .split(',')
            .map(|p| {
                let p = p.trim();
                p.parse::<i64>().map_err(|_| format!("invalid array index '{p}'"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Step::Index)
    }

    fn parse_filter(&mut self) -> Result<Filter, String> {
        self.skip_whitespace();
        if self.peek() != Some('@') {
            return Err("filter must start with '@'".to_string());
        }
        self.pos += 1;
        let path = self.parse_steps(false)?;
        self.skip_whitespace();

        let op = match (self.peek(), self.peek_at(1)) {
            (Some('='), Some('=')) => Some((CompareOp::Eq, 2)),
            (Some('!'), Some('=')) => Some((CompareOp::Ne, 2)),
            (Some('<'), Some('=')) => Some((CompareOp::Le, 2)),
            (Some('>'), Some('=')) => Some((CompareOp::Ge, 2)),
            (Some('<'), _) => Some((CompareOp::Lt, 1)),
            (Some('>'), _) => Some((CompareOp::Gt, 1)),
            _ => None,
        };

        let comparison = match op {
            Some((op, width)) => {
                self.pos += width;
                self.skip_whitespace();
                Some((op, self.parse_literal()?))
            }
            None => None,
        };
        Ok(Filter { path, comparison })
    }

    fn parse_literal(&mut self) -> Result<Value, String> {
        if matches!(self.peek(), Some('\'' | '"')) {
            return self.read_quoted().map(Value::String);
        }
        let start = self.pos;
        while self.peek().is_some_and(|c| c != ')' && !c.is_whitespace()) {
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        match raw.as_str() {
            "" => Err("expected literal".to_string()),
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "null" => Ok(Value::Null),
            number => serde_json::from_str::<serde_json::Number>(number)
                .map(Value::Number)
                .map_err(|_| format!("invalid literal '{number}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(expr: &str) -> Vec<Step> {
        parse_expression(expr).unwrap()
    }

    #[test]
    fn test_text_and_actions() {
        let segments = parse_template("a{.b}c").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Text("a".to_string()),
                Segment::Expr(vec![Step::Field("b".to_string())]),
                Segment::Text("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_unclosed_action() {
        assert_eq!(parse_template("a{.b").unwrap_err(), "unclosed action");
    }

    #[test]
    fn test_brace_inside_quotes() {
        assert_eq!(
            steps("['a}b']"),
            vec![Step::Field("a}b".to_string())]
        );
        assert!(parse_template("{.data['a}b']}").is_ok());
    }

    #[test]
    fn test_root_and_bare_names() {
        assert_eq!(steps("$.a"), vec![Step::Field("a".to_string())]);
        assert_eq!(
            steps("first.data"),
            vec![Step::Field("first".to_string()), Step::Field("data".to_string())]
        );
        assert_eq!(steps("."), Vec::new());
    }

    #[test]
    fn test_brackets() {
        assert_eq!(steps("[*]"), vec![Step::Wildcard]);
        assert_eq!(steps(".*"), vec![Step::Wildcard]);
        assert_eq!(steps("[0, -1]"), vec![Step::Index(vec![0, -1])]);
        assert_eq!(
            steps("['a','b']"),
            vec![Step::Fields(vec!["a".to_string(), "b".to_string()])]
        );
        assert_eq!(
            steps("[1:]"),
            vec![Step::Slice {
                start: Some(1),
                end: None,
                step: None
            }]
        );
    }

    #[test]
    fn test_recursive() {
        assert_eq!(
            steps("..name"),
            vec![Step::Recursive, Step::Field("name".to_string())]
        );
    }

    #[test]
    fn test_filters() {
        assert_eq!(
            steps("[?(@.port >= 443)]"),
            vec![Step::Filter(Filter {
                path: vec![Step::Field("port".to_string())],
                comparison: Some((CompareOp::Ge, serde_json::json!(443))),
            })]
        );
        assert_eq!(
            steps("[?(@.tls)]"),
            vec![Step::Filter(Filter {
                path: vec![Step::Field("tls".to_string())],
                comparison: None,
            })]
        );
    }

    #[test]
    fn test_malformed_expressions() {
        assert!(parse_expression("[").is_err());
        assert!(parse_expression("[abc]").is_err());
        assert!(parse_expression("[?(.a)]").is_err());
        assert!(parse_expression(".a b").is_err());
        assert!(parse_expression("['a").is_err());
    }
}

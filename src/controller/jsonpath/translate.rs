//! Translation of `$( expr )` template syntax into canonical `{ expr }` syntax.
//!
//! Expressions may themselves contain parentheses, e.g. filters like
//! `?(@.protocol=='TCP')`, so a `)` only closes a template when every
//! parenthesis opened inside it has been closed. Quoted text inside a
//! template is skipped. Unmatched `$(` and `)` stay literal.

#[derive(Debug, Clone, Copy)]
enum Open {
    /// `$(` starting a template, at this byte offset of the output
    Template(usize),
    /// Any other `(` inside a template, including nested `$(`
    Paren,
}

/// Rewrite matched top-level `$(`…`)` pairs to `{`…`}`
#[must_use]
pub fn to_canonical(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut stack: Vec<Open> = Vec::new();
    let mut quote: Option<char> = None;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if stack.is_empty() {
            if c == '$' && chars.peek() == Some(&'(') {
                chars.next();
                stack.push(Open::Template(out.len()));
                out.push_str("$(");
            } else {
                out.push(c);
            }
            continue;
        }

        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            out.push(c);
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            '$' if chars.peek() == Some(&'(') => {
                chars.next();
                stack.push(Open::Paren);
                out.push_str("$(");
            }
            '(' => {
                stack.push(Open::Paren);
                out.push(c);
            }
            ')' => match stack.pop() {
                Some(Open::Template(start)) => {
                    out.replace_range(start..start + 2, "{");
                    out.push('}');
                }
                Some(Open::Paren) | None => out.push(c),
            },
            _ => out.push(c),
        }
    }

    // An unclosed template leaves its `$(` in place
    out
}

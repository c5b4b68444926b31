//! Minimal template engine for text leaves.
//!
//! The engine supports exactly what the code-node layer needs: literal text
//! and `${name}` substitution, with values looked up through the node's
//! binding chain. Control flow never appears in templates; it lives in the
//! C++ syntax composites. `$$` escapes a literal dollar sign.

/// One segment of a compiled template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplatePart {
    Text(String),
    Var(String),
}

/// A template string compiled once at node-construction time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    source: String,
    parts: Vec<TemplatePart>,
}

impl Template {
    pub fn compile(source: &str) -> Self {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut chars = source.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '$' {
                text.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    text.push('$');
                }
                Some('{') => {
                    chars.next();
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    let mut name = String::new();
                    for c in chars.by_ref() {
                        if c == '}' {
                            break;
                        }
                        name.push(c);
                    }
                    parts.push(TemplatePart::Var(name));
                }
                _ => text.push('$'),
            }
        }
        if !text.is_empty() {
            parts.push(TemplatePart::Text(text));
        }
        Self { source: source.to_string(), parts }
    }

    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of all variables the template substitutes, in order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            TemplatePart::Var(name) => Some(name.as_str()),
            TemplatePart::Text(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_one_part() {
        let t = Template::compile("return nullptr;");
        assert_eq!(t.parts(), &[TemplatePart::Text("return nullptr;".to_string())]);
    }

    #[test]
    fn vars_split_text() {
        let t = Template::compile("${class_name}* ${var} = nullptr;");
        let names: Vec<&str> = t.variable_names().collect();
        assert_eq!(names, ["class_name", "var"]);
    }

    #[test]
    fn dollar_escape() {
        let t = Template::compile("cost: $$${amount}");
        assert_eq!(
            t.parts(),
            &[
                TemplatePart::Text("cost: $".to_string()),
                TemplatePart::Var("amount".to_string()),
            ]
        );
    }
}

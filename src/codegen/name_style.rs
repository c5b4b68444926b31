//! Naming conventions for generated C++.
//!
//! All converters are idempotent: feeding a converter its own output returns
//! the same string. Tokenization splits on `_`, `-`, case boundaries and
//! digit-to-letter boundaries, keeping acronym runs (`URL`, `HTML`) and
//! letter-then-digit runs (`V8`, `HTML5`) together.

/// Split an identifier into lowercase word tokens.
fn tokenize(name: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c == ' ' {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        if !current.is_empty() {
            let prev = chars[i - 1];
            let boundary = (c.is_uppercase() && prev.is_lowercase())
                || (c.is_uppercase()
                    && prev.is_uppercase()
                    && chars.get(i + 1).is_some_and(|n| n.is_lowercase()))
                || (c.is_alphabetic() && prev.is_ascii_digit());
            if boundary {
                tokens.push(std::mem::take(&mut current));
            }
        }
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

pub fn snake_case(name: &str) -> String {
    tokenize(name).join("_")
}

pub fn upper_camel_case(name: &str) -> String {
    tokenize(name).iter().map(|t| capitalize(t)).collect()
}

pub fn lower_camel_case(name: &str) -> String {
    let tokens = tokenize(name);
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i == 0 {
            out.push_str(token);
        } else {
            out.push_str(&capitalize(token));
        }
    }
    out
}

pub fn macro_case(name: &str) -> String {
    tokenize(name).join("_").to_ascii_uppercase()
}

/// Name of a native API function (`nodeValue` => `nodeValue`; the engine's
/// web-facing API keeps lowerCamelCase).
pub fn api_func(name: &str) -> String {
    lower_camel_case(name)
}

/// Generated C++ function name (`UpperCamelCase`).
pub fn func(name: &str) -> String {
    upper_camel_case(name)
}

/// Constant name: `kFoo`. Already-prefixed names pass through.
pub fn constant(name: &str) -> String {
    if name.len() > 1
        && name.starts_with('k')
        && name[1..2].chars().all(|c| c.is_ascii_uppercase())
    {
        return name.to_string();
    }
    format!("k{}", upper_camel_case(name))
}

/// Member variable name: `foo_`.
pub fn member_var(name: &str) -> String {
    let snake = snake_case(name);
    if snake.ends_with('_') {
        snake
    } else {
        format!("{snake}_")
    }
}

/// Argument / local variable name: `foo`.
pub fn arg(name: &str) -> String {
    snake_case(name)
}

/// Class name: `Foo`.
pub fn class_name(name: &str) -> String {
    upper_camel_case(name)
}

/// File base name: `foo_bar`.
pub fn file(name: &str) -> String {
    snake_case(name)
}

/// Header guard from a path: `third_party/x/v8_node.h` =>
/// `THIRD_PARTY_X_V8_NODE_H_`.
pub fn header_guard(path: &str) -> String {
    let mut guard: String = path
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if !guard.ends_with('_') {
        guard.push('_');
    }
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_conversions() {
        assert_eq!(snake_case("contentDocument"), "content_document");
        assert_eq!(snake_case("HTMLElement"), "html_element");
        assert_eq!(snake_case("DedicatedWorker"), "dedicated_worker");
        // Digits stay glued to the letters before them.
        assert_eq!(snake_case("V8UnionNodeOrString"), "v8_union_node_or_string");
        assert_eq!(snake_case("HTML5Element"), "html5_element");
    }

    #[test]
    fn converters_are_idempotent() {
        for input in ["contentDocument", "HTMLElement", "node_value", "A2B", "v8_union"] {
            assert_eq!(snake_case(&snake_case(input)), snake_case(input));
            assert_eq!(
                upper_camel_case(&upper_camel_case(input)),
                upper_camel_case(input)
            );
            assert_eq!(
                lower_camel_case(&lower_camel_case(input)),
                lower_camel_case(input)
            );
            assert_eq!(macro_case(&macro_case(input)), macro_case(input));
        }
    }

    #[test]
    fn domain_variants() {
        assert_eq!(constant("MAX_VALUE"), "kMaxValue");
        assert_eq!(constant("kMaxValue"), "kMaxValue");
        assert_eq!(member_var("nodeValue"), "node_value_");
        assert_eq!(class_name("htmlElement"), "HtmlElement");
        assert_eq!(func("createElement"), "CreateElement");
    }

    #[test]
    fn header_guard_from_path() {
        assert_eq!(
            header_guard("gen/core/v8_node.h"),
            "GEN_CORE_V8_NODE_H_"
        );
    }
}

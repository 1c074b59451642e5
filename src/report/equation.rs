//! Equation rendering.
//!
//! Templates are written over the symbols `a..f` (for example
//! `y = a*e^(b*x) + c`). Rendering happens in two steps:
//!
//! 1. substitute the fitted values (4 decimals) for the first `k` symbols,
//!    matching whole one-letter tokens only, so `e` in `e^(...)` stays the
//!    constant when the model has fewer than five parameters
//! 2. translate the plain text to LaTeX: `*` → `\cdot`, exponents grouped
//!    with braces, and `ln`/`sin`/`cos` as operators

const SYMBOLS: [char; 6] = ['a', 'b', 'c', 'd', 'e', 'f'];
const OPERATORS: [&str; 3] = ["ln", "sin", "cos"];

/// Substitute fitted values into `template`.
pub fn substitute(template: &str, params: &[f64]) -> String {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len() + 8 * params.len());
    let mut i = 0;

    while i < chars.len() {
        if !is_word_char(chars[i]) || chars[i].is_ascii_digit() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && is_word_char(chars[i]) {
            i += 1;
        }
        let word = &chars[start..i];
        match symbol_index(word) {
            Some(idx) if idx < params.len() => out.push_str(&format!("{:.4}", params[idx])),
            _ => out.extend(word.iter()),
        }
    }

    out.replace("+ -", "- ")
}

/// Translate a plain-text equation to LaTeX.
pub fn to_latex(equation: &str) -> String {
    let chars: Vec<char> = equation.chars().collect();
    let mut out = String::with_capacity(equation.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' => {
                out.push_str("\\cdot ");
                i += 1;
            }
            '^' => {
                i += 1;
                let exponent = if chars.get(i) == Some(&'(') {
                    let (inner, next) = group(&chars, i);
                    i = next;
                    to_latex(&inner)
                } else {
                    let start = i;
                    if chars.get(i) == Some(&'-') {
                        i += 1;
                    }
                    while i < chars.len() && (is_word_char(chars[i]) || chars[i] == '.') {
                        i += 1;
                    }
                    chars[start..i].iter().collect()
                };
                out.push_str("^{");
                out.push_str(&exponent);
                out.push('}');
            }
            '\\' => {
                // Already LaTeX: copy the command name verbatim.
                out.push(c);
                i += 1;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if OPERATORS.contains(&word.as_str()) {
                    out.push('\\');
                }
                out.push_str(&word);
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn symbol_index(word: &[char]) -> Option<usize> {
    match word {
        [c] => SYMBOLS.iter().position(|s| s == c),
        _ => None,
    }
}

/// Contents of the parenthesised group opening at `open`, and the index after
/// its closing parenthesis. An unbalanced group runs to the end of input.
fn group(chars: &[char], open: usize) -> (String, usize) {
    let mut depth = 0usize;
    for (j, &c) in chars.iter().enumerate().skip(open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return (chars[open + 1..j].iter().collect(), j + 1);
                }
            }
            _ => {}
        }
    }
    (chars[open + 1..].iter().collect(), chars.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_whole_symbols_only() {
        let eq = substitute("y = a*e^(b*x) + c", &[2.0, 0.3, 1.0]);
        assert_eq!(eq, "y = 2.0000*e^(0.3000*x) + 1.0000");
    }

    #[test]
    fn folds_negative_terms() {
        assert_eq!(substitute("y = a*x + b", &[9.8, -0.25]), "y = 9.8000*x - 0.2500");
    }

    #[test]
    fn leaves_unfitted_symbols_alone() {
        assert_eq!(substitute("y = a*x + b + d", &[1.0, 2.0]), "y = 1.0000*x + 2.0000 + d");
    }

    #[test]
    fn latex_for_each_builtin_form() {
        assert_eq!(to_latex("y = 2.0000*x + 3.0000"), "y = 2.0000\\cdot x + 3.0000");
        assert_eq!(
            to_latex("y = 1.0000*x^2 + 2.0000*x + 3.0000"),
            "y = 1.0000\\cdot x^{2} + 2.0000\\cdot x + 3.0000"
        );
        assert_eq!(
            to_latex("y = 2.0000*e^(0.3000*x) + 1.0000"),
            "y = 2.0000\\cdot e^{0.3000\\cdot x} + 1.0000"
        );
        assert_eq!(to_latex("y = 4.0000*x^-0.5000 + 0.0000"), "y = 4.0000\\cdot x^{-0.5000} + 0.0000");
        assert_eq!(to_latex("y = 1.5000*ln(x) + 2.0000"), "y = 1.5000\\cdot \\ln(x) + 2.0000");
        assert_eq!(
            to_latex("y = 1.0000*sin(2.0000*x + 0.5000) + 3.0000"),
            "y = 1.0000\\cdot \\sin(2.0000\\cdot x + 0.5000) + 3.0000"
        );
    }

    #[test]
    fn latex_keeps_existing_commands() {
        assert_eq!(to_latex("y = \\sin(x)"), "y = \\sin(x)");
        assert_eq!(to_latex("y = cos(x)"), "y = \\cos(x)");
    }
}

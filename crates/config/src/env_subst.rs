//! `${VAR}` / `${VAR:-fallback}` expansion applied to raw config text before
//! parsing, so tokens and hosts can come from the environment.

/// Expand placeholders from the process environment.
///
/// Unset variables without a fallback stay in the text verbatim.
pub fn substitute_env(input: &str) -> String {
    expand(input, |name| std::env::var(name).ok())
}

/// Expand placeholders using `lookup`.
pub(crate) fn expand(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: keep the remainder as is.
            out.push_str(&rest[start..]);
            return out;
        };

        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };

        match lookup(name).filter(|v| !v.is_empty() || fallback.is_none()) {
            Some(value) if !name.is_empty() => out.push_str(&value),
            _ => match fallback {
                Some(fallback) if !name.is_empty() => out.push_str(fallback),
                _ => {
                    out.push_str("${");
                    out.push_str(body);
                    out.push('}');
                },
            },
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn lookup(name: &str) -> Option<String> {
        match name {
            "ONEBRIDGE_TOKEN" => Some("s3cret".into()),
            "ONEBRIDGE_EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[rstest]
    #[case("token = \"${ONEBRIDGE_TOKEN}\"", "token = \"s3cret\"")]
    #[case("${ONEBRIDGE_MISSING}", "${ONEBRIDGE_MISSING}")]
    #[case("${ONEBRIDGE_MISSING:-localhost}", "localhost")]
    #[case("${ONEBRIDGE_EMPTY:-fallback}", "fallback")]
    #[case("${ONEBRIDGE_EMPTY}", "")]
    #[case("a ${ONEBRIDGE_TOKEN} b ${ONEBRIDGE_TOKEN}", "a s3cret b s3cret")]
    #[case("${}", "${}")]
    #[case("tail ${ONEBRIDGE_TOKEN", "tail ${ONEBRIDGE_TOKEN")]
    #[case("plain text", "plain text")]
    fn expands(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(expand(input, lookup), expected);
    }
}

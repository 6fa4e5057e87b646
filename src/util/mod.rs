#![allow(clippy::module_name_repetitions)]
//! Small utilities: shell escaping for previews, option splitting, ids, filesystem helpers.

pub mod exec;
pub mod fs;
pub mod id;

pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_escape(a))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        "''".to_string()
    } else if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_=./:@".contains(c))
    {
        s.to_string()
    } else {
        let escaped = s.replace('\'', "'\"'\"'");
        format!("'{}'", escaped)
    }
}

/// Split a user-supplied options string (`--buildah-options "--format=docker --layers"`)
/// into individual arguments. Single and double quotes group words; no other expansion.
pub fn split_options(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;
    for ch in s.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => cur.push(ch),
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    in_word = true;
                }
                c if c.is_whitespace() => {
                    if in_word {
                        out.push(std::mem::take(&mut cur));
                        in_word = false;
                    }
                }
                c => {
                    cur.push(c);
                    in_word = true;
                }
            },
        }
    }
    if in_word {
        out.push(cur);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_escape() {
        assert_eq!(shell_escape("abc-123_./:@"), "abc-123_./:@");
        assert_eq!(shell_escape("a b"), "'a b'");
        assert_eq!(shell_escape(""), "''");
        assert_eq!(shell_escape("O'Reilly"), "'O'\"'\"'Reilly'");
    }

    #[test]
    fn test_shell_join() {
        let args = vec!["bud".to_string(), "-t".to_string(), "a b".to_string()];
        assert_eq!(shell_join(&args), "bud -t 'a b'");
    }

    #[test]
    fn test_split_options() {
        assert_eq!(split_options("--format=docker"), vec!["--format=docker"]);
        assert_eq!(
            split_options("  --format=docker   --layers "),
            vec!["--format=docker", "--layers"]
        );
        assert_eq!(
            split_options("--label 'a b' --build-arg=\"X=1 2\""),
            vec!["--label", "a b", "--build-arg=X=1 2"]
        );
        assert!(split_options("   ").is_empty());
        assert_eq!(split_options("''"), vec![""]);
    }
}

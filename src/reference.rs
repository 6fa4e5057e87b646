//! Client-side validation of image references, following the Docker reference grammar:
//!
//! ```text
//! reference := name [ ":" tag ] [ "@" digest ]
//! name      := [domain '/'] path-component ['/' path-component]*
//! ```
//!
//! Error texts match the Docker CLI so callers see the same message whether the reference was
//! rejected here or by the daemon.

use std::fmt;

const NAME_TOTAL_LENGTH_MAX: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceError {
    InvalidFormat,
    NameContainsUppercase,
    NameEmpty,
    NameTooLong,
    InvalidTag,
    InvalidDigest,
}

impl fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ReferenceError::InvalidFormat => "invalid reference format",
            ReferenceError::NameContainsUppercase => {
                "invalid reference format: repository name must be lowercase"
            }
            ReferenceError::NameEmpty => {
                "invalid reference format: repository name must have at least one component"
            }
            ReferenceError::NameTooLong => {
                "invalid reference format: repository name must not be more than 255 characters"
            }
            ReferenceError::InvalidTag => "invalid reference format: invalid tag",
            ReferenceError::InvalidDigest => "invalid reference format: invalid digest",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ReferenceError {}

/// Parsed pieces of a valid reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference<'a> {
    pub domain: Option<&'a str>,
    pub path: &'a str,
    pub tag: Option<&'a str>,
    pub digest: Option<&'a str>,
}

pub fn parse_reference(s: &str) -> Result<Reference<'_>, ReferenceError> {
    if s.is_empty() {
        return Err(ReferenceError::NameEmpty);
    }
    let (rest, digest) = match s.split_once('@') {
        Some((n, d)) => {
            if !is_valid_digest(d) {
                return Err(ReferenceError::InvalidDigest);
            }
            (n, Some(d))
        }
        None => (s, None),
    };

    let (name, tag) = match rest.rfind(':') {
        Some(i) if !rest[i + 1..].contains('/') => (&rest[..i], Some(&rest[i + 1..])),
        _ => (rest, None),
    };
    if let Some(t) = tag {
        if !is_valid_tag(t) {
            return Err(ReferenceError::InvalidTag);
        }
    }
    if name.is_empty() {
        return Err(ReferenceError::NameEmpty);
    }
    if name.len() > NAME_TOTAL_LENGTH_MAX {
        return Err(ReferenceError::NameTooLong);
    }

    let (domain, path) = split_domain(name);
    if let Some(d) = domain {
        if !is_valid_domain(d) {
            return Err(ReferenceError::InvalidFormat);
        }
    }
    if path.is_empty() {
        return Err(ReferenceError::NameEmpty);
    }
    if !path.split('/').all(is_valid_path_component) {
        let lowered = path.to_ascii_lowercase();
        if lowered != path && lowered.split('/').all(is_valid_path_component) {
            return Err(ReferenceError::NameContainsUppercase);
        }
        return Err(ReferenceError::InvalidFormat);
    }

    Ok(Reference {
        domain,
        path,
        tag,
        digest,
    })
}

pub fn validate_reference(s: &str) -> Result<(), ReferenceError> {
    parse_reference(s).map(|_| ())
}

fn split_domain(name: &str) -> (Option<&str>, &str) {
    match name.split_once('/') {
        Some((first, rest))
            if first.contains('.')
                || first.contains(':')
                || first == "localhost"
                || first.chars().any(|c| c.is_ascii_uppercase()) =>
        {
            (Some(first), rest)
        }
        _ => (None, name),
    }
}

fn is_valid_domain(d: &str) -> bool {
    let (host, port) = match d.rsplit_once(':') {
        Some((h, p)) => (h, Some(p)),
        None => (d, None),
    };
    if let Some(p) = port {
        if p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
    }
    !host.is_empty()
        && host.split('.').all(|label| {
            let b = label.as_bytes();
            !b.is_empty()
                && b[0].is_ascii_alphanumeric()
                && b[b.len() - 1].is_ascii_alphanumeric()
                && b.iter().all(|c| c.is_ascii_alphanumeric() || *c == b'-')
        })
}

/// alpha-numeric (separator alpha-numeric)*, separator := `.` | `_` | `__` | `-`+
pub fn is_valid_path_component(c: &str) -> bool {
    let b = c.as_bytes();
    let is_alnum = |x: u8| x.is_ascii_lowercase() || x.is_ascii_digit();
    if b.is_empty() || !is_alnum(b[0]) || !is_alnum(b[b.len() - 1]) {
        return false;
    }
    let mut i = 0;
    while i < b.len() {
        if is_alnum(b[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < b.len() && !is_alnum(b[i]) {
            i += 1;
        }
        let sep = &c[start..i];
        let ok = sep == "." || sep == "_" || sep == "__" || sep.bytes().all(|x| x == b'-');
        if !ok {
            return false;
        }
    }
    true
}

fn is_valid_tag(t: &str) -> bool {
    let b = t.as_bytes();
    !b.is_empty()
        && b.len() <= 128
        && (b[0].is_ascii_alphanumeric() || b[0] == b'_')
        && b
            .iter()
            .all(|c| c.is_ascii_alphanumeric() || *c == b'_' || *c == b'.' || *c == b'-')
}

fn is_valid_digest(d: &str) -> bool {
    match d.split_once(':') {
        Some((alg, hex)) => {
            !alg.is_empty()
                && alg
                    .split(['+', '.', '_', '-'])
                    .all(|p| !p.is_empty() && p.bytes().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()))
                && hex.len() >= 32
                && hex.bytes().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

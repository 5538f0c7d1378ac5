//! File selection and host naming.
//!
//! VMS names look like `[USER.SRC]MAIN.C;3` (or `<USER.SRC>MAIN.C;3`).
//! Two things are derived from them:
//!
//! * the **selection key** the user's patterns are matched against: the
//!   name without its directory (unless directories are kept) and without
//!   its version (unless versions are kept);
//! * the **host path** the file is extracted to: lower-cased, directories
//!   as nested folders when kept, version as a `:N` suffix when kept.
//!
//! Patterns use `*`, `?` and `[...]` and match case-insensitively.

use regex::Regex;
use std::path::PathBuf;

/// Name translation switches (`-d` and `-c`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NameOptions {
    pub keep_directories: bool,
    pub keep_version:     bool,
}

/// A VMS file specification split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmsName<'a> {
    pub directories: Vec<&'a str>,
    /// `NAME.EXT`
    pub file:        &'a str,
    pub version:     Option<&'a str>,
}

impl<'a> VmsName<'a> {
    pub fn parse(spec: &'a str) -> Self {
        let (dirs, rest) = match spec.chars().next() {
            Some(open @ ('[' | '<')) => {
                let close = if open == '[' { ']' } else { '>' };
                match spec.find(close) {
                    Some(end) => (&spec[1..end], &spec[end + 1..]),
                    None => ("", spec),
                }
            }
            _ => ("", spec),
        };
        let directories = dirs.split('.').filter(|d| !d.is_empty()).collect();
        let (file, version) = match rest.split_once(';') {
            Some((f, v)) => (f, Some(v)),
            None => (rest, None),
        };
        Self { directories, file, version }
    }

    /// Relative host path, or `None` if nothing usable is left of the name.
    pub fn host_path(&self, opts: NameOptions) -> Option<PathBuf> {
        let mut file = self.file.to_lowercase();
        if opts.keep_version {
            if let Some(v) = self.version {
                file.push(':');
                file.push_str(v);
            }
        }
        let file = component(&file)?;

        let mut path = PathBuf::new();
        if opts.keep_directories {
            for d in &self.directories {
                if let Some(d) = component(&d.to_lowercase()) {
                    path.push(d);
                }
            }
        }
        path.push(file);
        Some(path)
    }
}

/// One path component with separators neutralized; `.`/`..`/empty dropped.
fn component(s: &str) -> Option<String> {
    match s {
        "" | "." | ".." => None,
        _ => Some(s.replace(['/', '\\'], "_")),
    }
}

/// The string patterns are matched against.
pub fn selection_key(spec: &str, opts: NameOptions) -> &str {
    let name = if opts.keep_directories {
        spec
    } else {
        spec.rfind([']', '>']).map_or(spec, |i| &spec[i + 1..])
    };
    if opts.keep_version {
        name
    } else {
        name.split(';').next().unwrap_or(name)
    }
}

// ── Selection ────────────────────────────────────────────────────────────────

/// Ordered list of wildcard patterns; empty selects everything.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    patterns: Vec<Regex>,
}

impl Selection {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&glob_to_regex(p.as_ref())))
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, key: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|re| re.is_match(key))
    }
}

fn glob_to_regex(pat: &str) -> String {
    let mut re = String::from("(?i)^");
    let mut chars = pat.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                if let Some(&neg) = chars.peek() {
                    if neg == '!' || neg == '^' {
                        chars.next();
                        class.push('^');
                    }
                }
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    if c == '\\' || c == '[' {
                        class.push('\\');
                    }
                    class.push(c);
                }
                if closed && !class.is_empty() && class != "^" {
                    re.push('[');
                    re.push_str(&class);
                    re.push(']');
                } else {
                    // Unterminated class: match the text literally.
                    re.push_str(&regex::escape("["));
                    re.push_str(&regex::escape(class.trim_start_matches('^')));
                    if closed {
                        re.push_str(&regex::escape("]"));
                    }
                }
            }
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }
    re.push('$');
    re
}

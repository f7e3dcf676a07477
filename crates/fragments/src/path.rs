//! `~` and `$VAR` expansion for pack paths given on the command line or in
//! the configuration file.

use std::env;
use std::path::PathBuf;

use directories_next::BaseDirs;
use tracing::debug;

use crate::pack::PackError;

/// Expands `$NAME`, `${NAME}` and a leading `~` or `~/`. A backslash
/// escapes the next character.
pub fn expand_path(input: &str) -> Result<PathBuf, PackError> {
    let with_vars = expand_vars(input)?;
    let expanded = expand_home(&with_vars)?;
    if expanded != PathBuf::from(input) {
        debug!(original = %input, expanded = %expanded.display(), "expanded pack path");
    }
    Ok(expanded)
}

fn expand_home(input: &str) -> Result<PathBuf, PackError> {
    let rest = match input.strip_prefix('~') {
        None => return Ok(PathBuf::from(input)),
        Some(rest) => rest,
    };
    if !(rest.is_empty() || rest.starts_with('/')) {
        return Err(PackError::Path(format!(
            "'{input}': only the current user's home can be expanded"
        )));
    }
    let dirs = BaseDirs::new()
        .ok_or_else(|| PackError::Path("home directory is unknown".to_string()))?;
    Ok(dirs.home_dir().join(rest.trim_start_matches('/')))
}

fn expand_vars(input: &str) -> Result<String, PackError> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push(chars.next().unwrap_or('\\')),
            '$' if chars.peek() == Some(&'{') => {
                chars.next();
                let name: String = chars.by_ref().take_while(|c| *c != '}').collect();
                if name.is_empty() {
                    return Err(PackError::Path(format!("'{input}': empty variable name")));
                }
                out.push_str(&lookup(&name)?);
            }
            '$' if chars.peek().is_some_and(|c| is_name_char(*c)) => {
                let mut name = String::new();
                while let Some(c) = chars.next_if(|c| is_name_char(*c)) {
                    name.push(c);
                }
                out.push_str(&lookup(&name)?);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn lookup(name: &str) -> Result<String, PackError> {
    env::var(name).map_err(|_| PackError::Path(format!("environment variable '{name}' is not set")))
}

fn is_name_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_variables_in_both_forms() {
        env::set_var("HYPERFIELD_PATH_TEST", "packs");
        assert_eq!(
            expand_path("/srv/$HYPERFIELD_PATH_TEST/${HYPERFIELD_PATH_TEST}").expect("expand"),
            PathBuf::from("/srv/packs/packs")
        );
        env::remove_var("HYPERFIELD_PATH_TEST");
    }

    #[test]
    fn unset_variable_is_an_error() {
        let err = expand_path("/srv/$HYPERFIELD_UNSET_FOR_TEST").unwrap_err();
        assert!(err.to_string().contains("HYPERFIELD_UNSET_FOR_TEST"));
    }

    #[test]
    fn escaped_dollar_and_plain_paths_pass_through() {
        assert_eq!(expand_path(r"/a/\$b").expect("expand"), PathBuf::from("/a/$b"));
        assert_eq!(expand_path("rel/dir").expect("expand"), PathBuf::from("rel/dir"));
    }

    #[test]
    fn expands_home_prefix() {
        let Some(dirs) = BaseDirs::new() else {
            return;
        };
        assert_eq!(
            expand_path("~/packs").expect("expand"),
            dirs.home_dir().join("packs")
        );
        assert!(expand_path("~other/packs").is_err());
    }
}

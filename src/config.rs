use std::env;

use chrono::Duration;
use log::warn;

use crate::error::Error;
use crate::filter::parsing::{parse_older_than, parse_pattern_set, PatternSet};
use crate::package::OwnerKind;

/// How the target package(s) were specified.
#[derive(Debug, Clone)]
pub enum PackageSpec {
    Single(String),
    List(Vec<String>),
    Pattern(PatternSet),
}

/// The fully resolved configuration surface the engine consumes, parsed
/// once at startup from the host's environment - on GitHub Actions this
/// is `INPUT_*`, the idiomatic way a composite action exposes its
/// declared inputs to the running process.
#[derive(Debug, Clone)]
pub struct Config {
    /// The GitHub account/organisation name, used both to build the
    /// `ghcr.io/{owner}/{package}` registry path and, combined with
    /// `owner`, to select the packages API endpoint family.
    pub owner_name: String,
    pub owner: OwnerKind,
    pub packages: PackageSpec,
    pub expand_packages: bool,
    pub token: String,
    pub delete_tags: Option<PatternSet>,
    pub exclude_tags: Option<PatternSet>,
    pub delete_untagged: bool,
    pub delete_ghost_images: bool,
    pub delete_partial_images: bool,
    pub delete_orphaned_images: bool,
    pub keep_n_tagged: Option<usize>,
    pub keep_n_untagged: Option<usize>,
    pub older_than: Option<Duration>,
    pub dry_run: bool,
    pub validate: bool,
    pub fail_on_warnings: bool,
}

impl Config {
    /// Parse every `INPUT_*` variable this engine consumes, validate it,
    /// and apply the Stage F defaulting rule. Fails fast before any I/O.
    pub fn from_env() -> Result<Self, Error> {
        let token = require_env("INPUT_TOKEN")?;
        let owner_name = require_env("INPUT_OWNER")?;
        let owner = parse_owner(owner_name.clone())?;
        let packages = parse_packages()?;
        let expand_packages = env_flag("INPUT_EXPAND_PACKAGES");

        let use_regex = env_flag("INPUT_USE_REGEX");
        let delete_tags = env_opt("INPUT_DELETE_TAGS").and_then(|raw| parse_pattern_set(&raw, use_regex));
        let exclude_tags = env_opt("INPUT_EXCLUDE_TAGS").and_then(|raw| parse_pattern_set(&raw, use_regex));

        let delete_ghost_images = env_flag("INPUT_DELETE_GHOST_IMAGES");
        let delete_partial_images = env_flag("INPUT_DELETE_PARTIAL_IMAGES");
        let delete_orphaned_images = env_flag("INPUT_DELETE_ORPHANED_IMAGES");
        let keep_n_tagged = env_opt("INPUT_KEEP_N_TAGGED")
            .map(|raw| parse_non_negative(&raw, "INPUT_KEEP_N_TAGGED"))
            .transpose()?;
        let keep_n_untagged = env_opt("INPUT_KEEP_N_UNTAGGED")
            .map(|raw| parse_non_negative(&raw, "INPUT_KEEP_N_UNTAGGED"))
            .transpose()?;
        let delete_untagged_flag = env_opt("INPUT_DELETE_UNTAGGED").map(|raw| parse_bool_strict(&raw));

        let older_than = match env_opt("INPUT_OLDER_THAN") {
            Some(raw) => Some(
                parse_older_than(&raw)
                    .ok_or_else(|| Error::Config(format!("'{raw}' is not a valid olderThan interval")))?,
            ),
            None => None,
        };

        let dry_run = env_flag("INPUT_DRY_RUN");
        let validate = env_flag("INPUT_VALIDATE");
        let fail_on_warnings = env_flag("INPUT_FAIL_ON_WARNINGS");

        if keep_n_untagged.is_some() && delete_untagged_flag == Some(true) {
            return Err(Error::Config(String::from(
                "keepNuntagged and deleteUntagged are mutually exclusive",
            )));
        }

        if matches!(packages, PackageSpec::Pattern(_)) && !expand_packages {
            return Err(Error::Config(String::from(
                "pattern expansion requires expandPackages to be enabled",
            )));
        }

        let delete_untagged = resolve_delete_untagged(
            delete_untagged_flag,
            keep_n_untagged,
            delete_ghost_images,
            delete_partial_images,
            delete_orphaned_images,
            delete_tags.is_some(),
            keep_n_tagged.is_some(),
        );

        Ok(Self {
            owner_name,
            owner,
            packages,
            expand_packages,
            token,
            delete_tags,
            exclude_tags,
            delete_untagged,
            delete_ghost_images,
            delete_partial_images,
            delete_orphaned_images,
            keep_n_tagged,
            keep_n_untagged,
            older_than,
            dry_run,
            validate,
            fail_on_warnings,
        })
    }
}

/// Stage F's defaulting rule: if no C/D/E/F option is configured,
/// `deleteUntagged` defaults to true.
fn resolve_delete_untagged(
    explicit: Option<bool>,
    keep_n_untagged: Option<usize>,
    delete_ghost_images: bool,
    delete_partial_images: bool,
    delete_orphaned_images: bool,
    has_delete_tags: bool,
    has_keep_n_tagged: bool,
) -> bool {
    if let Some(explicit) = explicit {
        return explicit;
    }
    if keep_n_untagged.is_some() {
        return false;
    }
    let any_other_stage_configured =
        has_delete_tags || delete_ghost_images || delete_partial_images || delete_orphaned_images || has_keep_n_tagged;
    !any_other_stage_configured
}

fn parse_owner(owner_name: String) -> Result<OwnerKind, Error> {
    let kind = env_opt("INPUT_OWNER_TYPE").unwrap_or_else(|| String::from("authenticated-user"));
    match kind.as_str() {
        "org" | "organization" => Ok(OwnerKind::Organization(owner_name)),
        "user" => Ok(OwnerKind::User(owner_name)),
        "authenticated-user" => Ok(OwnerKind::AuthenticatedUser),
        other => Err(Error::Config(format!("unknown ownerType '{other}'"))),
    }
}

fn parse_packages() -> Result<PackageSpec, Error> {
    let raw = require_env("INPUT_PACKAGES")?;
    let use_regex = env_flag("INPUT_USE_REGEX");

    if use_regex {
        let pattern = parse_pattern_set(&raw, true)
            .ok_or_else(|| Error::Config(format!("'{raw}' is not a valid package pattern")))?;
        return Ok(PackageSpec::Pattern(pattern));
    }

    if raw.contains('*') || raw.contains('?') {
        let pattern = parse_pattern_set(&raw, false)
            .ok_or_else(|| Error::Config(format!("'{raw}' is not a valid package pattern")))?;
        return Ok(PackageSpec::Pattern(pattern));
    }

    let names: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect();
    match names.len() {
        0 => Err(Error::Config(String::from("no target packages configured"))),
        1 => Ok(PackageSpec::Single(names.into_iter().next().expect("len checked"))),
        _ => Ok(PackageSpec::List(names)),
    }
}

fn require_env(name: &str) -> Result<String, Error> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::Config(format!("missing required configuration value '{name}'"))),
    }
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_flag(name: &str) -> bool {
    env_opt(name).map(|value| parse_bool_strict(&value)).unwrap_or(false)
}

fn parse_bool_strict(value: &str) -> bool {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" | "" => false,
        other => {
            warn!("Received non-boolean value '{other}'; treating as false");
            false
        }
    }
}

fn parse_non_negative(raw: &str, field: &str) -> Result<usize, Error> {
    raw.parse::<usize>()
        .map_err(|_| Error::Config(format!("'{field}' must be a non-negative integer, got '{raw}'")))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_to_delete_untagged_when_nothing_else_configured() {
        assert!(resolve_delete_untagged(None, None, false, false, false, false, false));
    }

    #[test]
    fn test_keep_n_tagged_suppresses_default() {
        assert!(!resolve_delete_untagged(None, None, false, false, false, false, true));
    }

    #[test]
    fn test_keep_n_untagged_suppresses_default() {
        assert!(!resolve_delete_untagged(None, Some(3), false, false, false, false, false));
    }

    #[test]
    fn test_explicit_value_always_wins() {
        assert!(!resolve_delete_untagged(Some(false), None, false, false, false, false, false));
        assert!(resolve_delete_untagged(Some(true), None, false, false, false, false, true));
    }

    #[test]
    fn test_parse_non_negative_rejects_garbage() {
        assert!(parse_non_negative("abc", "INPUT_KEEP_N_TAGGED").is_err());
        assert!(parse_non_negative("-1", "INPUT_KEEP_N_TAGGED").is_err());
        assert_eq!(parse_non_negative("0", "INPUT_KEEP_N_TAGGED").unwrap(), 0);
    }

    #[test]
    fn test_parse_bool_strict_unrecognised_defaults_false() {
        assert!(!parse_bool_strict("maybe"));
        assert!(parse_bool_strict("TRUE"));
    }
}

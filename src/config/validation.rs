//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse: the raw TOML is first read into a `toml::Value`, its key
//! tree walked and compared against the known field names, and any stray key
//! reported as a warning with a "did you mean?" suggestion. Normal serde
//! deserialization runs afterwards. Warnings never break a config.

use std::collections::BTreeSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path of `AppConfig`.
///
/// Kept by hand in step with settings.rs.
pub fn known_config_keys() -> BTreeSet<&'static str> {
    [
        // [server]
        "server",
        "server.addr",
        // [playback]
        "playback",
        "playback.speed",
        "playback.session_timeout_secs",
        "playback.event_buffer",
        "playback.finished_surface_limit",
        // [catalogs]
        "catalogs",
        "catalogs.path",
        "catalogs.default_subject",
    ]
    .into_iter()
    .collect()
}

// ============================================================================
// Key Walking & Suggestions
// ============================================================================

/// Collect the dotted path of every key in a TOML value, tables included.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

/// Edit distance between two strings, counted in chars.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Closest known key within edit distance 3. Ties go to the first key in
/// sorted order.
pub fn suggest_correction(unknown: &str, known: &BTreeSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist > 3 {
            continue;
        }
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((k, dist)),
        }
    }
    best.map(|(k, _)| k.to_string())
}

/// First pass: warn about keys `AppConfig` does not know.
///
/// Unparseable input yields no warnings; serde reports it afterwards.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Checks
// ============================================================================

/// Second pass: hard errors for values playback cannot honour, warnings for
/// values that are legal but probably a mistake.
pub fn validate_ranges(config: &super::AppConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let p = &config.playback;

    if !p.speed.is_finite() || p.speed < 0.0 {
        errors.push(format!(
            "playback.speed = {} must be a finite number >= 0 (0 disables delays)",
            p.speed
        ));
    } else if p.speed > super::defaults::PLAYBACK_SPEED_WARN_ABOVE {
        warnings.push(ValidationWarning {
            field: "playback.speed".to_string(),
            message: format!(
                "playback.speed = {} collapses every step to near zero; use 0 to disable delays",
                p.speed
            ),
            suggestion: None,
        });
    }

    if p.event_buffer == 0 {
        errors.push("playback.event_buffer must be greater than 0".to_string());
    }

    if p.finished_surface_limit == 0 {
        errors.push("playback.finished_surface_limit must be greater than 0".to_string());
    }

    if p.session_timeout_secs == Some(0) {
        errors.push(
            "playback.session_timeout_secs must be greater than 0 (omit it for no timeout)"
                .to_string(),
        );
    }

    if config.server.addr.trim().is_empty() {
        errors.push("server.addr must not be empty".to_string());
    }

    if config.catalogs.default_subject.trim().is_empty() {
        errors.push("catalogs.default_subject must not be empty".to_string());
    }

    (errors, warnings)
}

//! Configuration validation.
//!
//! Detects unknown/misspelled fields in TOML config files and reports
//! security-relevant misconfiguration of the auth and webhook sections.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use {secrecy::ExposeSecret, warden_auth::exchange::MIN_TOKEN_SECRET_BYTES};

use crate::schema::{DEFAULT_TOKEN_TTL_SECS, WardenConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "security", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "auth.token_secret"
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    /// Dynamic keys (webhook source names) whose values share one shape.
    Map(Box<KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Map, Struct};

    Struct(HashMap::from([
        (
            "server",
            Struct(HashMap::from([("bind", Leaf), ("port", Leaf)])),
        ),
        (
            "database",
            Struct(HashMap::from([("url", Leaf), ("max_connections", Leaf)])),
        ),
        (
            "auth",
            Struct(HashMap::from([
                ("session_cookie", Leaf),
                ("session_ttl_days", Leaf),
                ("token_secret", Leaf),
                ("token_ttl_secs", Leaf),
                ("token_recheck_credential", Leaf),
                ("store_timeout_ms", Leaf),
            ])),
        ),
        (
            "webhooks",
            Map(Box::new(Struct(HashMap::from([
                ("secret", Leaf),
                ("signature_header", Leaf),
                ("event_header", Leaf),
                ("delivery_header", Leaf),
            ])))),
        ),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_len = b.chars().count();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_len]
}

fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (c, levenshtein(needle, c)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at `path`, or the discovered config file when `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(ref actual_path) = config_path else {
        let mut result = validate_config(&crate::loader::apply_env_overrides(
            WardenConfig::default(),
        ));
        result.diagnostics.insert(0, Diagnostic {
            severity: Severity::Info,
            category: "file-ref",
            path: String::new(),
            message: "no config file found; using defaults".into(),
        });
        return result;
    };

    let content = match std::fs::read_to_string(actual_path) {
        Ok(content) => crate::env_subst::substitute_env(&content),
        Err(e) => {
            return ValidationResult {
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    category: "syntax",
                    path: String::new(),
                    message: format!("failed to read config file: {e}"),
                }],
                config_path: Some(actual_path.clone()),
            };
        },
    };

    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");
    let mut result = if is_toml {
        validate_toml_str(&content)
    } else {
        match crate::loader::parse_config(&content, actual_path) {
            Ok(config) => validate_config(&crate::loader::apply_env_overrides(config)),
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    category: "type-error",
                    path: String::new(),
                    message: e.to_string(),
                }],
                config_path: None,
            },
        }
    };
    result.config_path = Some(actual_path.clone());
    result
}

/// Validate a TOML string without touching the file system.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("TOML syntax error: {e}"),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&toml_value, &build_schema_map(), "", &mut diagnostics);

    match toml::from_str::<WardenConfig>(toml_str) {
        Ok(config) => check_semantics(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: format!("type error: {e}"),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Run only the semantic checks on an already-loaded config.
#[must_use]
pub fn validate_config(config: &WardenConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();
    check_semantics(config, &mut diagnostics);
    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let toml::Value::Table(table) = value else {
        return;
    };
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match schema {
        KnownKeys::Struct(fields) => {
            let known: Vec<&str> = fields.keys().copied().collect();
            for (key, child) in table {
                let path = join(key);
                if let Some(child_schema) = fields.get(key.as_str()) {
                    check_unknown_fields(child, child_schema, &path, diagnostics);
                    continue;
                }
                let message = match suggest(key, &known, 3) {
                    Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
                    None => "unknown field".to_string(),
                };
                diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    category: "unknown-field",
                    path,
                    message,
                });
            }
        },
        KnownKeys::Map(value_schema) => {
            for (key, child) in table {
                check_unknown_fields(child, value_schema, &join(key), diagnostics);
            }
        },
        KnownKeys::Leaf => {},
    }
}

fn check_semantics(config: &WardenConfig, diagnostics: &mut Vec<Diagnostic>) {
    let auth = &config.auth;

    match auth.token_secret.as_ref().map(|s| s.expose_secret().len()) {
        None => diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "security",
            path: "auth.token_secret".into(),
            message: "no token signing secret; the gateway will refuse to start (set WARDEN_TOKEN_SECRET)".into(),
        }),
        Some(len) if len < MIN_TOKEN_SECRET_BYTES => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "security",
            path: "auth.token_secret".into(),
            message: format!(
                "token signing secret is {len} bytes; at least {MIN_TOKEN_SECRET_BYTES} are required"
            ),
        }),
        Some(_) => {},
    }

    if auth.token_ttl_secs == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: "auth.token_ttl_secs".into(),
            message: "token lifetime must be positive".into(),
        });
    } else if auth.token_ttl_secs > DEFAULT_TOKEN_TTL_SECS && !auth.token_recheck_credential {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "security",
            path: "auth.token_ttl_secs".into(),
            message: "exchange tokens outlive a revoked credential for up to their full lifetime; \
                      consider auth.token_recheck_credential = true"
                .into(),
        });
    }

    if auth.store_timeout_ms == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: "auth.store_timeout_ms".into(),
            message: "store timeout must be positive".into(),
        });
    }

    let cookie_ok = !auth.session_cookie.is_empty()
        && auth
            .session_cookie
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !cookie_ok {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: "auth.session_cookie".into(),
            message: "cookie name must be non-empty and use only [A-Za-z0-9_-]".into(),
        });
    }

    let mut sources: Vec<_> = config.webhooks.iter().collect();
    sources.sort_by(|a, b| a.0.cmp(b.0));
    for (name, source) in sources {
        let len = source.secret.expose_secret().len();
        if len == 0 {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "security",
                path: format!("webhooks.{name}.secret"),
                message: "webhook secret is empty".into(),
            });
        } else if len < 16 {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "security",
                path: format!("webhooks.{name}.secret"),
                message: format!("webhook secret is only {len} bytes"),
            });
        }
    }
}

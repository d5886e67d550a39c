use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::auth::{AuthToken, OAuth2Refresh};
use crate::client::SpreadsheetOptions;

#[derive(Debug, Default, PartialEq)]
struct RcConfig {
    spreadsheet_id: Option<String>,
    spreadsheet_name: Option<String>,
    worksheet_id: Option<String>,
    worksheet_name: Option<String>,
    token: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    token_url: Option<String>,
    https: Option<bool>,
    host: Option<String>,
}

impl RcConfig {
    fn slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            "spreadsheet_id" => Some(&mut self.spreadsheet_id),
            "spreadsheet_name" => Some(&mut self.spreadsheet_name),
            "worksheet_id" => Some(&mut self.worksheet_id),
            "worksheet_name" => Some(&mut self.worksheet_name),
            "token" => Some(&mut self.token),
            "client_id" => Some(&mut self.client_id),
            "client_secret" => Some(&mut self.client_secret),
            "refresh_token" => Some(&mut self.refresh_token),
            "token_url" => Some(&mut self.token_url),
            "host" => Some(&mut self.host),
            _ => None,
        }
    }
}

/// Builds [`SpreadsheetOptions`] from `SHEETFEED_*` environment variables,
/// falling back to the first rc file found (`SHEETFEED_RC`, `./.sheetfeedrc`,
/// `~/.sheetfeedrc`). Values set on the returned options afterwards win.
pub(crate) fn load_config() -> Result<SpreadsheetOptions> {
    load_from(|name| std::env::var(name).ok(), &rc_candidates())
}

fn load_from(env: impl Fn(&str) -> Option<String>, rc_candidates: &[PathBuf]) -> Result<SpreadsheetOptions> {
    let mut rc = RcConfig::default();
    for rc_path in rc_candidates {
        if rc_path.exists() {
            rc = read_rc(rc_path).with_context(|| {
                format!("failed to read configuration file {}", rc_path.display())
            })?;
            log::debug!("loaded configuration from {}", rc_path.display());
            break;
        }
    }

    let pick = |var: &str, from_rc: Option<String>| env(var).or(from_rc);

    let client_id = pick("SHEETFEED_CLIENT_ID", rc.client_id);
    let client_secret = pick("SHEETFEED_CLIENT_SECRET", rc.client_secret);
    let refresh_token = pick("SHEETFEED_REFRESH_TOKEN", rc.refresh_token);
    let token_url = pick("SHEETFEED_TOKEN_URL", rc.token_url);
    let token = pick("SHEETFEED_TOKEN", rc.token);

    let mut options = SpreadsheetOptions::new();
    options.spreadsheet_id = pick("SHEETFEED_SPREADSHEET_ID", rc.spreadsheet_id);
    options.spreadsheet_name = pick("SHEETFEED_SPREADSHEET_NAME", rc.spreadsheet_name);
    options.worksheet_id = pick("SHEETFEED_WORKSHEET_ID", rc.worksheet_id);
    options.worksheet_name = pick("SHEETFEED_WORKSHEET_NAME", rc.worksheet_name);
    options.host = pick("SHEETFEED_HOST", rc.host);
    options.use_https = env("SHEETFEED_HTTPS").map(|v| parse_flag(&v)).or(rc.https);

    options = match (client_id, client_secret, refresh_token, token) {
        (Some(id), Some(secret), Some(refresh), _) => {
            let mut auth = OAuth2Refresh::new(id, secret, refresh)?;
            if let Some(url) = token_url {
                auth = auth.with_token_url(url);
            }
            options.with_auth(auth)
        }
        (_, _, _, Some(token)) => options.with_access_token(AuthToken::bearer(token)),
        _ => {
            if !rc_candidates.is_empty() {
                bail!(
                    "Missing configuration: token (set SHEETFEED_TOKEN, or SHEETFEED_CLIENT_ID + SHEETFEED_CLIENT_SECRET + SHEETFEED_REFRESH_TOKEN, or put `token:` in one of: {})",
                    rc_candidates
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            bail!("Missing configuration: token (set SHEETFEED_TOKEN or create .sheetfeedrc)");
        }
    };

    Ok(options)
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    // Long tokens are often pasted on the line after their key.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            if let Some(slot) = cfg.slot(pk) {
                *slot = Some(strip_quotes(line).to_string());
            }
            continue;
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            if k == "https" {
                if !v.is_empty() {
                    cfg.https = Some(parse_flag(v));
                }
                continue;
            }
            if v.is_empty() {
                pending_key = Some(k);
            } else if let Some(slot) = cfg.slot(k) {
                *slot = Some(v.to_string());
            }
        }
    }

    cfg
}

fn parse_flag(v: &str) -> bool {
    !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates() -> Vec<PathBuf> {
    if let Ok(p) = std::env::var("SHEETFEED_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".sheetfeedrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".sheetfeedrc"));
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_parse_rc() {
        let cfg = parse_rc(
            "# sheetfeed\nspreadsheet_id: \"0AtU5jNZ\"\nworksheet_name: 'Sheet 1'\nhttps: 0\ntoken:\n  ya29.long-token\nunknown: ignored\n",
        );
        assert_eq!(
            cfg,
            RcConfig {
                spreadsheet_id: Some("0AtU5jNZ".into()),
                worksheet_name: Some("Sheet 1".into()),
                https: Some(false),
                token: Some("ya29.long-token".into()),
                ..RcConfig::default()
            }
        );
    }

    #[test]
    fn test_value_on_next_line_may_contain_colons() {
        let cfg = parse_rc("token_url:\n  https://oauth2.googleapis.com/token\nworksheet_id: od6\n");
        assert_eq!(cfg.token_url.as_deref(), Some("https://oauth2.googleapis.com/token"));
        assert_eq!(cfg.https, None);
        assert_eq!(cfg.worksheet_id.as_deref(), Some("od6"));
    }

    #[test]
    fn test_env_wins_over_rc_file() {
        let dir = std::env::temp_dir().join(format!("sheetfeed-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let rc = dir.join(".sheetfeedrc");
        std::fs::write(&rc, "spreadsheet_id: from-file\nworksheet_id: od6\ntoken: file-token\n").unwrap();

        let options = load_from(
            env_of(&[("SHEETFEED_SPREADSHEET_ID", "from-env"), ("SHEETFEED_HTTPS", "false")]),
            &[rc.clone()],
        )
        .unwrap();
        std::fs::remove_file(&rc).ok();

        assert_eq!(options.spreadsheet_id.as_deref(), Some("from-env"));
        assert_eq!(options.worksheet_id.as_deref(), Some("od6"));
        assert_eq!(options.use_https, Some(false));
        assert!(options.auth.is_some());
    }

    #[test]
    fn test_missing_token_lists_candidates() {
        let missing = PathBuf::from("/nonexistent/.sheetfeedrc");
        let err = load_from(env_of(&[]), &[missing]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Missing configuration: token"), "{}", msg);
        assert!(msg.contains("/nonexistent/.sheetfeedrc"), "{}", msg);
    }

    #[test]
    fn test_refresh_token_credentials() {
        let options = load_from(
            env_of(&[
                ("SHEETFEED_CLIENT_ID", "id"),
                ("SHEETFEED_CLIENT_SECRET", "secret"),
                ("SHEETFEED_REFRESH_TOKEN", "refresh"),
            ]),
            &[],
        )
        .unwrap();
        assert!(options.auth.is_some());
        assert_eq!(options.use_https, None);
    }

    #[test]
    fn test_flags() {
        assert!(parse_flag("1"));
        assert!(parse_flag("true"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("False"));
    }
}

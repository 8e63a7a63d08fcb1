use url::Url;

use crate::errors::{AppError, AppResult};

/// Final hop of the hand-off: a plain page that forwards the browser, so the
/// fresh session cookie is in place before the destination loads.
#[derive(Debug, Clone)]
pub struct RedirectMediator {
    site_root: Url,
    delay_secs: u32,
}

impl RedirectMediator {
    pub fn new(site_root: &str, delay_secs: u32) -> AppResult<Self> {
        let site_root = Url::parse(site_root).map_err(|e| {
            AppError::InternalError(format!("SITE_ROOT '{}' is not a valid url: {}", site_root, e))
        })?;
        Ok(Self {
            site_root,
            delay_secs,
        })
    }

    pub fn site_root(&self) -> &str {
        self.site_root.as_str().trim_end_matches('/')
    }

    /// Destinations outside the site's origin are replaced by the site root.
    pub fn resolve_destination(&self, destination: Option<&str>) -> String {
        let fallback = || self.site_root().to_string();

        let Some(raw) = destination.map(str::trim).filter(|d| !d.is_empty()) else {
            return fallback();
        };

        let parsed = if raw.starts_with('/') && !raw.starts_with("//") {
            self.site_root.join(raw)
        } else {
            Url::parse(raw)
        };

        match parsed {
            Ok(url) if url.origin() == self.site_root.origin() => url.to_string(),
            _ => {
                log::warn!("Refusing off-site redirect to '{}'", raw);
                fallback()
            }
        }
    }

    pub fn page(&self, destination: &str) -> String {
        let target = escape_html(destination);
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{delay}; url={target}">
<title>Redirecting</title>
</head>
<body>
<p>This page should automatically redirect. If nothing is happening please use the continue link below.</p>
<p><a href="{target}">Continue</a></p>
</body>
</html>
"#,
            delay = self.delay_secs,
            target = target
        )
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

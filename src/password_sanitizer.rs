use crate::connection_string::is_url;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static PASSWORD_PARAMETER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"password\s*=\s*('(?:[^'\\]|\\.)*'?|[^\s&]+)").expect("valid password pattern")
});

static URL_USERINFO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(postgres(?:ql)?://[^:/@\s]+):([^@\s]+)@").expect("valid userinfo pattern")
});

/// Sanitize a connection descriptor of either style before it is logged or shown.
pub fn sanitize_connection_string(descriptor: &str) -> String {
    if is_url(descriptor) {
        sanitize_connection_url(descriptor)
    } else {
        PASSWORD_PARAMETER
            .replace_all(descriptor, "password=[REDACTED]")
            .to_string()
    }
}

/// Sanitize a connection URL by removing the password
pub fn sanitize_connection_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let mut sanitized = parsed.clone();
            if parsed.password().is_some() {
                let _ = sanitized.set_password(Some("[REDACTED]"));
            }

            let has_password_param = parsed.query_pairs().any(|(key, _)| key == "password");
            if has_password_param {
                let pairs: Vec<(String, String)> = parsed
                    .query_pairs()
                    .map(|(key, value)| {
                        let value = if key == "password" {
                            "[REDACTED]".to_string()
                        } else {
                            value.into_owned()
                        };
                        (key.into_owned(), value)
                    })
                    .collect();
                sanitized.query_pairs_mut().clear().extend_pairs(pairs);
            }

            // URL-decode the final result to make [REDACTED] readable in logs
            sanitized.to_string().replace("%5BREDACTED%5D", "[REDACTED]")
        }
        // Unparseable URLs (e.g. a password containing '&') still must not leak
        Err(_) => sanitize_text_for_logging(url),
    }
}

/// General sanitization for any text that might carry a password, such as
/// driver error messages that echo the descriptor back.
pub fn sanitize_text_for_logging(text: &str) -> String {
    let sanitized = URL_USERINFO.replace_all(text, "$1:[REDACTED]@");
    PASSWORD_PARAMETER
        .replace_all(&sanitized, "password=[REDACTED]")
        .to_string()
}

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::{
    error::EmbedError,
    types::{RequestContext, UrlDecoration},
};

static MOBILE_USER_AGENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Android|iPhone|iPad|iPod|BlackBerry|IEMobile|Opera Mini")
        .expect("mobile user agent pattern is valid")
});

/// Parse and validate the caller-supplied booking URL.
pub fn parse_target_url(raw: &str) -> Result<Url, EmbedError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed)
        .map_err(|err| EmbedError::invalid_target(trimmed, err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(EmbedError::invalid_target(
            trimmed,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(EmbedError::invalid_target(trimmed, "missing host"));
    }
    Ok(url)
}

/// Derive the request URL for one attempt.
///
/// Existing query parameters are kept; decorated keys replace any value
/// already present under the same key.
pub fn request_url(
    target: &Url,
    decoration: UrlDecoration,
    attempt_count: u32,
    ctx: RequestContext,
) -> Url {
    let mut params: Vec<(&str, String)> = Vec::with_capacity(5);
    if decoration == UrlDecoration::Rich {
        params.push(("embedded", "true".to_owned()));
        params.push(("iframe", "true".to_owned()));
        params.push(("mobile", ctx.mobile.to_string()));
    }
    params.push(("_t", ctx.now_ms.to_string()));
    if attempt_count > 0 {
        params.push(("_retry", attempt_count.to_string()));
    }

    let mut url = target.clone();
    set_query_params(&mut url, &params);
    url
}

/// URL opened outside the overlay: the target, undecorated.
pub fn external_url(target: &Url) -> Url {
    target.clone()
}

pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    MOBILE_USER_AGENT.is_match(user_agent)
}

fn set_query_params(url: &mut Url, params: &[(&str, String)]) {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !params.iter().any(|(name, _)| name == key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (key, value) in &retained {
        pairs.append_pair(key, value);
    }
    for (key, value) in params {
        pairs.append_pair(key, value);
    }
}

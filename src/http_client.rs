use reqwest::{Client, header};
use anyhow::Result;
use std::time::Duration;

/// Creates the HTTP client used for every page request.
/// Headers mirror a desktop Chrome navigation so listing pages are served normally.
pub fn create_http_client(user_agent: &str, timeout_secs: u64) -> Result<Client> {
    let mut headers = header::HeaderMap::new();

    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7")
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_static("zh-CN,zh;q=0.9")
    );
    headers.insert(
        header::ACCEPT_ENCODING,
        header::HeaderValue::from_static("gzip, deflate, br")
    );
    headers.insert(
        header::CONNECTION,
        header::HeaderValue::from_static("keep-alive")
    );
    headers.insert(
        "Upgrade-Insecure-Requests",
        header::HeaderValue::from_static("1")
    );

    let client = Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;

    Ok(client)
}

/// Heuristic check for captcha or verification pages served instead of listings.
pub fn looks_like_bot_check(html: &str) -> bool {
    let html_lower = html.to_lowercase();

    html_lower.contains("captcha") ||
    html_lower.contains("人机验证") ||
    html_lower.contains("验证码") ||
    html_lower.contains("access denied") ||
    html_lower.contains("cf-browser-verification")
}

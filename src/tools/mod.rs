//! 工具箱：GoogleSearch、HttpRequest、WebBrowser、CodeInterpreter 与执行器
//!
//! 工具契约：execute(arg) 的 Err 与超时都由 ToolExecutor 转为 Observation
//! 文本，ReAct 循环侧永远拿到一个字符串。

pub mod code_interpreter;
pub mod executor;
pub mod google_search;
pub mod http_request;
pub mod registry;
pub mod web_browser;

use std::collections::HashSet;

pub use code_interpreter::CodeInterpreterTool;
pub use executor::ToolExecutor;
pub use google_search::GoogleSearchTool;
pub use http_request::HttpRequestTool;
pub use registry::{Tool, ToolRegistry};
pub use web_browser::WebBrowserTool;

/// 从 URL 中提取 host（小写，不含端口与路径）
pub(crate) fn extract_domain(url: &str) -> Option<String> {
    let url = url.trim();
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host = url.split('/').next()?;
    let host = host.split(':').next()?;
    Some(host.to_lowercase())
}

/// 域名白名单校验；白名单为空表示不限制
pub(crate) fn domain_allowed(allowed: &HashSet<String>, url: &str) -> Result<(), String> {
    if allowed.is_empty() {
        return Ok(());
    }
    let domain = extract_domain(url).ok_or_else(|| "Invalid or missing URL".to_string())?;
    if allowed.contains(&domain) {
        Ok(())
    } else {
        Err(format!("Domain not in allowlist: {}", domain))
    }
}

/// 按字符数截断，超出时追加 suffix
pub(crate) fn truncate_chars(s: &str, max_chars: usize, suffix: &str) -> String {
    if s.chars().count() > max_chars {
        format!("{}{}", s.chars().take(max_chars).collect::<String>(), suffix)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://API.example.com:8080/v3/price?x=1"),
            Some("api.example.com".to_string())
        );
        assert_eq!(extract_domain("ftp://example.com"), None);
    }

    #[test]
    fn test_domain_allowed_empty_allows_all() {
        let empty = HashSet::new();
        assert!(domain_allowed(&empty, "https://anything.dev").is_ok());

        let mut allowed = HashSet::new();
        allowed.insert("api.coingecko.com".to_string());
        assert!(domain_allowed(&allowed, "https://api.coingecko.com/api/v3").is_ok());
        assert!(domain_allowed(&allowed, "https://evil.dev/x").is_err());
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10, "..."), "short");
        assert_eq!(truncate_chars("abcdefgh", 4, "... (truncated)"), "abcd... (truncated)");
    }
}

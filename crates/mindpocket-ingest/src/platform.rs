//! URL platform classification.

use once_cell::sync::Lazy;
use regex::Regex;

use mindpocket_core::Platform;

static PLATFORM_RULES: Lazy<Vec<(Regex, Platform)>> = Lazy::new(|| {
    [
        (r"mp\.weixin\.qq\.com", Platform::Wechat),
        (r"youtube\.com|youtu\.be", Platform::Youtube),
        (r"github\.com", Platform::Github),
        (r"zhihu\.com", Platform::Zhihu),
        (r"bilibili\.com", Platform::Bilibili),
        (r"xiaohongshu\.com|xhslink\.com", Platform::Xiaohongshu),
        (r"twitter\.com|x\.com", Platform::Twitter),
        (r"medium\.com", Platform::Medium),
        (r"reddit\.com", Platform::Reddit),
        (r"stackoverflow\.com", Platform::Stackoverflow),
        (r"juejin\.cn", Platform::Juejin),
        (r"jianshu\.com", Platform::Jianshu),
        (r"notion\.so", Platform::Notion),
        (r"arxiv\.org", Platform::Arxiv),
    ]
    .into_iter()
    .map(|(pattern, platform)| (Regex::new(pattern).expect("valid platform regex"), platform))
    .collect()
});

/// Platforms whose content can be fetched without a rendered DOM.
const BROWSER_FREE_PLATFORMS: &[Platform] = &[Platform::Bilibili];

/// Map a URL to a known platform. First matching rule wins.
pub fn classify(url: &str) -> Option<Platform> {
    PLATFORM_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(url))
        .map(|(_, platform)| *platform)
}

/// Whether a platform's pages must be rendered before conversion.
pub fn needs_browser_rendering(platform: Option<Platform>) -> bool {
    match platform {
        None => false,
        Some(p) => !BROWSER_FREE_PLATFORMS.contains(&p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_platforms() {
        let cases = [
            ("https://mp.weixin.qq.com/s/abc", Platform::Wechat),
            ("https://www.youtube.com/watch?v=1", Platform::Youtube),
            ("https://github.com/rust-lang/rust", Platform::Github),
            ("https://www.zhihu.com/question/1", Platform::Zhihu),
            ("https://www.bilibili.com/video/BV1GJ411x7h7", Platform::Bilibili),
            ("https://www.xiaohongshu.com/explore/1", Platform::Xiaohongshu),
            ("http://xhslink.com/a/b", Platform::Xiaohongshu),
            ("https://x.com/user/status/1", Platform::Twitter),
            ("https://medium.com/@a/b", Platform::Medium),
            ("https://www.reddit.com/r/rust", Platform::Reddit),
            ("https://stackoverflow.com/q/1", Platform::Stackoverflow),
            ("https://juejin.cn/post/1", Platform::Juejin),
            ("https://www.jianshu.com/p/1", Platform::Jianshu),
            ("https://www.notion.so/page", Platform::Notion),
            ("https://arxiv.org/abs/1706.03762", Platform::Arxiv),
        ];
        for (url, expected) in cases {
            assert_eq!(classify(url), Some(expected), "{}", url);
        }
    }

    #[test]
    fn test_classify_rule_order() {
        // A WeChat article that links to GitHub is still WeChat.
        assert_eq!(
            classify("https://mp.weixin.qq.com/s?src=github.com"),
            Some(Platform::Wechat)
        );
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify("https://example.com/article"), None);
    }

    #[test]
    fn test_needs_browser_rendering() {
        assert!(!needs_browser_rendering(None));
        assert!(!needs_browser_rendering(Some(Platform::Bilibili)));
        assert!(needs_browser_rendering(Some(Platform::Wechat)));
        assert!(needs_browser_rendering(Some(Platform::Xiaohongshu)));
    }
}

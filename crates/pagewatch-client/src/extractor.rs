use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pagewatch_core::error::AppError;
use pagewatch_core::models::{Engagement, Post, content_fingerprint};
use pagewatch_core::traits::Extractor;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Element `id` prefixes Facebook uses for feed stories.
const ELEMENT_ID_PREFIXES: &[&str] = &["post", "hyperfeed"];

/// Query parameters that identify a post; everything else is tracking noise.
const KEEP_PARAMS: &[&str] = &["story_fbid", "id", "fbid", "set", "v"];

/// URL fragments that mark UI chrome rather than post media.
const MEDIA_JUNK: &[&str] = &[
    "/cp0/", "emoji", "safe_image", "s64x64", "s80x80", "s160x160", "p50x50", "p160x160",
];

struct Selectors {
    /// Candidate post containers across Facebook layout generations.
    posts: Selector,
    comet_message: Selector,
    dir_auto: Selector,
    user_content: Selector,
    anchors: Selector,
    images: Selector,
    styled_divs: Selector,
    data_ploi: Selector,
    videos: Selector,
    times: Selector,
    login_wall: Selector,
}

struct Patterns {
    story_fbid: Regex,
    permalink: Regex,
    posts_path: Regex,
    videos_path: Regex,
    mf_story_key: Regex,
    long_digits: Regex,
    bg_image: Regex,
    likes: Regex,
    comments: Regex,
    shares: Regex,
    counter_line: Regex,
    see_more: Regex,
}

struct Inner {
    sel: Selectors,
    re: Patterns,
}

/// Extracts candidate posts from a rendered Facebook page timeline.
///
/// Handles both the modern Comet layout (`role="article"`, `data-ad-*`
/// attributes, obfuscated utility classes) and older layouts
/// (`userContent`, `data-ft`). Every accessor degrades gracefully: a post
/// missing a field yields `None`/empty for that field, and an element that
/// produces neither content nor media is dropped rather than stored hollow.
#[derive(Clone)]
pub struct FacebookExtractor {
    inner: Arc<Inner>,
}

fn sel(s: &str) -> Result<Selector, AppError> {
    Selector::parse(s).map_err(|e| AppError::ExtractionError(format!("bad selector {s:?}: {e}")))
}

fn re(s: &str) -> Result<Regex, AppError> {
    Regex::new(s).map_err(|e| AppError::ExtractionError(format!("bad pattern {s:?}: {e}")))
}

impl FacebookExtractor {
    pub fn new() -> Result<Self, AppError> {
        let selectors = Selectors {
            posts: sel(concat!(
                r#"div[role="article"], "#,
                r#"div[data-pagelet*="FeedUnit"], "#,
                r#"div[data-pagelet*="Component"], "#,
                r#"div[data-testid="fbfeed_story"], "#,
                "div.x1yztbdb.x1n2onr6",
            ))?,
            comet_message: sel(r#"div[data-ad-comet-preview="message"], div[data-ad-preview="message"]"#)?,
            dir_auto: sel(r#"div[dir="auto"], span[dir="auto"]"#)?,
            user_content: sel("div.userContent")?,
            anchors: sel("a[href]")?,
            images: sel("img, image")?,
            styled_divs: sel("div[style]")?,
            data_ploi: sel("[data-ploi]")?,
            videos: sel("video")?,
            times: sel("abbr, time")?,
            login_wall: sel(r#"form#login_form, input[name="pass"]"#)?,
        };

        let patterns = Patterns {
            story_fbid: re(r"story_fbid=([^&]+)")?,
            permalink: re(r"/permalink/([^/?]+)")?,
            posts_path: re(r"/posts/([^/?]+)")?,
            videos_path: re(r"/videos/([^/?]+)")?,
            mf_story_key: re(r#""mf_story_key":"(\d+)""#)?,
            long_digits: re(r"(\d{10,})")?,
            bg_image: re(r#"url\(['"]?([^'")]+)['"]?\)"#)?,
            likes: re(r"(?i)([\d,]+)\s*(?:likes?|thích)")?,
            comments: re(r"(?i)([\d,]+)\s*(?:comments?|bình luận)")?,
            shares: re(r"(?i)([\d,]+)\s*(?:shares?|chia sẻ)")?,
            counter_line: re(
                r"(?i)^(\d+[hmdy]|Just now|Vừa xong|[\d.,]+ (likes?|thích|shares?|chia sẻ|comments?|bình luận))$",
            )?,
            see_more: re(r"(?i)\s*…?\s*(Xem thêm|See more)\s*$")?,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                sel: selectors,
                re: patterns,
            }),
        })
    }

    fn extract_post_id(&self, element: ElementRef<'_>) -> Option<String> {
        let inner = &self.inner;

        // Permalinks embedded in anchors are the most reliable source.
        for anchor in element.select(&inner.sel.anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            for pattern in [
                &inner.re.story_fbid,
                &inner.re.permalink,
                &inner.re.posts_path,
                &inner.re.videos_path,
            ] {
                if let Some(caps) = pattern.captures(href) {
                    return Some(caps[1].to_string());
                }
            }
        }

        // Older layouts carry the story key in a data-ft JSON blob.
        if let Some(data_ft) = element.value().attr("data-ft")
            && let Some(caps) = inner.re.mf_story_key.captures(data_ft)
        {
            return Some(caps[1].to_string());
        }

        // Long digit runs in aria-labels tend to be fbids or timestamps.
        if let Some(aria) = element.value().attr("aria-label")
            && let Some(caps) = inner.re.long_digits.captures(aria)
        {
            return Some(caps[1].to_string());
        }

        if let Some(id) = element.value().attr("id")
            && ELEMENT_ID_PREFIXES.iter().any(|p| id.starts_with(p))
        {
            return Some(id.to_string());
        }

        // Last resort: a deterministic fingerprint of what we did extract.
        let content = self.extract_content(element);
        let posted_at = self.extract_timestamp(element);
        if !content.is_empty() || posted_at.is_some() {
            let id = content_fingerprint(&content, posted_at);
            tracing::debug!(post_id = %id, "Generated fallback post id");
            return Some(id);
        }

        None
    }

    fn extract_content(&self, element: ElementRef<'_>) -> String {
        let inner = &self.inner;

        // Comet marks the message container explicitly.
        if let Some(container) = element.select(&inner.sel.comet_message).next() {
            let text = squish(container.text());
            if !text.is_empty() {
                return text;
            }
        }

        // Obfuscated utility classes that consistently carry body text.
        let mut parts: Vec<String> = Vec::new();
        for elem in element.select(&inner.sel.dir_auto) {
            if inside_any(elem, &["button", "a"]) {
                continue;
            }
            if !elem
                .value()
                .classes()
                .any(|c| matches!(c, "x11i5rnm" | "x1mh8g0r" | "xt0b8zv" | "xat24cr"))
            {
                continue;
            }
            let text = squish(elem.text());
            if text.len() > 3 && !parts.contains(&text) {
                parts.push(text);
            }
        }
        if !parts.is_empty() {
            return parts.join(" ");
        }

        // Classic layout.
        if let Some(old) = element.select(&inner.sel.user_content).next() {
            let text = squish(old.text());
            if !text.is_empty() {
                return text;
            }
        }

        // Global fallback: any longish text node outside UI chrome.
        let mut seen: Vec<String> = Vec::new();
        for node in element.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let trimmed = text.trim();
            if trimmed.len() <= 20 {
                continue;
            }
            let in_chrome = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| matches!(a.value().name(), "button" | "a" | "script" | "style"));
            if in_chrome {
                continue;
            }
            let lower = trimmed.to_lowercase();
            if ["nhắn tin", "theo dõi", "chia sẻ"]
                .iter()
                .any(|junk| lower.contains(junk))
            {
                continue;
            }
            if inner.re.counter_line.is_match(trimmed) {
                continue;
            }
            let owned = trimmed.to_string();
            if !seen.contains(&owned) {
                seen.push(owned);
            }
        }
        let joined = seen.join(" ");
        inner.re.see_more.replace(&joined, "").trim().to_string()
    }

    fn is_valid_media(&self, src: &str, element: ElementRef<'_>) -> bool {
        if src.is_empty() || MEDIA_JUNK.iter().any(|p| src.contains(p)) {
            return false;
        }

        // Avatars and comment thumbnails live under dedicated wrappers.
        let in_comment_area = element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| {
                a.value().classes().any(|c| {
                    c.contains("comment") || c.contains("reply") || c.contains("avatar")
                })
            });
        if in_comment_area {
            return false;
        }

        for attr in ["width", "height"] {
            if let Some(value) = element.value().attr(attr)
                && let Ok(px) = value.trim_end_matches("px").parse::<i64>()
                && px < 100
            {
                return false;
            }
        }

        true
    }

    fn extract_media_urls(&self, element: ElementRef<'_>) -> Vec<String> {
        let inner = &self.inner;
        let mut urls: Vec<String> = Vec::new();

        for img in element.select(&inner.sel.images) {
            for attr in [
                "src",
                "xlink:href",
                "data-src",
                "data-full-size-image-url",
                "data-img-src",
            ] {
                if let Some(src) = img.value().attr(attr)
                    && self.is_valid_media(src, img)
                {
                    urls.push(src.to_string());
                }
            }
        }

        // Grid layouts render images as background-image styles.
        for div in element.select(&inner.sel.styled_divs) {
            let style = div.value().attr("style").unwrap_or_default();
            if style.contains("background-image")
                && let Some(caps) = inner.re.bg_image.captures(style)
                && self.is_valid_media(&caps[1], div)
            {
                urls.push(caps[1].to_string());
            }
        }

        for elem in element.select(&inner.sel.data_ploi) {
            if let Some(src) = elem.value().attr("data-ploi")
                && self.is_valid_media(src, elem)
            {
                urls.push(src.to_string());
            }
        }

        for video in element.select(&inner.sel.videos) {
            if let Some(src) = video.value().attr("src") {
                urls.push(src.to_string());
            } else if let Some(poster) = video.value().attr("poster") {
                urls.push(poster.to_string());
            }
        }

        let mut seen = HashSet::new();
        urls.retain(|u| seen.insert(u.clone()));
        urls
    }

    fn extract_timestamp(&self, element: ElementRef<'_>) -> Option<DateTime<Utc>> {
        for elem in element.select(&self.inner.sel.times) {
            if let Some(utime) = elem.value().attr("data-utime")
                && let Ok(secs) = utime.parse::<i64>()
                && let Some(parsed) = DateTime::from_timestamp(secs, 0)
            {
                return Some(parsed);
            }
            if let Some(datetime) = elem.value().attr("datetime")
                && let Ok(parsed) = DateTime::parse_from_rfc3339(datetime)
            {
                return Some(parsed.with_timezone(&Utc));
            }
        }
        None
    }

    fn extract_engagement(&self, element: ElementRef<'_>) -> Engagement {
        let inner = &self.inner;
        let text = squish(element.text());
        Engagement {
            likes: count(&inner.re.likes, &text),
            comments: count(&inner.re.comments, &text),
            shares: count(&inner.re.shares, &text),
        }
    }

    fn extract_post_url(&self, element: ElementRef<'_>) -> Option<String> {
        for anchor in element.select(&self.inner.sel.anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if href.contains("comment_id=") || href.contains("reply_comment_id=") {
                continue;
            }
            if !["/permalink/", "/posts/", "story_fbid=", "/videos/"]
                .iter()
                .any(|p| href.contains(p))
            {
                continue;
            }

            let absolute = if href.starts_with("http") {
                href.to_string()
            } else if href.starts_with('/') {
                format!("https://www.facebook.com{href}")
            } else {
                format!("https://www.facebook.com/{href}")
            };

            let Ok(mut url) = Url::parse(&absolute) else {
                continue;
            };
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| KEEP_PARAMS.contains(&k.as_ref()))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            url.set_query(None);
            if !kept.is_empty() {
                let mut pairs = url.query_pairs_mut();
                for (k, v) in &kept {
                    pairs.append_pair(k, v);
                }
            }
            return Some(url.to_string());
        }
        None
    }

    fn parse_post(&self, element: ElementRef<'_>, page_name: &str) -> Option<Post> {
        let post_id = self.extract_post_id(element)?;

        let content = self.extract_content(element);
        let media_urls = self.extract_media_urls(element);

        // A post with neither text nor media carries no information worth
        // storing; drop it rather than persist a hollow row.
        if content.is_empty() && media_urls.is_empty() {
            tracing::debug!(post_id = %post_id, "Skipping post with no content and no media");
            return None;
        }

        let mut post = Post::candidate(page_name, post_id);
        post.content = (!content.is_empty()).then_some(content);
        post.media_urls = media_urls;
        post.posted_at = self.extract_timestamp(element);
        post.engagement = self.extract_engagement(element);
        post.post_url = self.extract_post_url(element);
        Some(post)
    }
}

impl Extractor for FacebookExtractor {
    fn extract(&self, page_name: &str, raw_markup: &str) -> Result<Vec<Post>, AppError> {
        let document = Html::parse_document(raw_markup);

        if document.select(&self.inner.sel.login_wall).next().is_some() {
            return Err(AppError::ExtractionError(
                "Facebook is requiring login to view this page".to_string(),
            ));
        }

        let candidates: Vec<ElementRef<'_>> =
            document.select(&self.inner.sel.posts).collect();
        let ids: HashSet<_> = candidates.iter().map(|e| e.id()).collect();

        let mut posts = Vec::new();
        for element in candidates {
            // Keep only top-level matches; a matching div nested inside
            // another match is part of the same story.
            if element.ancestors().any(|a| ids.contains(&a.id())) {
                continue;
            }
            if element
                .value()
                .classes()
                .any(|c| c.contains("comment") || c.contains("reply"))
            {
                continue;
            }
            if let Some(post) = self.parse_post(element, page_name) {
                posts.push(post);
            }
        }

        tracing::info!(page = page_name, posts = posts.len(), "Extraction finished");
        Ok(posts)
    }
}

/// Whether the element sits inside any of the named ancestor tags.
fn inside_any(element: ElementRef<'_>, tags: &[&str]) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| tags.contains(&a.value().name()))
}

/// Join text chunks with single spaces, collapsing whitespace.
fn squish<'a>(chunks: impl Iterator<Item = &'a str>) -> String {
    chunks
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn count(pattern: &Regex, text: &str) -> i64 {
    pattern
        .captures(text)
        .and_then(|caps| caps[1].replace(',', "").parse().ok())
        .unwrap_or(0)
}

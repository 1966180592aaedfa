//! Media reference discovery across heterogeneous feed element shapes.
//!
//! Feeds reference media in four different shapes, and the same artifact
//! frequently shows up in more than one of them. Discovery reports every
//! occurrence in a fixed order and leaves deduplication to the downloader.

use crate::error::CrawlError;
use crate::feed::Element;
use crate::media::MediaDownloader;
use tracing::{debug, warn};

/// Which element shape a reference was discovered in. Only used for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// `itunes:image` artwork element (`href` attribute).
    Artwork,
    /// Inline `img` element (`href` attribute).
    InlineImage,
    /// Top-level `image` element with a nested `url` element.
    ChannelImage,
    /// `enclosure` element (`url` attribute), typically audio.
    Enclosure,
}

/// One discovered remote media URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
}

/// Elements with the given name: direct children only, or the whole
/// subtree when `recursive` is set.
fn matching<'a>(
    el: &'a Element,
    name: &'a str,
    recursive: bool,
) -> Box<dyn Iterator<Item = &'a Element> + 'a> {
    if recursive {
        Box::new(el.descendants().filter(move |child| child.name == name))
    } else {
        Box::new(el.children.iter().filter(move |child| child.name == name))
    }
}

/// Discover every media reference under `el`, in discovery order.
///
/// Channel-level extraction passes `recursive = false` so that item media
/// is not re-discovered at channel scope; item-level extraction passes
/// `true`. The single channel-image shape is located by descendant search
/// regardless of `recursive`. An element missing its expected URL
/// attribute is logged and skipped.
pub fn collect_media_refs(el: &Element, recursive: bool) -> Vec<MediaRef> {
    let mut refs = Vec::new();

    for artwork in matching(el, "itunes:image", recursive) {
        match artwork.attr("href") {
            Some(href) => refs.push(MediaRef {
                url: href.to_string(),
                kind: MediaKind::Artwork,
            }),
            None => warn!(element = "itunes:image", "artwork element without href attribute"),
        }
    }

    for img in matching(el, "img", recursive) {
        match img.attr("href") {
            Some(href) => refs.push(MediaRef {
                url: href.to_string(),
                kind: MediaKind::InlineImage,
            }),
            None => warn!(element = "img", "image element without href attribute"),
        }
    }

    if let Some(image) = el.find_first("image") {
        if let Some(url_el) = image.find_first("url") {
            let url = url_el.text.trim();
            if url.is_empty() {
                warn!(element = "image", "channel image without url text");
            } else {
                refs.push(MediaRef {
                    url: url.to_string(),
                    kind: MediaKind::ChannelImage,
                });
            }
        }
    }

    for enclosure in matching(el, "enclosure", recursive) {
        match enclosure.attr("url") {
            Some(url) => refs.push(MediaRef {
                url: url.to_string(),
                kind: MediaKind::Enclosure,
            }),
            None => warn!(element = "enclosure", "enclosure element without url attribute"),
        }
    }

    refs
}

/// Discover media references under `el` and hand each one to the
/// downloader in discovery order.
///
/// Duplicate discovery is expected and harmless; the downloader enforces
/// both dedup layers. Fetch failures are absorbed inside `download`, so
/// the only errors surfacing here are filesystem ones.
pub async fn extract_and_download(
    el: &Element,
    recursive: bool,
    downloader: &mut MediaDownloader,
) -> Result<(), CrawlError> {
    let refs = collect_media_refs(el, recursive);
    debug!(count = refs.len(), recursive, "discovered media references");
    for media in refs {
        debug!(kind = ?media.kind, url = %media.url, "handing reference to downloader");
        downloader.download(Some(&media.url)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::parse_feed;

    const FEED: &str = r#"<rss xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Show</title>
    <itunes:image href="https://cdn.example.com/cover.jpg"/>
    <image><url>https://cdn.example.com/logo.png</url></image>
    <item>
      <title>Ep 1</title>
      <guid>abc123</guid>
      <itunes:image href="https://cdn.example.com/ep1.jpg"/>
      <img href="https://cdn.example.com/inline.png"/>
      <enclosure url="https://cdn.example.com/ep1.mp3" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn item_discovery_is_recursive_and_ordered() {
        let doc = parse_feed(FEED);
        let item = &doc.channels[0].items[0];
        let refs = collect_media_refs(&item.element, true);

        let urls: Vec<&str> = refs.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/ep1.jpg",
                "https://cdn.example.com/inline.png",
                "https://cdn.example.com/ep1.mp3",
            ]
        );
        assert_eq!(refs[0].kind, MediaKind::Artwork);
        assert_eq!(refs[1].kind, MediaKind::InlineImage);
        assert_eq!(refs[2].kind, MediaKind::Enclosure);
    }

    #[test]
    fn channel_scope_restricts_to_direct_children() {
        let doc = parse_feed(FEED);
        let channel = &doc.channels[0];
        let refs = collect_media_refs(&channel.element, false);

        let urls: Vec<&str> = refs.iter().map(|r| r.url.as_str()).collect();
        // The item's artwork, inline image, and enclosure are not direct
        // children, so only the channel's own references surface.
        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/cover.jpg",
                "https://cdn.example.com/logo.png",
            ]
        );
        assert_eq!(refs[1].kind, MediaKind::ChannelImage);
    }

    #[test]
    fn missing_url_attributes_are_skipped() {
        let doc = parse_feed(
            "<rss><channel><item>\
             <itunes:image/><img/><enclosure type=\"audio/mpeg\"/>\
             </item></channel></rss>",
        );
        let refs = collect_media_refs(&doc.channels[0].items[0].element, true);
        assert!(refs.is_empty());
    }

    #[test]
    fn empty_channel_image_url_is_skipped() {
        let doc = parse_feed("<rss><channel><image><url></url></image></channel></rss>");
        let refs = collect_media_refs(&doc.channels[0].element, false);
        assert!(refs.is_empty());
    }

    #[test]
    fn duplicate_references_are_reported_each_time() {
        let doc = parse_feed(
            "<rss><channel><item>\
             <enclosure url=\"https://cdn.example.com/a.mp3\"/>\
             <enclosure url=\"https://cdn.example.com/a.mp3\"/>\
             </item></channel></rss>",
        );
        let refs = collect_media_refs(&doc.channels[0].items[0].element, true);
        assert_eq!(refs.len(), 2);
    }
}

//! Crawl pipeline: one session per feed task.
//!
//! Each session owns its HTTP client and media downloader and produces an
//! archive tree under `<result_dir>/<alias>/`:
//!
//! ```text
//! result/myalias/
//! ├── config.json                      # session provenance
//! ├── metadata.xml                     # verbatim feed snapshot
//! ├── media/                           # mirrored remote artifacts
//! │   └── cdn.example.com/ep1.mp3
//! └── Show/                            # per channel, sanitized title
//!     └── Ep_1_abc123/                 # per item, title_guid
//!         └── metadata.part.xml        # verbatim item fragment
//! ```
//!
//! A session that cannot fetch its feed aborts with nothing archived
//! beyond the provenance record; a media artifact that cannot be fetched
//! is skipped without disturbing its siblings.

use crate::config::Config;
use crate::error::{CrawlError, FetchError};
use crate::extract::extract_and_download;
use crate::feed::parse_feed;
use crate::fetch::get_with_retry;
use crate::media::MediaDownloader;
use crate::tasks::FeedTask;
use crate::utils::sanitize_segment;
use chrono::Local;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Proxy};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// User agent sent with every request.
const USER_AGENT: &str = concat!("feedvault/", env!("CARGO_PKG_VERSION"));

/// Session provenance written next to the archived feed.
#[allow(non_snake_case)]
#[derive(Debug, Serialize)]
struct Provenance {
    url: String,
    crawlTime: String,
    crawlHost: String,
    os: String,
    runtime: String,
}

/// One crawl session: fetches a feed and mirrors its media.
pub struct Crawler {
    url: String,
    alias: String,
    base_dir: PathBuf,
    client: Client,
    retry_times: u32,
    downloader: MediaDownloader,
}

impl Crawler {
    /// Build a session for one task from the shared configuration.
    ///
    /// # Errors
    ///
    /// Fails when a configured proxy URL is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(task: &FeedTask, config: &Config) -> Result<Self, CrawlError> {
        let base_dir = task.dest_dir(&config.result_dir);

        let mut builder = Client::builder().user_agent(USER_AGENT);
        for (scheme, proxy_url) in &config.proxies {
            let proxy = match scheme.as_str() {
                "http" => Proxy::http(proxy_url),
                "https" => Proxy::https(proxy_url),
                _ => Proxy::all(proxy_url),
            }
            .map_err(|e| CrawlError::Proxy {
                url: proxy_url.clone(),
                source: e,
            })?;
            builder = builder.proxy(proxy);
        }
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(CrawlError::Client)?;

        let downloader = MediaDownloader::new(
            base_dir.clone(),
            client.clone(),
            config.retry_times,
            config.force_redownload,
        );

        Ok(Self {
            url: task.url.clone(),
            alias: task.alias.clone(),
            base_dir,
            client,
            retry_times: config.retry_times,
            downloader,
        })
    }

    /// Run the session: fetch, snapshot, parse, archive.
    #[instrument(level = "info", skip_all, fields(alias = %self.alias, url = %self.url))]
    pub async fn crawl(&mut self) -> Result<(), CrawlError> {
        info!("start crawling");
        fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| CrawlError::io(&self.base_dir, e))?;
        self.write_provenance().await?;

        debug!("downloading feed");
        let response = get_with_retry(&self.client, &self.url, self.retry_times)
            .await
            .map_err(|e| CrawlError::FeedUnavailable {
                url: self.url.clone(),
                source: e,
            })?;
        debug!(
            status = %response.status(),
            content_type = ?response.headers().get(CONTENT_TYPE),
            "feed response"
        );

        let body = response
            .text()
            .await
            .map_err(|e| CrawlError::FeedUnavailable {
                url: self.url.clone(),
                source: FetchError::Transport(e),
            })?;

        debug!(bytes = body.len(), "saving feed snapshot");
        let snapshot = self.base_dir.join("metadata.xml");
        fs::write(&snapshot, &body)
            .await
            .map_err(|e| CrawlError::io(&snapshot, e))?;

        debug!("processing feed");
        let document = parse_feed(&body);
        if document.channels.is_empty() {
            warn!("no channels found in feed");
        }

        for channel in &document.channels {
            info!(channel = %channel.title, "entering channel");
            if channel.title.is_empty() {
                warn!("channel without title");
            }
            let channel_dir = self.base_dir.join(sanitize_segment(&channel.title));
            fs::create_dir_all(&channel_dir)
                .await
                .map_err(|e| CrawlError::io(&channel_dir, e))?;

            extract_and_download(&channel.element, false, &mut self.downloader).await?;

            for item in &channel.items {
                info!(item = %item.title, "archiving item");
                let item_dir = channel_dir.join(format!(
                    "{}_{}",
                    sanitize_segment(&item.title),
                    sanitize_segment(&item.guid)
                ));
                fs::create_dir_all(&item_dir)
                    .await
                    .map_err(|e| CrawlError::io(&item_dir, e))?;

                let fragment_path = item_dir.join("metadata.part.xml");
                fs::write(&fragment_path, &item.raw)
                    .await
                    .map_err(|e| CrawlError::io(&fragment_path, e))?;

                extract_and_download(&item.element, true, &mut self.downloader).await?;
            }
        }

        info!("crawl finished");
        Ok(())
    }

    /// Persist the session provenance record as pretty-printed JSON.
    async fn write_provenance(&self) -> Result<(), CrawlError> {
        let record = Provenance {
            url: self.url.clone(),
            crawlTime: Local::now().to_rfc3339(),
            crawlHost: gethostname::gethostname().to_string_lossy().into_owned(),
            os: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            runtime: concat!("feedvault ", env!("CARGO_PKG_VERSION")).to_string(),
        };
        let json = serde_json::to_string_pretty(&record).map_err(CrawlError::Provenance)?;

        let path = self.base_dir.join("config.json");
        fs::write(&path, json)
            .await
            .map_err(|e| CrawlError::io(&path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(dir: &TempDir) -> Config {
        Config {
            result_dir: dir.path().to_path_buf(),
            retry_times: 0,
            ..Config::default()
        }
    }

    fn task(server: &MockServer, alias: &str) -> FeedTask {
        FeedTask {
            url: format!("{}/feed.xml", server.uri()),
            alias: alias.to_string(),
        }
    }

    /// The mock server's authority (`127.0.0.1:port`) as one sanitized
    /// path segment.
    fn host_segment(server: &MockServer) -> String {
        let authority = server.uri();
        let authority = authority.split_once("://").unwrap().1;
        sanitize_segment(authority)
    }

    #[tokio::test]
    async fn archives_feed_and_media_end_to_end() {
        let server = MockServer::start().await;
        let feed = format!(
            r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Show</title>
    <item>
      <title>Ep 1</title>
      <guid>abc123</guid>
      <enclosure url="{0}/ep1.mp3" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(feed.clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ep1.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio".as_slice()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let task = task(&server, "myalias");
        let mut crawler = Crawler::new(&task, &config).unwrap();
        crawler.crawl().await.unwrap();

        let base = dir.path().join("myalias");
        assert_eq!(
            std::fs::read_to_string(base.join("metadata.xml")).unwrap(),
            feed
        );

        let provenance: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(base.join("config.json")).unwrap())
                .unwrap();
        assert_eq!(provenance["url"], task.url.as_str());
        assert!(provenance["crawlTime"].is_string());
        assert!(provenance["crawlHost"].is_string());
        assert!(provenance["os"].is_string());
        assert!(provenance["runtime"].is_string());

        let fragment =
            std::fs::read_to_string(base.join("Show/Ep_1_abc123/metadata.part.xml")).unwrap();
        assert!(fragment.starts_with("<item>"));
        assert!(fragment.ends_with("</item>"));
        assert!(feed.contains(&fragment));

        let media = base.join("media").join(host_segment(&server)).join("ep1.mp3");
        assert_eq!(std::fs::read(&media).unwrap(), b"audio");
    }

    #[tokio::test]
    async fn feed_exhaustion_leaves_only_provenance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let mut crawler = Crawler::new(&task(&server, "broken"), &config).unwrap();

        match crawler.crawl().await {
            Err(CrawlError::FeedUnavailable { .. }) => {}
            other => panic!("expected feed failure, got {other:?}"),
        }

        let base = dir.path().join("broken");
        assert!(base.join("config.json").is_file());
        assert!(!base.join("metadata.xml").exists());
        // Nothing was parsed, so no channel or item directories exist.
        assert_eq!(
            std::fs::read_dir(&base).unwrap().count(),
            1,
            "only the provenance record should exist"
        );
    }

    #[tokio::test]
    async fn item_media_failure_is_isolated() {
        let server = MockServer::start().await;
        let feed = format!(
            r#"<rss><channel><title>Show</title>
<item><title>Ep 1</title><guid>a1</guid><enclosure url="{0}/gone.mp3"/></item>
<item><title>Ep 2</title><guid>b2</guid><enclosure url="{0}/ep2.mp3"/></item>
</channel></rss>"#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(feed))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.mp3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ep2.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"second".as_slice()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let mut crawler = Crawler::new(&task(&server, "flaky"), &config).unwrap();
        crawler.crawl().await.unwrap();

        let base = dir.path().join("flaky");
        let host = host_segment(&server);
        // The failed item still archived its metadata fragment.
        assert!(base.join("Show/Ep_1_a1/metadata.part.xml").is_file());
        assert!(!base.join("media").join(&host).join("gone.mp3").exists());
        // And its sibling proceeded untouched.
        assert!(base.join("Show/Ep_2_b2/metadata.part.xml").is_file());
        assert_eq!(
            std::fs::read(base.join("media").join(&host).join("ep2.mp3")).unwrap(),
            b"second"
        );
    }

    #[tokio::test]
    async fn channel_media_downloads_once_despite_duplicate_discovery() {
        let server = MockServer::start().await;
        let feed = format!(
            r#"<rss xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"><channel>
<title>Show</title>
<itunes:image href="{0}/cover.jpg"/>
<image><url>{0}/cover.jpg</url></image>
</channel></rss>"#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(feed))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cover.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img".as_slice()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let mut crawler = Crawler::new(&task(&server, "dedup"), &config).unwrap();
        crawler.crawl().await.unwrap();

        let media = dir
            .path()
            .join("dedup/media")
            .join(host_segment(&server))
            .join("cover.jpg");
        assert_eq!(std::fs::read(&media).unwrap(), b"img");
    }
}

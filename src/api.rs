use std::sync::Arc;

use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::http::{HttpTransport, ReqwestTransport};
use crate::media::{FetchOptions, MediaFetcher, ValidatedMedia};
use crate::page_state;
use crate::session::Session;
use crate::video::{id_from_url, video_url, Video, VideoRef};

/// Entry point for resolving videos and fetching their media within one session.
pub struct Api<T: ?Sized = ReqwestTransport> {
    transport: Arc<T>,
    session: Session,
}

impl<T: ?Sized> Clone for Api<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            session: self.session.clone(),
        }
    }
}

impl Api<ReqwestTransport> {
    /// Build an API over `reqwest`, honouring the session's proxy.
    pub fn new(session: Session) -> Result<Self> {
        let transport = ReqwestTransport::new(session.proxy())?;
        Ok(Self::with_transport(Arc::new(transport), session))
    }
}

impl<T> Api<T>
where
    T: HttpTransport + ?Sized,
{
    pub fn with_transport(transport: Arc<T>, session: Session) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Resolve a video id or TikTok URL into a fully populated [`Video`].
    pub async fn resolve(&self, id_or_url: &str) -> Result<Video> {
        let (id, page_url) = self.locate(VideoRef::parse(id_or_url)?).await?;
        self.info(&id, &page_url).await
    }

    /// Fetch the video page at `page_url` and build the video with id `id` from it.
    /// Response cookies are merged into the session once the video is built.
    pub async fn info(&self, id: &str, page_url: &Url) -> Result<Video> {
        info!(id, url = %page_url, "fetching video page");

        let page = self
            .transport
            .get(page_url.as_str(), &self.session.page_headers(page_url))
            .await?;
        let item = page_state::extract(&page, id)?;
        let video = Video::from_item(item)?;

        self.session.merge_cookies(&page.headers, &page.url);
        Ok(video)
    }

    /// Fetch the media for `video`, trying every `downloadAddr` it carries.
    pub async fn fetch_media(
        &self,
        video: &Video,
        options: FetchOptions,
    ) -> Result<ValidatedMedia> {
        let candidates = video.download_candidates();
        debug!(id = %video.id, count = candidates.len(), "collected media candidates");

        MediaFetcher::new(self.transport.as_ref(), &self.session)
            .fetch(&candidates, options)
            .await
    }

    async fn locate(&self, reference: VideoRef) -> Result<(String, Url)> {
        match reference {
            VideoRef::Id(id) => {
                let url = Url::parse(&video_url(None, &id))?;
                Ok((id, url))
            }
            VideoRef::Canonical { id, url } => Ok((id, url)),
            VideoRef::Unresolved(url) => {
                debug!(url = %url, "following link to find video id");
                let response = self
                    .transport
                    .get(url.as_str(), self.session.headers())
                    .await?;
                id_from_url(&response.url)
                    .map(|id| (id, response.url.clone()))
                    .ok_or_else(|| Error::InvalidUrl(url.to_string()))
            }
        }
    }
}

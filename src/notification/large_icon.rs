//! 大图标解析
//!
//! 解析顺序：
//! 1. payload 中的 http(s) 图片，带连接超时和整体截止时间下载
//! 2. 宿主应用图标，按固有尺寸重绘到 RGBA 画布
//! 3. 都没有时不设置大图标（不算失败）

use std::time::Duration;

use anyhow::Result;
use image::imageops::{self, FilterType};
use image::{ImageError, RgbaImage};
use thiserror::Error;
use tracing::{debug, warn};

use super::model::{IconSource, LargeIcon};
use crate::platform::IconResource;

/// 图片下载失败原因（均回退到应用图标）
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("image download timed out after {0:?}")]
    Timeout(Duration),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("cannot decode image: {0}")]
    Decode(#[from] ImageError),
}

/// 远程图片下载器
#[derive(Debug, Clone)]
pub struct IconFetcher {
    client: reqwest::Client,
    deadline: Duration,
}

impl IconFetcher {
    /// `connect_timeout` 限制建连，`deadline` 限制整个下载
    pub fn new(connect_timeout: Duration, deadline: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client, deadline })
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// 下载并解码图片；超过截止时间时放弃
    pub async fn fetch(&self, url: &str) -> Result<RgbaImage, FetchError> {
        let download = async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            let bytes = response.bytes().await?;
            let decoded = image::load_from_memory(&bytes)?;
            Ok(decoded.to_rgba8())
        };

        match tokio::time::timeout(self.deadline, download).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.deadline)),
        }
    }
}

/// 解码应用图标并按固有尺寸重绘到画布
pub fn redraw_app_icon(icon: &IconResource) -> Result<RgbaImage, ImageError> {
    let decoded = image::load_from_memory(&icon.bytes)?;

    let width = if icon.intrinsic_width > 0 { icon.intrinsic_width } else { decoded.width() };
    let height = if icon.intrinsic_height > 0 { icon.intrinsic_height } else { decoded.height() };

    let source = if decoded.width() == width && decoded.height() == height {
        decoded.to_rgba8()
    } else {
        decoded.resize_exact(width, height, FilterType::Triangle).to_rgba8()
    };

    let mut canvas = RgbaImage::new(width, height);
    imageops::overlay(&mut canvas, &source, 0, 0);
    Ok(canvas)
}

/// 按顺序解析大图标
pub async fn resolve_large_icon(
    fetcher: &IconFetcher,
    image_url: Option<&str>,
    app_icon: Option<&IconResource>,
) -> Option<LargeIcon> {
    if let Some(url) = image_url {
        match fetcher.fetch(url).await {
            Ok(bitmap) => {
                debug!(url = %url, width = bitmap.width(), height = bitmap.height(), "Downloaded large icon");
                return Some(LargeIcon {
                    source: IconSource::Downloaded(url.to_string()),
                    bitmap,
                });
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to load image from URL, falling back to app icon");
            }
        }
    }

    let icon = app_icon?;
    match redraw_app_icon(icon) {
        Ok(bitmap) => Some(LargeIcon {
            source: IconSource::AppIcon,
            bitmap,
        }),
        Err(e) => {
            warn!(error = %e, "Failed to load app icon");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba};
    use std::io::Cursor;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 200, 30, 255]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    /// 启动只响应一次的本地 HTTP 服务
    async fn serve_once(status: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
        });
        format!("http://{}/avatar.png", addr)
    }

    fn fetcher(deadline_ms: u64) -> IconFetcher {
        IconFetcher::new(Duration::from_millis(500), Duration::from_millis(deadline_ms)).unwrap()
    }

    fn app_icon(width: u32, height: u32) -> IconResource {
        IconResource {
            bytes: png_bytes(16, 16),
            intrinsic_width: width,
            intrinsic_height: height,
        }
    }

    #[tokio::test]
    async fn test_fetch_decodes_image() {
        let url = serve_once("200 OK", png_bytes(4, 3)).await;
        let bitmap = fetcher(2000).fetch(&url).await.unwrap();
        assert_eq!(bitmap.dimensions(), (4, 3));
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let url = serve_once("404 Not Found", Vec::new()).await;
        let err = fetcher(2000).fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
    }

    #[tokio::test]
    async fn test_fetch_garbage_body_is_decode_error() {
        let url = serve_once("200 OK", b"not an image".to_vec()).await;
        let err = fetcher(2000).fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let err = fetcher(200)
            .fetch(&format!("http://{}/slow.png", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[test]
    fn test_redraw_app_icon_uses_intrinsic_size() {
        let bitmap = redraw_app_icon(&app_icon(48, 48)).unwrap();
        assert_eq!(bitmap.dimensions(), (48, 48));
        assert_eq!(bitmap.get_pixel(0, 0)[3], 255);
    }

    #[test]
    fn test_redraw_app_icon_zero_intrinsic_keeps_decoded_size() {
        let bitmap = redraw_app_icon(&app_icon(0, 0)).unwrap();
        assert_eq!(bitmap.dimensions(), (16, 16));
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_app_icon() {
        let url = serve_once("500 Internal Server Error", Vec::new()).await;
        let icon = app_icon(24, 24);
        let resolved = resolve_large_icon(&fetcher(2000), Some(&url), Some(&icon))
            .await
            .unwrap();
        assert_eq!(resolved.source, IconSource::AppIcon);
        assert_eq!(resolved.bitmap.dimensions(), (24, 24));
    }

    #[tokio::test]
    async fn test_resolve_without_any_source() {
        assert!(resolve_large_icon(&fetcher(2000), None, None).await.is_none());

        let broken = IconResource {
            bytes: b"junk".to_vec(),
            intrinsic_width: 8,
            intrinsic_height: 8,
        };
        assert!(resolve_large_icon(&fetcher(2000), None, Some(&broken)).await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_prefers_downloaded_image() {
        let url = serve_once("200 OK", png_bytes(2, 2)).await;
        let icon = app_icon(24, 24);
        let resolved = resolve_large_icon(&fetcher(2000), Some(&url), Some(&icon))
            .await
            .unwrap();
        assert_eq!(resolved.source, IconSource::Downloaded(url));
        assert_eq!(resolved.bitmap.dimensions(), (2, 2));
    }
}

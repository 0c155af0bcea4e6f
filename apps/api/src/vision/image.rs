use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to fetch image: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("invalid base64 image data: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// An image passed by clients: a remote URL, a data URI, or bare base64.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Url(String),
    Inline { mime: String, data: String },
}

impl ImageSource {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return ImageSource::Url(raw.to_string());
        }
        match raw.split_once(',') {
            Some((header, data)) => {
                let mime = header
                    .strip_prefix("data:")
                    .and_then(|h| h.split(';').next())
                    .filter(|m| !m.is_empty())
                    .unwrap_or("image/jpeg");
                ImageSource::Inline {
                    mime: mime.to_string(),
                    data: data.to_string(),
                }
            }
            None => ImageSource::Inline {
                mime: "image/jpeg".to_string(),
                data: raw.to_string(),
            },
        }
    }

    /// Data URI suitable for an `image_url` content part. Remote images are
    /// downloaded and inlined.
    pub async fn to_data_uri(&self, http: &reqwest::Client) -> Result<String, ImageError> {
        match self {
            ImageSource::Inline { mime, data } => Ok(format!("data:{mime};base64,{data}")),
            ImageSource::Url(_) => {
                let (mime, bytes) = self.fetch(http).await?;
                Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
            }
        }
    }

    /// Raw image bytes with their MIME type.
    pub async fn fetch(&self, http: &reqwest::Client) -> Result<(String, Vec<u8>), ImageError> {
        match self {
            ImageSource::Inline { mime, data } => Ok((mime.clone(), STANDARD.decode(data.trim())?)),
            ImageSource::Url(url) => {
                let response = http
                    .get(url)
                    .timeout(std::time::Duration::from_secs(10))
                    .send()
                    .await?
                    .error_for_status()?;
                let header_mime = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .filter(|v| v.starts_with("image/"))
                    .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
                let bytes = response.bytes().await?.to_vec();
                let mime = header_mime.unwrap_or_else(|| sniff_mime(&bytes).to_string());
                Ok((mime, bytes))
            }
        }
    }
}

/// MIME type from magic bytes, defaulting to JPEG.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sources() {
        assert_eq!(
            ImageSource::parse("https://x.org/a.png"),
            ImageSource::Url("https://x.org/a.png".into())
        );
        assert_eq!(
            ImageSource::parse("data:image/png;base64,AAAA"),
            ImageSource::Inline {
                mime: "image/png".into(),
                data: "AAAA".into()
            }
        );
        assert_eq!(
            ImageSource::parse("AAAA"),
            ImageSource::Inline {
                mime: "image/jpeg".into(),
                data: "AAAA".into()
            }
        );
    }

    #[tokio::test]
    async fn test_inline_data_uri_round_trip() {
        let http = reqwest::Client::new();
        let src = ImageSource::parse("data:image/gif;base64,R0lGODlh");
        assert_eq!(
            src.to_data_uri(&http).await.unwrap(),
            "data:image/gif;base64,R0lGODlh"
        );
        let (mime, bytes) = src.fetch(&http).await.unwrap();
        assert_eq!(mime, "image/gif");
        assert_eq!(&bytes[..4], b"GIF8");
    }

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(&[0x89, b'P', b'N', b'G', 0, 0]), "image/png");
        assert_eq!(sniff_mime(b"\xff\xd8\xff"), "image/jpeg");
    }
}

//! Multipart upload request construction.
//!
//! Reads the source log into memory and encodes the upload options as
//! literal `"true"`/`"false"` query parameters.

use crate::error::UploadError;
use crate::upload_queue::types::UploadOptions;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use url::Url;

/// Multipart field carrying the log file
pub const FILE_FIELD: &str = "file";

// Query parameters owned by the uploader; anything else on the endpoint URL is kept
const MANAGED_PARAMS: [&str; 4] = ["json", "generator", "detailedwvw", "anonymous"];

/// A fully prepared upload, ready to be sent once
#[derive(Debug)]
pub struct UploadRequest {
    url: Url,
    file_name: String,
    contents: Vec<u8>,
}

impl UploadRequest {
    /// Read `path` and build the request for `endpoint` with `options`.
    ///
    /// Fails with `LocalIo` if the file cannot be read.
    pub async fn prepare(
        endpoint: &Url,
        path: &Path,
        options: &UploadOptions,
    ) -> Result<Self, UploadError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::LocalIo {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "path has no file name",
                ),
            })?;

        let contents = tokio::fs::read(path)
            .await
            .map_err(|source| UploadError::LocalIo {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            url: build_upload_url(endpoint, options),
            file_name,
            contents,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Consume into a POST request with a single `file` part
    pub fn into_request(
        self,
        client: &reqwest::Client,
    ) -> Result<reqwest::RequestBuilder, UploadError> {
        let part = Part::bytes(self.contents)
            .file_name(self.file_name)
            .mime_str("application/octet-stream")?;
        let form = Form::new().part(FILE_FIELD, part);

        Ok(client.post(self.url).multipart(form))
    }
}

/// Endpoint URL with the uploader's query parameters applied
pub fn build_upload_url(endpoint: &Url, options: &UploadOptions) -> Url {
    let retained: Vec<(String, String)> = endpoint
        .query_pairs()
        .filter(|(key, _)| !MANAGED_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("json", "1")
        .append_pair("generator", "ei")
        .append_pair("detailedwvw", bool_param(options.detailed_wvw))
        .append_pair("anonymous", bool_param(options.anonymous));
    url
}

fn bool_param(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn endpoint() -> Url {
        Url::parse("https://dps.report/uploadContent").unwrap()
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_query_encodes_options() {
        let url = build_upload_url(&endpoint(), &UploadOptions::new(true, false));
        let params = query(&url);

        assert_eq!(params["json"], "1");
        assert_eq!(params["generator"], "ei");
        assert_eq!(params["detailedwvw"], "true");
        assert_eq!(params["anonymous"], "false");
        assert_eq!(url.path(), "/uploadContent");
    }

    #[test]
    fn test_query_overrides_existing_params() {
        let endpoint =
            Url::parse("https://dps.report/uploadContent?userToken=abc&detailedwvw=true").unwrap();
        let url = build_upload_url(&endpoint, &UploadOptions::new(false, true));
        let params = query(&url);

        assert_eq!(params["userToken"], "abc");
        assert_eq!(params["detailedwvw"], "false");
        assert_eq!(params["anonymous"], "true");
        assert_eq!(
            url.query_pairs().filter(|(k, _)| k == "detailedwvw").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_prepare_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("20240101-120000.zevtc");
        std::fs::write(&path, b"EVTC20240101").unwrap();

        let request = UploadRequest::prepare(&endpoint(), &path, &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(request.file_name(), "20240101-120000.zevtc");
        assert_eq!(request.len(), 12);
        assert_eq!(query(request.url())["detailedwvw"], "false");
    }

    #[tokio::test]
    async fn test_prepare_missing_file_is_local_io() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.zevtc");

        let err = UploadRequest::prepare(&endpoint(), &path, &UploadOptions::default())
            .await
            .unwrap_err();

        match err {
            UploadError::LocalIo { path: failed, source } => {
                assert_eq!(failed, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected LocalIo, got {:?}", other),
        }
    }
}

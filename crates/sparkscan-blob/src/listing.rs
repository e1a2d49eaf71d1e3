//! Parsing of List Blobs `EnumerationResults` responses

use std::future::Future;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::trace;

use sparkscan_types::BlobItem;

use crate::BlobError;

static BLOB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<Blob>(.*?)</Blob>").expect("valid regex"));
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<Name(\s[^>]*)?>(.*?)</Name>").expect("valid regex"));
static LENGTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<Content-Length>\s*(\d+)\s*</Content-Length>").expect("valid regex")
});
static MODIFIED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<Last-Modified>([^<]*)</Last-Modified>").expect("valid regex")
});
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(lt|gt|quot|apos|amp|#x[0-9A-Fa-f]+|#[0-9]+);").expect("valid regex")
});
static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<NextMarker>([^<]*)</NextMarker>").expect("valid regex"));

/// One page of a container listing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub blobs: Vec<BlobItem>,
    /// Continuation marker; `None` on the last page
    pub next_marker: Option<String>,
}

/// Parse the XML body of a List Blobs response
pub fn parse_list_response(body: &str) -> Result<ListPage, BlobError> {
    if !body.contains("<EnumerationResults") {
        return Err(BlobError::InvalidListing(
            "missing EnumerationResults element".to_string(),
        ));
    }

    let mut blobs = Vec::new();
    for caps in BLOB_RE.captures_iter(body) {
        let block = &caps[1];
        let Some(name) = NAME_RE.captures(block) else {
            return Err(BlobError::InvalidListing(
                "blob entry without a Name".to_string(),
            ));
        };

        let mut text = unescape_xml(&name[2])?;
        // Names holding characters XML cannot carry come back percent-encoded
        let encoded = name
            .get(1)
            .is_some_and(|attrs| attrs.as_str().contains(r#"Encoded="true""#));
        if encoded {
            text = percent_decode(&text)?;
        }

        blobs.push(BlobItem {
            name: text,
            size: LENGTH_RE
                .captures(block)
                .and_then(|c| c[1].parse().ok()),
            last_modified: MODIFIED_RE
                .captures(block)
                .and_then(|c| parse_http_date(&c[1])),
        });
    }

    let next_marker = match MARKER_RE.captures(body) {
        Some(c) => Some(unescape_xml(c[1].trim())?).filter(|m| !m.is_empty()),
        None => None,
    };

    Ok(ListPage { blobs, next_marker })
}

/// Fetch listing pages until one comes back without a continuation marker.
/// `fetch` is called with `None` for the first page, then with each marker.
pub(crate) async fn collect_pages<F, Fut>(mut fetch: F) -> Result<Vec<BlobItem>, BlobError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ListPage, BlobError>>,
{
    let mut blobs = Vec::new();
    let mut marker = None;

    loop {
        let page = fetch(marker.take()).await?;
        trace!(count = page.blobs.len(), more = page.next_marker.is_some(), "listing page");
        blobs.extend(page.blobs);

        match page.next_marker {
            Some(next) => marker = Some(next),
            None => return Ok(blobs),
        }
    }
}

/// Last-Modified uses the RFC 1123 date format
fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Resolve the predefined entities and numeric character references in one
/// pass, so "&amp;lt;" stays "&lt;"
fn unescape_xml(text: &str) -> Result<String, BlobError> {
    if !text.contains('&') {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in ENTITY_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        last = whole.end();

        let entity = &caps[1];
        let c = match entity {
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            "amp" => '&',
            _ => {
                let code = match entity.strip_prefix("#x") {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => entity[1..].parse::<u32>().ok(),
                };
                code.and_then(char::from_u32).ok_or_else(|| {
                    BlobError::InvalidListing(format!("invalid character reference &{};", entity))
                })?
            }
        };
        out.push(c);
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Decode `%XX` escapes of a percent-encoded blob name
fn percent_decode(text: &str) -> Result<String, BlobError> {
    let invalid = || BlobError::InvalidListing(format!("malformed encoded blob name `{}`", text));

    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = text.get(i + 1..i + 3).ok_or_else(invalid)?;
            out.push(u8::from_str_radix(hex, 16).map_err(|_| invalid())?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://acct.blob.core.windows.net/" ContainerName="logs">
  <Prefix>ws1/</Prefix>
  <Blobs>
    <Blob>
      <Name>ws1/app-1/driver/app-1-spark-events</Name>
      <Properties>
        <Last-Modified>Tue, 14 May 2024 09:30:00 GMT</Last-Modified>
        <Content-Length>2048</Content-Length>
      </Properties>
    </Blob>
    <Blob>
      <Name>ws1/R&amp;D/notes.txt</Name>
      <Properties><Content-Length>12</Content-Length></Properties>
    </Blob>
  </Blobs>
  <NextMarker>2!80!MDAwMDE3</NextMarker>
</EnumerationResults>"#;

    #[test]
    fn test_parse_page() {
        let page = parse_list_response(PAGE).unwrap();
        assert_eq!(page.blobs.len(), 2);
        assert_eq!(page.blobs[0].name, "ws1/app-1/driver/app-1-spark-events");
        assert_eq!(page.blobs[0].size, Some(2048));
        assert!(page.blobs[0].last_modified.is_some());
        assert_eq!(page.blobs[1].name, "ws1/R&D/notes.txt");
        assert_eq!(page.next_marker.as_deref(), Some("2!80!MDAwMDE3"));
    }

    #[test]
    fn test_last_page_has_no_marker() {
        let body = r#"<EnumerationResults><Blobs /><NextMarker /></EnumerationResults>"#;
        let page = parse_list_response(body).unwrap();
        assert!(page.blobs.is_empty());
        assert!(page.next_marker.is_none());

        let body = r#"<EnumerationResults><Blobs></Blobs><NextMarker></NextMarker></EnumerationResults>"#;
        assert!(parse_list_response(body).unwrap().next_marker.is_none());
    }

    #[test]
    fn test_rejects_non_listing() {
        assert!(parse_list_response("<Error><Code>AuthorizationFailure</Code></Error>").is_err());
    }

    #[test]
    fn test_unescape_order() {
        assert_eq!(unescape_xml("a&amp;lt;b").unwrap(), "a&lt;b");
        assert_eq!(unescape_xml("&lt;x&gt;").unwrap(), "<x>");
    }

    #[test]
    fn test_numeric_character_references() {
        assert_eq!(unescape_xml("a&#x41;&#66;c").unwrap(), "aABc");
        assert_eq!(unescape_xml("caf&#xE9;").unwrap(), "café");
        assert!(unescape_xml("bad&#xD800;").is_err());
    }

    #[test]
    fn test_encoded_name_is_percent_decoded() {
        let body = r#"<EnumerationResults><Blobs>
  <Blob><Name Encoded="true">ws1%2Fapp%01%20x%2Fdriver%2Fa-spark-events</Name></Blob>
  <Blob><Name Encoded="false">ws1/100%</Name></Blob>
</Blobs><NextMarker /></EnumerationResults>"#;
        let page = parse_list_response(body).unwrap();
        assert_eq!(page.blobs[0].name, "ws1/app\u{1} x/driver/a-spark-events");
        assert_eq!(page.blobs[1].name, "ws1/100%");
    }

    #[test]
    fn test_malformed_encoded_name_is_rejected() {
        let body = r#"<EnumerationResults><Blobs>
  <Blob><Name Encoded="true">ws1%2</Name></Blob>
</Blobs></EnumerationResults>"#;
        assert!(matches!(
            parse_list_response(body),
            Err(BlobError::InvalidListing(_))
        ));
    }

    fn page(names: &[&str], next_marker: Option<&str>) -> ListPage {
        ListPage {
            blobs: names
                .iter()
                .map(|name| BlobItem {
                    name: name.to_string(),
                    size: None,
                    last_modified: None,
                })
                .collect(),
            next_marker: next_marker.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_collect_pages_follows_markers() {
        let mut markers = Vec::new();
        let blobs = collect_pages(|marker| {
            markers.push(marker.clone());
            let result = match marker.as_deref() {
                None => Ok(page(&["a", "b"], Some("m1"))),
                Some("m1") => Ok(page(&[], Some("m2"))),
                Some("m2") => Ok(page(&["c"], None)),
                Some(other) => panic!("unexpected marker {}", other),
            };
            async move { result }
        })
        .await
        .unwrap();

        let names: Vec<&str> = blobs.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(
            markers,
            vec![None, Some("m1".to_string()), Some("m2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_collect_pages_stops_on_error() {
        let mut calls = 0;
        let result = collect_pages(|marker| {
            calls += 1;
            let result = match marker {
                None => Ok(page(&["a"], Some("m1"))),
                Some(_) => Err(BlobError::InvalidListing("truncated".to_string())),
            };
            async move { result }
        })
        .await;

        assert!(matches!(result, Err(BlobError::InvalidListing(_))));
        assert_eq!(calls, 2);
    }
}

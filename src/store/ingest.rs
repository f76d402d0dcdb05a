use anyhow::{Context, Result};
use tracing::info;

use super::types::DocId;
use super::TutorStore;

/// Fetch a page or text file and store it as a study document.
/// Returns (doc_id, stored length in bytes).
pub async fn ingest_url(store: &TutorStore, url: &str, title: Option<&str>) -> Result<(DocId, usize)> {
    let parsed = reqwest::Url::parse(url).context("Invalid URL")?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("only http(s) URLs can be ingested");
    }

    let resp = reqwest::get(parsed.clone())
        .await
        .context("Failed to fetch URL")?
        .error_for_status()
        .context("URL returned an error status")?;

    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let body = resp.bytes().await.context("Failed to read response body")?;

    let text = extract_text(&content_type, &body)?;

    let title = title
        .map(str::to_string)
        .unwrap_or_else(|| default_title(&parsed));
    let (doc_id, size) = ingest_text(store, &text, &title, &format!("url:{}", url)).await?;
    info!(doc_id = %doc_id, size, content_type, "URL ingested");
    Ok((doc_id, size))
}

/// Turn a fetched body into plain text. Only HTML and textual types are
/// accepted; PDFs, images and other binaries must be converted elsewhere.
fn extract_text(content_type: &str, body: &[u8]) -> Result<String> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if mime.contains("html") {
        return html2text::from_read(body, 120).context("Failed to convert HTML to text");
    }
    let textual = mime.is_empty()
        || mime.starts_with("text/")
        || matches!(
            mime.as_str(),
            "application/json" | "application/xml" | "application/x-tex" | "application/x-latex"
        );
    if !textual {
        anyhow::bail!("unsupported content type `{}`: only HTML and plain text can be ingested", mime);
    }
    String::from_utf8(body.to_vec()).context("document is not valid UTF-8 text")
}

/// Store already-extracted text.
pub async fn ingest_text(store: &TutorStore, text: &str, title: &str, origin: &str) -> Result<(DocId, usize)> {
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("document has no text content");
    }
    let doc_id = store.store_document(text, title, origin).await?;
    Ok((doc_id, text.len()))
}

fn default_title(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(str::to_string)
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_title() {
        let url = reqwest::Url::parse("https://example.com/notes/calculus.html").unwrap();
        assert_eq!(default_title(&url), "calculus.html");
        let url = reqwest::Url::parse("https://example.com/").unwrap();
        assert_eq!(default_title(&url), "example.com");
    }

    #[test]
    fn test_extract_text_by_content_type() {
        let html = extract_text("text/html; charset=utf-8", b"<p>Area = <b>pi r^2</b></p>").unwrap();
        assert!(html.contains("Area = "));
        assert!(!html.contains("<p>"));

        let plain = extract_text("text/plain", "θ = 30°".as_bytes()).unwrap();
        assert_eq!(plain, "θ = 30°");
        assert!(extract_text("", b"untyped notes").is_ok());
    }

    #[test]
    fn test_extract_text_rejects_binary() {
        let err = extract_text("application/pdf", b"%PDF-1.7\n\x00\x01").unwrap_err();
        assert!(err.to_string().contains("application/pdf"));
        assert!(extract_text("image/png", &[0x89, b'P', b'N', b'G']).is_err());
        assert!(extract_text("text/plain", &[0xff, 0xfe, 0x00]).is_err());
    }

    #[tokio::test]
    async fn test_ingest_text_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TutorStore::new(dir.path()).await.unwrap();
        assert!(ingest_text(&store, "   ", "blank", "text").await.is_err());

        let (id, size) = ingest_text(&store, " Limits describe behaviour near a point. ", "Limits", "text")
            .await
            .unwrap();
        assert_eq!(size, "Limits describe behaviour near a point.".len());
        assert_eq!(store.get_meta(&id).await.unwrap().title, "Limits");
    }

    #[tokio::test]
    async fn test_ingest_url_rejects_other_schemes() {
        let dir = tempfile::tempdir().unwrap();
        let store = TutorStore::new(dir.path()).await.unwrap();
        assert!(ingest_url(&store, "file:///etc/passwd", None).await.is_err());
        assert!(ingest_url(&store, "not a url", None).await.is_err());
    }
}

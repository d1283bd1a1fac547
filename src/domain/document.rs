use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment pattern"));
static HTML_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(<!doctype\s+html|<html|<head|<body)").expect("valid html pattern")
});

/// A document accepted for conversion: validated bytes plus detected format.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub filename: String,
    pub format: InputFormat,
    pub data: Bytes,
}

impl SourceDocument {
    pub fn new(filename: String, format: InputFormat, data: Bytes) -> Self {
        Self {
            filename,
            format,
            data,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Docx,
    Pptx,
    Html,
    Image,
    Pdf,
    Asciidoc,
    Md,
    Csv,
}

impl InputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pptx => "pptx",
            Self::Html => "html",
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Asciidoc => "asciidoc",
            Self::Md => "md",
            Self::Csv => "csv",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.template" => {
                Some(Self::Docx)
            }
            "application/vnd.openxmlformats-officedocument.presentationml.template"
            | "application/vnd.openxmlformats-officedocument.presentationml.slideshow"
            | "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
                Some(Self::Pptx)
            }
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "image/png" | "image/jpeg" | "image/tiff" | "image/gif" | "image/bmp" => {
                Some(Self::Image)
            }
            "application/pdf" => Some(Self::Pdf),
            "text/asciidoc" => Some(Self::Asciidoc),
            "text/markdown" | "text/x-markdown" => Some(Self::Md),
            "text/csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Text formats that magic-byte sniffing cannot see.
    fn from_text_extension(ext: &str) -> Option<Self> {
        match ext {
            "adoc" | "asciidoc" | "asc" => Some(Self::Asciidoc),
            "html" | "htm" | "xhtml" => Some(Self::Html),
            "md" => Some(Self::Md),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Detects the format from content first, then filename, then HTML markup.
    /// CSV is decided by extension alone. Returns `None` for anything the
    /// converter does not recognize, plain text included.
    pub fn detect(data: &[u8], filename: &str) -> Option<Self> {
        let extension = extension_of(filename);

        if extension.as_deref() == Some("csv") {
            return Some(Self::Csv);
        }

        if let Some(format) = infer::get(data).and_then(|kind| Self::from_mime(kind.mime_type())) {
            return Some(format);
        }

        extension
            .as_deref()
            .and_then(Self::from_text_extension)
            .or_else(|| sniff_html(data))
    }
}

fn extension_of(filename: &str) -> Option<String> {
    if filename.starts_with('.') {
        return None;
    }
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

fn sniff_html(data: &[u8]) -> Option<InputFormat> {
    let text: String = data
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| (b as char).to_ascii_lowercase())
        .collect();
    let text = HTML_COMMENT.replace_all(&text, "");
    let text = text.trim_start();

    if text.starts_with("<?xml") {
        let head: String = text.chars().take(1000).collect();
        if head.contains("xhtml") {
            return Some(InputFormat::Html);
        }
    }

    HTML_START.is_match(text).then_some(InputFormat::Html)
}

use async_trait::async_trait;
use chardetng::EncodingDetector;
use encoding_rs::Encoding;

use crate::application::ports::{ConverterError, DocumentConverter};
use crate::domain::{ConversionOptions, ConversionResult, InputFormat, SourceDocument};

const CSV_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Built-in converter for text formats. Binary formats need the external
/// conversion service.
pub struct PlainTextConverter;

#[async_trait]
impl DocumentConverter for PlainTextConverter {
    #[tracing::instrument(skip(self, document, _options), fields(filename = %document.filename, format = document.format.as_str()))]
    async fn convert(
        &self,
        document: &SourceDocument,
        _options: &ConversionOptions,
    ) -> Result<ConversionResult, ConverterError> {
        let markdown = match document.format {
            InputFormat::Md | InputFormat::Asciidoc => decode_text(&document.data),
            InputFormat::Html => html_to_markdown(&decode_text(&document.data)),
            InputFormat::Csv => csv_to_markdown(&decode_text(&document.data))?,
            other => {
                return Err(ConverterError::UnsupportedFormat(format!(
                    "{} requires the conversion service",
                    other.as_str()
                )));
            }
        };

        Ok(ConversionResult {
            filename: document.filename.clone(),
            markdown,
            images: Vec::new(),
        })
    }
}

/// Decodes by byte order mark, then as UTF-8, then with the legacy encoding
/// chardetng guesses (windows-1252 for Western European text).
fn decode_text(data: &[u8]) -> String {
    if let Some((encoding, bom_length)) = Encoding::for_bom(data) {
        let (text, _) = encoding.decode_without_bom_handling(&data[bom_length..]);
        return text.into_owned();
    }
    if let Ok(text) = std::str::from_utf8(data) {
        return text.to_string();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(data, true);
    let encoding = detector.guess(None, true);
    tracing::debug!(encoding = encoding.name(), "Decoding legacy text");
    let (text, _) = encoding.decode_without_bom_handling(data);
    text.into_owned()
}

fn html_to_markdown(html: &str) -> String {
    html2md::parse_html(html).trim().to_string()
}

fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or_default();
    CSV_DELIMITERS
        .iter()
        .copied()
        .max_by_key(|&delim| first_line.bytes().filter(|&b| b == delim).count())
        .filter(|&delim| first_line.bytes().any(|b| b == delim))
        .unwrap_or(b',')
}

fn csv_to_markdown(content: &str) -> Result<String, ConverterError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(content))
        .flexible(true)
        .has_headers(false)
        .from_reader(content.as_bytes());

    let rows = reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(|cell| cell.replace('|', "\\|")).collect::<Vec<_>>())
                .map_err(|e| ConverterError::ConversionFailed(format!("invalid csv: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return Ok(String::new());
    }

    let mut markdown = String::new();
    for (index, row) in rows.iter().enumerate() {
        markdown.push('|');
        for col in 0..columns {
            let cell = row.get(col).map(String::as_str).unwrap_or("");
            markdown.push_str(&format!(" {} |", cell.trim()));
        }
        markdown.push('\n');

        if index == 0 {
            markdown.push('|');
            for _ in 0..columns {
                markdown.push_str(" --- |");
            }
            markdown.push('\n');
        }
    }
    markdown.pop();
    Ok(markdown)
}

mod converter_factory;
mod http_converter;
mod http_document_fetcher;
mod plain_text_converter;

pub use converter_factory::ConverterFactory;
pub use http_converter::{CONVERT_PATH, ConvertResponse, HttpDocumentConverter};
pub use http_document_fetcher::HttpDocumentFetcher;
pub use plain_text_converter::PlainTextConverter;

mod test_postgres;

pub use fakes::{FailingStagingStore, FlakyBroker, ScriptedConverter, Step};
pub use harness::{
    Harness, TEST_MAX_BATCH_DOCUMENTS, TEST_MAX_DOCUMENT_BYTES, md_upload, pdf_upload, test_policy,
};
pub use test_postgres::TestPostgres;

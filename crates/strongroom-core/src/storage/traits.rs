//! Storage traits.
//!
//! [`DocumentStore`] is the row-level surface the deletion paths need;
//! [`OverwriteHook`] lets a caller scrub rows in place before they are
//! removed.

use rusqlite::Transaction;

use super::types::NewDocument;
use crate::error::Result;

/// Best-effort overwrite of a document's rows before deletion.
///
/// Runs inside the deleting transaction with `secure_delete` enabled, so the
/// freed pages are zeroed as well. On an encrypted store the overwritten
/// bytes are ciphertext either way; this matters mostly for plaintext
/// stores.
pub trait OverwriteHook {
    /// Overwrite every row belonging to `document_id`; returns rows touched.
    fn overwrite(&self, tx: &Transaction<'_>, document_id: &str) -> Result<usize>;
}

/// Replace chunk text, embeddings and the source path with zero blobs of
/// equal length.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroFill;

impl OverwriteHook for ZeroFill {
    fn overwrite(&self, tx: &Transaction<'_>, document_id: &str) -> Result<usize> {
        let chunks = tx.execute(
            "UPDATE chunks
             SET content = zeroblob(length(CAST(content AS BLOB))),
                 embedding = CASE WHEN embedding IS NULL THEN NULL
                                  ELSE zeroblob(length(embedding)) END
             WHERE document_id = ?1",
            [document_id],
        )?;
        let documents = tx.execute(
            "UPDATE documents SET source = zeroblob(length(CAST(source AS BLOB))) WHERE id = ?1",
            [document_id],
        )?;
        Ok(chunks + documents)
    }
}

/// Document-level operations over the index.
pub trait DocumentStore {
    /// Insert a document and its chunks in one transaction.
    fn insert_document(&mut self, document: &NewDocument) -> Result<()>;

    /// Remove a document and all of its chunks.
    ///
    /// Returns the number of chunks removed (0 for an unknown id). When
    /// `overwrite` is given, rows are scrubbed first and freed pages are
    /// zeroed.
    fn delete_document(
        &mut self,
        document_id: &str,
        overwrite: Option<&dyn OverwriteHook>,
    ) -> Result<usize>;

    /// All document ids, sorted.
    fn document_ids(&self) -> Result<Vec<String>>;

    /// Number of chunks stored for `document_id`.
    fn chunk_count(&self, document_id: &str) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trait_objects_compile() {
        fn _accepts_hook(_hook: &dyn OverwriteHook) {}
        fn _accepts_store<T: DocumentStore>(_store: T) {}
        _accepts_hook(&ZeroFill);
    }
}

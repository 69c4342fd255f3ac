//! Data types for the document store.

/// Builder for inserting a document and its chunks.
#[derive(Debug, Clone)]
pub struct NewDocument {
    /// Host-assigned document identifier
    pub id: String,

    /// Where the document came from (path, URL, ...)
    pub source: String,

    /// Ordered chunks; ordinals are assigned on insert
    pub chunks: Vec<NewChunk>,
}

impl NewDocument {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            chunks: Vec::new(),
        }
    }

    pub fn with_chunk(mut self, chunk: NewChunk) -> Self {
        self.chunks.push(chunk);
        self
    }

    pub fn with_chunks(mut self, chunks: Vec<NewChunk>) -> Self {
        self.chunks = chunks;
        self
    }
}

/// One chunk of extracted text with an optional embedding vector.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub content: String,
    pub embedding: Option<Vec<f32>>,
}

impl NewChunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Embedding as little-endian f32 bytes, the on-disk blob format.
    pub(crate) fn embedding_blob(&self) -> Option<Vec<u8>> {
        self.embedding
            .as_ref()
            .map(|values| values.iter().flat_map(|v| v.to_le_bytes()).collect())
    }
}

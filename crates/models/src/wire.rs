use crate::Document;
use serde::Deserialize;

// The ingestion wire is `application/x-yaml`: a multi-document stream with
// `---` separators, each document being a `schema` / `metadata` / `data`
// envelope. Rendering honours the same contract in both directions.

#[derive(thiserror::Error, Debug)]
pub enum WireError {
    #[error("document {index} of the YAML stream is malformed: {detail}")]
    Parse { index: usize, detail: String },
    #[error("failed to encode the YAML stream")]
    Encode(#[source] serde_yaml::Error),
}

/// Parse a multi-document YAML stream into Documents. Empty stream entries
/// (such as a trailing `---`) are skipped.
pub fn from_yaml_stream(input: &str) -> Result<Vec<Document>, WireError> {
    let mut documents = Vec::new();

    for (index, de) in serde_yaml::Deserializer::from_str(input).enumerate() {
        let value = serde_yaml::Value::deserialize(de).map_err(|err| WireError::Parse {
            index,
            detail: err.to_string(),
        })?;
        if value.is_null() {
            continue;
        }
        let document = Document::deserialize(value).map_err(|err| WireError::Parse {
            index,
            detail: err.to_string(),
        })?;
        documents.push(document);
    }
    Ok(documents)
}

/// Encode Documents as a `---`-separated YAML stream.
pub fn to_yaml_stream(documents: &[Document]) -> Result<String, WireError> {
    let mut out = String::new();

    for document in documents {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(document).map_err(WireError::Encode)?);
    }
    Ok(out)
}

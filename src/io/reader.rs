use std::io::Read;

use serde::Deserialize;
use serde_json::Value;

use crate::io::{Format, IoError};

/// Reads exactly one document; YAML multi-document streams are rejected.
pub fn read_document<R: Read>(mut reader: R, format: Format) -> Result<Value, IoError> {
    match format {
        Format::Json => Ok(serde_json::from_reader(reader)?),
        Format::Yaml => {
            let mut text = String::new();
            reader.read_to_string(&mut text)?;
            let mut documents = Vec::new();
            for document in serde_yaml::Deserializer::from_str(&text) {
                let yaml_value = serde_yaml::Value::deserialize(document)?;
                documents.push(serde_json::to_value(yaml_value)?);
            }
            match documents.len() {
                1 => Ok(documents.remove(0)),
                count => Err(IoError::NotSingleDocument { format, count }),
            }
        }
    }
}

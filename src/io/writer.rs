use std::io::Write;

use serde_json::Value;

use crate::io::IoError;

pub fn write_json<W: Write>(mut writer: W, value: &Value) -> Result<(), IoError> {
    serde_json::to_writer(&mut writer, value)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Writes object rows as CSV with the given column order.
pub fn write_csv<W: Write>(writer: W, columns: &[&str], rows: &[Value]) -> Result<(), IoError> {
    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
    csv_writer.write_record(columns)?;
    for (index, value) in rows.iter().enumerate() {
        let Value::Object(map) = value else {
            return Err(IoError::InvalidCsvRow { index });
        };
        let row: Vec<String> = columns
            .iter()
            .map(|key| map.get(*key).map(stringify_csv_value).unwrap_or_default())
            .collect();
        csv_writer.write_record(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn stringify_csv_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(v) => v.to_string(),
        Value::Number(v) => v.to_string(),
        Value::String(v) => v.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
